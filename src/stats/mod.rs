//! Category and problem statistics over the classified table

use crate::models::{CategoryLabel, ClassifiedReview, ProblemTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated counts for one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total: usize,
    /// Reviews labeled `Poor`
    pub bad_count: usize,
    /// Reviews per category across the whole table
    pub category_counts: BTreeMap<CategoryLabel, usize>,
    /// Tag occurrences among `Poor` reviews only
    pub problem_stats: BTreeMap<ProblemTag, usize>,
}

impl ReviewStats {
    pub fn category_count(&self, label: CategoryLabel) -> usize {
        self.category_counts.get(&label).copied().unwrap_or(0)
    }

    /// Problems by descending count; ties keep tag declaration order
    pub fn ranked_problems(&self) -> Vec<(ProblemTag, usize)> {
        let mut ranked: Vec<(ProblemTag, usize)> =
            self.problem_stats.iter().map(|(t, c)| (*t, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Categories by descending count; ties keep label order
    pub fn ranked_categories(&self) -> Vec<(CategoryLabel, usize)> {
        let mut ranked: Vec<(CategoryLabel, usize)> =
            self.category_counts.iter().map(|(l, c)| (*l, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Recompute statistics from the full classified table
pub fn aggregate(reviews: &[ClassifiedReview]) -> ReviewStats {
    let mut stats = ReviewStats {
        total: reviews.len(),
        ..ReviewStats::default()
    };

    for review in reviews {
        *stats.category_counts.entry(review.category).or_insert(0) += 1;

        if review.category == CategoryLabel::Poor {
            stats.bad_count += 1;
            for tag in &review.tags {
                *stats.problem_stats.entry(*tag).or_insert(0) += 1;
            }
        }
    }

    stats
}
