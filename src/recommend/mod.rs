//! Ranked recommendations from problem statistics

use crate::config::{ActionTemplate, RecommendConfig};
use crate::error::Result;
use crate::models::{CategoryLabel, ProblemTag, Recommendation, RecommendationSubject};
use crate::stats::ReviewStats;
use std::collections::BTreeMap;
use tracing::debug;

/// Turns the most frequent problems into recommended actions
pub struct RecommendationEngine {
    templates: BTreeMap<ProblemTag, ActionTemplate>,
    general: ActionTemplate,
    top_n: usize,
    general_threshold: usize,
}

impl RecommendationEngine {
    pub fn new(
        templates: BTreeMap<ProblemTag, ActionTemplate>,
        general: ActionTemplate,
        top_n: usize,
        general_threshold: usize,
    ) -> Self {
        Self {
            templates,
            general,
            top_n,
            general_threshold,
        }
    }

    pub fn from_config(config: &RecommendConfig) -> Result<Self> {
        Ok(Self::new(
            config.resolved_templates()?,
            config.general.clone(),
            config.top_n,
            config.general_threshold,
        ))
    }

    /// Top-ranked problems first, the general recommendation last.
    ///
    /// Problems without a template are skipped rather than backfilled.
    pub fn recommend(&self, stats: &ReviewStats) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = stats
            .ranked_problems()
            .into_iter()
            .take(self.top_n)
            .filter_map(|(tag, count)| {
                let Some(template) = self.templates.get(&tag) else {
                    debug!("No action template for '{}' ({} mentions)", tag, count);
                    return None;
                };
                Some(from_template(RecommendationSubject::Problem(tag), template))
            })
            .collect();

        if stats.category_count(CategoryLabel::Poor) > self.general_threshold {
            recommendations.push(from_template(RecommendationSubject::General, &self.general));
        }

        recommendations
    }
}

fn from_template(subject: RecommendationSubject, template: &ActionTemplate) -> Recommendation {
    Recommendation {
        subject,
        primary_action: template.primary.clone(),
        secondary_actions: template.secondary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RecommendationEngine {
        RecommendationEngine::from_config(&RecommendConfig::default()).unwrap()
    }

    fn stats(problems: &[(ProblemTag, usize)], poor: usize) -> ReviewStats {
        let mut stats = ReviewStats {
            total: poor,
            bad_count: poor,
            ..ReviewStats::default()
        };
        stats.category_counts.insert(CategoryLabel::Poor, poor);
        stats.problem_stats.extend(problems.iter().copied());
        stats
    }

    fn subjects(recs: &[Recommendation]) -> Vec<RecommendationSubject> {
        recs.iter().map(|r| r.subject).collect()
    }

    #[test]
    fn test_top_three_then_general() {
        let recs = engine().recommend(&stats(
            &[
                (ProblemTag::Timeliness, 5),
                (ProblemTag::Payouts, 5),
                (ProblemTag::Service, 2),
                (ProblemTag::Documents, 1),
            ],
            11,
        ));

        assert_eq!(
            subjects(&recs),
            vec![
                RecommendationSubject::Problem(ProblemTag::Payouts),
                RecommendationSubject::Problem(ProblemTag::Timeliness),
                RecommendationSubject::Problem(ProblemTag::Service),
                RecommendationSubject::General,
            ]
        );
        assert!(!recs[0].primary_action.is_empty());
        assert_eq!(recs[0].secondary_actions.len(), 1);
    }

    #[test]
    fn test_general_requires_more_than_threshold() {
        let recs = engine().recommend(&stats(&[(ProblemTag::Documents, 4)], 10));
        assert_eq!(
            subjects(&recs),
            vec![RecommendationSubject::Problem(ProblemTag::Documents)]
        );
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(engine().recommend(&ReviewStats::default()).is_empty());
        assert!(engine().recommend(&stats(&[], 3)).is_empty());
    }

    #[test]
    fn test_general_only_when_no_problems_tagged() {
        let recs = engine().recommend(&stats(&[], 12));
        assert_eq!(subjects(&recs), vec![RecommendationSubject::General]);
    }

    #[test]
    fn test_missing_template_is_skipped_not_backfilled() {
        let mut templates = crate::config::default_action_templates();
        templates.remove(&ProblemTag::Timeliness);
        let engine = RecommendationEngine::new(
            templates,
            crate::config::default_general_template(),
            3,
            10,
        );

        let recs = engine.recommend(&stats(
            &[
                (ProblemTag::Payouts, 5),
                (ProblemTag::Timeliness, 4),
                (ProblemTag::Service, 3),
                (ProblemTag::Documents, 2),
            ],
            5,
        ));

        assert_eq!(
            subjects(&recs),
            vec![
                RecommendationSubject::Problem(ProblemTag::Payouts),
                RecommendationSubject::Problem(ProblemTag::Service),
            ]
        );
    }
}
