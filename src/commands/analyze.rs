//! Analyze command - classify the stored reviews and write the report

use crate::classify::{KeywordTable, TextClassifier};
use crate::config::Config;
use crate::error::Result;
use crate::models::Recommendation;
use crate::recommend::RecommendationEngine;
use crate::report::ReportWriter;
use crate::stats::{aggregate, ReviewStats};
use crate::store::ReviewStore;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Analysis results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub stats: ReviewStats,
    pub recommendations: Vec<Recommendation>,
}

/// Execute analyze command over the full stored table
pub async fn cmd_analyze(config: &Config) -> Result<AnalysisSummary> {
    info!("Starting review analysis");

    let table = ReviewStore::new(config.table_path()).load()?;

    let classifier = TextClassifier::new(&KeywordTable::new(config.classifier.problems.clone()))?;
    let reviews = classifier.classify_all(&table);

    let stats = aggregate(&reviews);
    info!("Found {} poor reviews out of {}", stats.bad_count, stats.total);

    let engine = RecommendationEngine::from_config(&config.recommend)?;
    let recommendations = engine.recommend(&stats);

    ReportWriter::from_config(config).write(&reviews, &stats, &recommendations)?;

    Ok(AnalysisSummary {
        stats,
        recommendations,
    })
}
