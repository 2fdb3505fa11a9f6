//! Crawl command - fetch new reviews and merge them into the table

use crate::config::Config;
use crate::crawl::{CrawlState, HttpFetcher, IncrementalCrawler, PageFetcher};
use crate::error::Result;
use crate::progress::company_progress;
use crate::store::{merge, ReviewStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Per-company crawl summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company: String,
    pub state: CrawlState,
    pub pages_fetched: usize,
    pub new_records: usize,
    pub skipped_articles: usize,
}

/// Crawl statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub companies: Vec<CompanySummary>,
    pub pages_fetched: usize,
    pub new_records: usize,
    pub skipped_articles: usize,
    pub total_records: usize,
    pub errors: Vec<String>,
}

/// Execute crawl command against the configured portal
pub async fn cmd_crawl(config: &Config) -> Result<CrawlStats> {
    let fetcher = HttpFetcher::new(&config.crawl)?;
    crawl_with(config, fetcher).await
}

/// Crawl all configured companies with `fetcher`, then merge and persist.
///
/// Fetch failures are per company; only table I/O errors are returned.
pub async fn crawl_with<F: PageFetcher>(config: &Config, fetcher: F) -> Result<CrawlStats> {
    info!("Starting review crawl");

    let store = ReviewStore::new(config.table_path());
    let existing = store.load()?;
    let known = existing.known_urls();
    let crawler = IncrementalCrawler::new(fetcher, &config.crawl)?;

    let progress = company_progress(config.companies.len() as u64);
    let outcome = crawler
        .crawl(&config.companies, &known, |crawl| {
            progress.set_message(crawl.company.clone());
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    let mut stats = CrawlStats {
        pages_fetched: outcome.pages_fetched(),
        new_records: outcome.new_record_count(),
        ..CrawlStats::default()
    };

    for crawl in &outcome.companies {
        if let CrawlState::Failed { page, reason } = &crawl.state {
            let error_msg = format!("{} (page {}): {}", crawl.company, page, reason);
            warn!(%error_msg, "Company crawl failed");
            stats.errors.push(error_msg);
        }

        stats.skipped_articles += crawl.skipped();
        stats.companies.push(CompanySummary {
            company: crawl.company.clone(),
            state: crawl.state.clone(),
            pages_fetched: crawl.pages.len(),
            new_records: crawl.new_records.len(),
            skipped_articles: crawl.skipped(),
        });
    }

    let new_records = outcome.into_new_records();
    let has_new = !new_records.is_empty();
    let merged = merge(existing, new_records);
    stats.total_records = merged.len();

    if has_new || !store.path().exists() {
        store.persist(&merged)?;
    }

    info!(
        "Crawl finished: {} new reviews, {} total",
        stats.new_records, stats.total_records
    );
    Ok(stats)
}

/// Print crawl stats to console
pub fn print_crawl_stats(stats: &CrawlStats) {
    println!("\n🕷️  Crawl Complete\n");
    for company in &stats.companies {
        println!(
            "{}: {} new reviews from {} pages ({:?})",
            company.company, company.new_records, company.pages_fetched, company.state
        );
    }
    println!("\nPages fetched: {}", stats.pages_fetched);
    println!("New reviews: {}", stats.new_records);
    if stats.skipped_articles > 0 {
        println!("Articles skipped: {}", stats.skipped_articles);
    }
    println!("Reviews stored: {}", stats.total_records);

    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("- {}", error);
        }
    }
}
