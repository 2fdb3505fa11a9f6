//! Scheduled job - one crawl + analysis tick, repeated on a fixed interval

use crate::commands::{cmd_analyze, crawl_with, AnalysisSummary, CrawlStats};
use crate::config::Config;
use crate::crawl::{HttpFetcher, PageFetcher};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Result of one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickStats {
    pub crawl: CrawlStats,
    pub analysis: AnalysisSummary,
}

/// Run one tick against the configured portal
pub async fn cmd_tick(config: &Config) -> Result<TickStats> {
    let fetcher = HttpFetcher::new(&config.crawl)?;
    tick_with(config, fetcher).await
}

/// Crawl, then analyze. A table read/write failure aborts the tick.
pub async fn tick_with<F: PageFetcher>(config: &Config, fetcher: F) -> Result<TickStats> {
    let crawl = crawl_with(config, fetcher).await?;
    let analysis = cmd_analyze(config).await?;
    Ok(TickStats { crawl, analysis })
}

/// Run ticks forever (until Ctrl-C) every `interval_secs`
pub async fn cmd_schedule(config: &Config, interval_secs: Option<u64>) -> Result<()> {
    let period = Duration::from_secs(interval_secs.unwrap_or(config.schedule.interval_secs).max(1));
    info!("Scheduler ready; running every {:?}", period);

    let fetcher = HttpFetcher::new(&config.crawl)?;
    let fetcher = &fetcher;
    let ticks = run_schedule(period, None, || async move {
        let stats = tick_with(config, fetcher).await?;
        info!(
            "Tick complete: {} new reviews, {} recommendations",
            stats.crawl.new_records,
            stats.analysis.recommendations.len()
        );
        Ok(())
    })
    .await;

    info!("Scheduler stopped after {} ticks", ticks);
    Ok(())
}

/// Drive `job` on a fixed period.
///
/// Ticks never overlap: the next one is awaited only after the job returns,
/// and late ticks are delayed rather than bunched. Job errors are logged and
/// the loop carries on. Returns the number of ticks run.
pub async fn run_schedule<F, Fut>(period: Duration, max_ticks: Option<u64>, mut job: F) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticks = 0u64;
    while max_ticks.map_or(true, |max| ticks < max) {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                info!("Starting tick {}", ticks);
                if let Err(e) = job().await {
                    error!("Tick {} failed: {}", ticks, e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping scheduler");
                break;
            }
        }
    }

    ticks
}
