//! Incremental crawling of paginated review listings
//!
//! This module provides:
//! - A `PageFetcher` seam with a reqwest-backed implementation
//! - Politeness pacing between page fetches
//! - A per-company state machine that stops at the first already-stored review

use crate::config::{CompanyConfig, CrawlConfig};
use crate::error::{Error, Result};
use crate::models::ReviewRecord;
use crate::parse::{ArticleOutcome, PageExtraction, RecordExtractor};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Fetches the raw HTML of one listing page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    async fn fetch(&self, url: &Url) -> Result<String> {
        (**self).fetch(url).await
    }
}

/// HTTP page fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!(
                "TLS certificate validation is DISABLED for {}; spoofed or intercepted \
                 responses will be accepted",
                config.base_url
            );
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!("Fetching: {}", url);

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("HTTP {}: {}", status, url)));
        }

        Ok(response.text().await?)
    }
}

/// Build the listing URL of `page` for a company (page 1 carries no query)
pub fn page_url(base: &Url, company: &CompanyConfig, page: u32) -> Result<Url> {
    let mut url = base.join(&company.path)?;
    if page > 1 {
        url.set_query(Some(&format!("page={}", page)));
    }
    Ok(url)
}

/// Where a company's crawl stands after each page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CrawlState {
    /// Keep walking pages
    Continuing,
    /// The page had no article blocks
    StopAtPage { page: u32 },
    /// A review already in the store was reached; older pages are skipped
    StopAtRecord { page: u32, url: String },
    /// The page bound was reached
    Exhausted,
    /// A fetch failed; the remaining pages of this company are abandoned
    Failed { page: u32, reason: String },
}

impl CrawlState {
    pub fn is_continuing(&self) -> bool {
        matches!(self, CrawlState::Continuing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CrawlState::Failed { .. })
    }
}

/// Per-page extraction counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReport {
    pub page: u32,
    pub url: String,
    /// Article blocks found on the page
    pub articles: usize,
    /// New records kept
    pub accepted: usize,
    /// Blocks that yielded no record
    pub skipped: usize,
    /// Set when the page ended at an already-stored review
    pub hit_known: bool,
}

impl PageReport {
    fn new(page: u32, url: &Url, articles: usize) -> Self {
        Self {
            page,
            url: url.to_string(),
            articles,
            accepted: 0,
            skipped: 0,
            hit_known: false,
        }
    }
}

/// Result of crawling one company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyCrawl {
    pub company: String,
    pub state: CrawlState,
    pub pages: Vec<PageReport>,
    pub new_records: Vec<ReviewRecord>,
}

impl CompanyCrawl {
    pub fn skipped(&self) -> usize {
        self.pages.iter().map(|p| p.skipped).sum()
    }
}

/// Result of one crawl run over all companies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub companies: Vec<CompanyCrawl>,
}

impl CrawlOutcome {
    pub fn pages_fetched(&self) -> usize {
        self.companies.iter().map(|c| c.pages.len()).sum()
    }

    pub fn new_record_count(&self) -> usize {
        self.companies.iter().map(|c| c.new_records.len()).sum()
    }

    /// All new records, company-tagged, in crawl order
    pub fn into_new_records(self) -> Vec<ReviewRecord> {
        self.companies
            .into_iter()
            .flat_map(|c| c.new_records)
            .collect()
    }
}

/// Fold one extracted page into the company's new records.
///
/// Returns the state the company is in after this page.
pub fn absorb_page(
    page: u32,
    extraction: PageExtraction,
    known: &HashSet<String>,
    new_records: &mut Vec<ReviewRecord>,
    report: &mut PageReport,
) -> CrawlState {
    if extraction.is_empty() {
        return CrawlState::StopAtPage { page };
    }

    for outcome in extraction.outcomes {
        match outcome {
            ArticleOutcome::Skipped(reason) => {
                warn!("Skipping article on page {}: {}", page, reason);
                report.skipped += 1;
            }
            ArticleOutcome::Extracted(record) => {
                if known.contains(&record.complaint_url) {
                    report.hit_known = true;
                    return CrawlState::StopAtRecord {
                        page,
                        url: record.complaint_url,
                    };
                }
                report.accepted += 1;
                new_records.push(record);
            }
        }
    }

    CrawlState::Continuing
}

/// Walks listing pages newest-first and collects reviews not yet stored
pub struct IncrementalCrawler<F> {
    fetcher: F,
    extractor: RecordExtractor,
    base: Url,
    max_pages: u32,
    page_delay: Duration,
}

impl<F: PageFetcher> IncrementalCrawler<F> {
    pub fn new(fetcher: F, config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            extractor: RecordExtractor::new()?,
            base: Url::parse(&config.base_url)?,
            max_pages: config.max_pages,
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    /// Crawl every company in order; a failing company does not stop the others.
    ///
    /// `on_company` sees each company's result as soon as it is done.
    pub async fn crawl<C>(
        &self,
        companies: &[CompanyConfig],
        known: &HashSet<String>,
        mut on_company: C,
    ) -> CrawlOutcome
    where
        C: FnMut(&CompanyCrawl),
    {
        let mut outcome = CrawlOutcome::default();
        for company in companies {
            let crawl = self.crawl_company(company, known).await;
            on_company(&crawl);
            outcome.companies.push(crawl);
        }
        outcome
    }

    /// Crawl one company until its state machine leaves `Continuing`
    pub async fn crawl_company(&self, company: &CompanyConfig, known: &HashSet<String>) -> CompanyCrawl {
        let limit = company.page_limit(self.max_pages);
        let mut crawl = CompanyCrawl {
            company: company.id.clone(),
            state: CrawlState::Continuing,
            pages: Vec::new(),
            new_records: Vec::new(),
        };

        let mut page = 1;
        while crawl.state.is_continuing() {
            crawl.state = self
                .crawl_page(company, page, known, &mut crawl.new_records, &mut crawl.pages)
                .await;

            if crawl.state.is_continuing() && page >= limit {
                crawl.state = CrawlState::Exhausted;
            }
            page += 1;
        }

        match &crawl.state {
            CrawlState::Failed { page, reason } => warn!(
                "Crawl of {} aborted at page {}: {}",
                company.id, page, reason
            ),
            state => info!(
                "Crawled {} pages from {}: {} new reviews ({:?})",
                crawl.pages.len(),
                company.id,
                crawl.new_records.len(),
                state
            ),
        }

        crawl
    }

    async fn crawl_page(
        &self,
        company: &CompanyConfig,
        page: u32,
        known: &HashSet<String>,
        new_records: &mut Vec<ReviewRecord>,
        reports: &mut Vec<PageReport>,
    ) -> CrawlState {
        let url = match page_url(&self.base, company, page) {
            Ok(url) => url,
            Err(e) => {
                return CrawlState::Failed {
                    page,
                    reason: e.to_string(),
                }
            }
        };

        if page > 1 && !self.page_delay.is_zero() {
            debug!("Pausing {:?} before page {} of {}", self.page_delay, page, company.id);
            tokio::time::sleep(self.page_delay).await;
        }

        let content = match self.fetcher.fetch(&url).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                return CrawlState::Failed {
                    page,
                    reason: e.to_string(),
                };
            }
        };

        let extraction = self.extractor.extract(&content, &company.id, &self.base);
        let mut report = PageReport::new(page, &url, extraction.outcomes.len());
        let state = absorb_page(page, extraction, known, new_records, &mut report);

        debug!(
            "Page {} of {}: {} articles, {} new, {} skipped",
            page, company.id, report.articles, report.accepted, report.skipped
        );
        reports.push(report);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://portal.test/";

    /// Serves canned pages and records every requested URL with its time
    struct FakeFetcher {
        pages: HashMap<String, Result<String>>,
        requested: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn page(mut self, company: &CompanyConfig, page: u32, html: String) -> Self {
            let url = page_url(&Url::parse(BASE).unwrap(), company, page).unwrap();
            self.pages.insert(url.to_string(), Ok(html));
            self
        }

        fn failing(mut self, company: &CompanyConfig, page: u32) -> Self {
            let url = page_url(&Url::parse(BASE).unwrap(), company, page).unwrap();
            self.pages
                .insert(url.to_string(), Err(Error::Transport("HTTP 503".to_string())));
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        fn request_times(&self) -> Vec<Instant> {
            self.requested.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requested
                .lock()
                .unwrap()
                .push((url.to_string(), Instant::now()));
            match self.pages.get(url.as_str()) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(e)) => Err(Error::Transport(e.to_string())),
                None => Ok("<html><body></body></html>".to_string()),
            }
        }
    }

    fn company(id: &str) -> CompanyConfig {
        CompanyConfig {
            id: id.to_string(),
            path: format!("insurance/responses/company/{}/", id.to_lowercase()),
            max_pages: None,
        }
    }

    fn crawl_config(max_pages: u32) -> CrawlConfig {
        CrawlConfig {
            base_url: BASE.to_string(),
            page_delay_ms: 0,
            max_pages,
            accept_invalid_certs: false,
            ..CrawlConfig::default()
        }
    }

    fn review_url(id: u32) -> String {
        format!("{}insurance/response/{}/", BASE, id)
    }

    fn listing(ids: &[u32]) -> String {
        let articles: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<article><a data-test="responses-header" href="/insurance/response/{id}/">Review {id}</a>
                       <span data-test="responses-rating-grade">2</span></article>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", articles)
    }

    #[test]
    fn test_page_url() {
        let base = Url::parse(BASE).unwrap();
        let acme = company("ACME");
        assert_eq!(
            page_url(&base, &acme, 1).unwrap().as_str(),
            "https://portal.test/insurance/responses/company/acme/"
        );
        assert_eq!(
            page_url(&base, &acme, 3).unwrap().as_str(),
            "https://portal.test/insurance/responses/company/acme/?page=3"
        );
    }

    #[tokio::test]
    async fn test_stops_at_known_record_without_fetching_next_page() {
        let acme = company("ACME");
        let fetcher = FakeFetcher::new()
            .page(&acme, 1, listing(&[10, 9, 8]))
            .page(&acme, 2, listing(&[7, 6, 5]))
            .page(&acme, 3, listing(&[4, 3, 2]));
        let known: HashSet<String> = [review_url(6), review_url(5)].into_iter().collect();

        let crawler = IncrementalCrawler::new(fetcher, &crawl_config(5)).unwrap();
        let crawl = crawler.crawl_company(&acme, &known).await;

        assert_eq!(
            crawl.state,
            CrawlState::StopAtRecord {
                page: 2,
                url: review_url(6)
            }
        );
        let urls: Vec<_> = crawl.new_records.iter().map(|r| r.complaint_url.clone()).collect();
        assert_eq!(
            urls,
            vec![review_url(10), review_url(9), review_url(8), review_url(7)]
        );
        assert!(crawl.pages[1].hit_known);

        let requested = crawler.fetcher.requested();
        assert_eq!(requested.len(), 2);
        assert!(!requested.iter().any(|u| u.ends_with("?page=3")));
    }

    #[tokio::test]
    async fn test_empty_page_stops_company() {
        let acme = company("ACME");
        let fetcher = FakeFetcher::new()
            .page(&acme, 1, listing(&[3, 2]))
            .page(&acme, 2, "<html><body><p>Нет отзывов</p></body></html>".to_string());

        let crawler = IncrementalCrawler::new(fetcher, &crawl_config(5)).unwrap();
        let crawl = crawler.crawl_company(&acme, &HashSet::new()).await;

        assert_eq!(crawl.state, CrawlState::StopAtPage { page: 2 });
        assert_eq!(crawl.new_records.len(), 2);
        assert_eq!(crawler.fetcher.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_page_bound_exhausts_with_company_override() {
        let mut acme = company("ACME");
        acme.max_pages = Some(2);
        let fetcher = FakeFetcher::new()
            .page(&acme, 1, listing(&[6, 5]))
            .page(&acme, 2, listing(&[4, 3]))
            .page(&acme, 3, listing(&[2, 1]));

        let crawler = IncrementalCrawler::new(fetcher, &crawl_config(5)).unwrap();
        let crawl = crawler.crawl_company(&acme, &HashSet::new()).await;

        assert_eq!(crawl.state, CrawlState::Exhausted);
        assert_eq!(crawl.pages.len(), 2);
        assert_eq!(crawl.new_records.len(), 4);
    }

    #[tokio::test]
    async fn test_transport_failure_only_aborts_that_company() {
        let acme = company("ACME");
        let other = company("OTHER");
        let fetcher = FakeFetcher::new()
            .page(&acme, 1, listing(&[20]))
            .failing(&acme, 2)
            .page(&acme, 3, listing(&[18]))
            .page(&other, 1, listing(&[30, 29]));

        let crawler = IncrementalCrawler::new(fetcher, &crawl_config(3)).unwrap();
        let mut finished = Vec::new();
        let outcome = crawler
            .crawl(&[acme.clone(), other.clone()], &HashSet::new(), |c| {
                finished.push(c.company.clone())
            })
            .await;

        assert_eq!(finished, vec!["ACME".to_string(), "OTHER".to_string()]);
        assert_eq!(outcome.pages_fetched(), 3);
        assert_eq!(outcome.new_record_count(), 3);
        assert!(outcome.companies[0].state.is_failed());
        assert_eq!(outcome.companies[0].new_records.len(), 1);
        assert_eq!(outcome.companies[1].new_records.len(), 2);
        assert_eq!(outcome.companies[1].state, CrawlState::StopAtPage { page: 2 });
        assert!(!crawler
            .fetcher
            .requested()
            .iter()
            .any(|u| u.contains("/acme/?page=3")));

        let records = outcome.into_new_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].company, "ACME");
        assert_eq!(records[2].company, "OTHER");
    }

    #[tokio::test]
    async fn test_page_delay_applies_between_pages_only() {
        let acme = company("ACME");
        let fetcher = FakeFetcher::new()
            .page(&acme, 1, listing(&[6, 5]))
            .page(&acme, 2, listing(&[4, 3]))
            .page(&acme, 3, listing(&[2, 1]));
        let mut config = crawl_config(3);
        config.page_delay_ms = 60;

        let started = Instant::now();
        let crawler = IncrementalCrawler::new(fetcher, &config).unwrap();
        let crawl = crawler.crawl_company(&acme, &HashSet::new()).await;
        assert_eq!(crawl.state, CrawlState::Exhausted);

        let times = crawler.fetcher.request_times();
        assert_eq!(times.len(), 3);
        // First page goes out immediately
        assert!(times[0].duration_since(started) < Duration::from_millis(60));
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(60));
        }
    }

    #[test]
    fn test_absorb_page_counts_skips() {
        let extractor = RecordExtractor::new().unwrap();
        let html = r#"<article><p>no link</p></article>
            <article><a data-test="responses-header" href="/insurance/response/1/">ok</a></article>"#;
        let extraction = extractor.extract(html, "ACME", &Url::parse(BASE).unwrap());
        let mut records = Vec::new();
        let url = Url::parse(BASE).unwrap();
        let mut report = PageReport::new(1, &url, extraction.outcomes.len());

        let state = absorb_page(1, extraction, &HashSet::new(), &mut records, &mut report);

        assert_eq!(state, CrawlState::Continuing);
        assert_eq!(report.articles, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_walks_pages_with_user_agent() {
        let mock_server = MockServer::start().await;
        let mut config = crawl_config(5);
        config.base_url = format!("{}/", mock_server.uri());
        config.user_agent = "review-watch-test".to_string();
        let acme = company("ACME");

        Mock::given(method("GET"))
            .and(path("/insurance/responses/company/acme/"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body></body></html>".as_bytes().to_vec(), "text/html"),
            )
            .with_priority(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/insurance/responses/company/acme/"))
            .and(header("user-agent", "review-watch-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(listing(&[2, 1]).into_bytes(), "text/html"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&config).unwrap();
        let crawler = IncrementalCrawler::new(fetcher, &config).unwrap();
        let crawl = crawler.crawl_company(&acme, &HashSet::new()).await;

        assert_eq!(crawl.state, CrawlState::StopAtPage { page: 2 });
        assert_eq!(crawl.new_records.len(), 2);
        assert_eq!(
            crawl.new_records[0].complaint_url,
            format!("{}/insurance/response/2/", mock_server.uri())
        );
    }

    #[tokio::test]
    async fn test_http_fetcher_non_success_is_transport_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut config = crawl_config(1);
        config.base_url = format!("{}/", mock_server.uri());
        let fetcher = HttpFetcher::new(&config).unwrap();

        let url = Url::parse(&config.base_url).unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("503")));
    }
}
