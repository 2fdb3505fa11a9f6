//! Listing-page HTML extraction

use super::{non_empty_text, ArticleOutcome, PageExtraction, SkipReason};
use crate::error::{Error, Result};
use crate::models::{parse_timestamp, ReviewRecord};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const ARTICLE: &str = "article";
const HEADER_LINK: &str = r#"a[data-test="responses-header"]"#;
const MESSAGE: &str = r#"div[data-test="responses-message"]"#;
const DATETIME: &str = r#"time[data-test="responses-datetime"]"#;
const RATING: &str = r#"span[data-test="responses-rating-grade"]"#;
const PAYOUT_RATING: &str = "strong.font-size-medium";
const STATUS: &str = r#"span[data-test="responses-status"]"#;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("invalid selector '{}': {:?}", css, e)))
}

/// Turns a review listing page into review records.
///
/// Every field apart from the header link is optional; a missing field never
/// prevents the rest of the article from being read.
pub struct RecordExtractor {
    article: Selector,
    header_link: Selector,
    message: Selector,
    datetime: Selector,
    rating: Selector,
    payout_rating: Selector,
    status: Selector,
}

impl RecordExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            article: selector(ARTICLE)?,
            header_link: selector(HEADER_LINK)?,
            message: selector(MESSAGE)?,
            datetime: selector(DATETIME)?,
            rating: selector(RATING)?,
            payout_rating: selector(PAYOUT_RATING)?,
            status: selector(STATUS)?,
        })
    }

    /// Extract every article block of a page, in page order.
    ///
    /// Links are resolved against `base`, the portal root.
    pub fn extract(&self, content: &str, company: &str, base: &Url) -> PageExtraction {
        let document = Html::parse_document(content);
        let outcomes = document
            .select(&self.article)
            .map(|article| self.extract_article(article, company, base))
            .collect();

        PageExtraction { outcomes }
    }

    fn extract_article(&self, article: ElementRef<'_>, company: &str, base: &Url) -> ArticleOutcome {
        let Some(link) = article.select(&self.header_link).next() else {
            return ArticleOutcome::Skipped(SkipReason::MissingIdentity);
        };
        let Some(href) = link.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            return ArticleOutcome::Skipped(SkipReason::MissingIdentity);
        };
        let complaint_url = match base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!("Cannot resolve review link {}: {}", href, e);
                return ArticleOutcome::Skipped(SkipReason::InvalidUrl(href.to_string()));
            }
        };

        let timestamp = article
            .select(&self.datetime)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .and_then(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    debug!("Unrecognized review datetime '{}' at {}", raw, complaint_url);
                }
                parsed
            });

        ArticleOutcome::Extracted(ReviewRecord {
            company: company.to_string(),
            title: element_text(link),
            status: self.first_text(article, &self.status),
            body_text: self.first_text(article, &self.message),
            timestamp,
            rating: self.first_text(article, &self.rating),
            payout_rating: self.first_text(article, &self.payout_rating),
            complaint_url,
        })
    }

    fn first_text(&self, article: ElementRef<'_>, selector: &Selector) -> Option<String> {
        article.select(selector).next().and_then(element_text)
    }
}

fn element_text(elem: ElementRef<'_>) -> Option<String> {
    non_empty_text(&elem.text().collect::<String>())
}
