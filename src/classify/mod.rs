//! Rating categorization and keyword-based problem tagging

use crate::config::ProblemKeywords;
use crate::error::{Error, Result};
use crate::models::{CategoryLabel, ClassifiedReview, ProblemTag, ReviewRecord};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Keyword stems per problem tag, in matching order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    groups: Vec<ProblemKeywords>,
}

impl KeywordTable {
    pub fn new(groups: Vec<ProblemKeywords>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[ProblemKeywords] {
        &self.groups
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new(crate::config::default_problem_keywords())
    }
}

/// Stateless classifier built from an immutable keyword table.
///
/// A stem matches when it starts at a word boundary; the end is open, so
/// `выплат` matches `выплатили`. Open-ended stems also overmatch: `отказ`
/// fires on `отказался` even when the client is the one declining.
pub struct TextClassifier {
    matchers: Vec<(ProblemTag, Regex)>,
}

impl TextClassifier {
    pub fn new(table: &KeywordTable) -> Result<Self> {
        let mut matchers = Vec::with_capacity(table.groups().len());

        for group in table.groups() {
            let alternatives = group
                .stems
                .iter()
                .map(|stem| regex::escape(&stem.to_lowercase()))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"\b(?:{})", alternatives)).map_err(|e| {
                Error::Parse(format!("invalid keyword stems for '{}': {}", group.tag, e))
            })?;
            matchers.push((group.tag, regex));
        }

        Ok(Self { matchers })
    }

    /// Map a raw grade (`"4"`, `"3.9"`, `"2,5"`) to a category.
    ///
    /// Anything that is not a finite number is `Undetermined`.
    pub fn classify_rating(&self, raw: Option<&str>) -> CategoryLabel {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            debug!("Review has no rating");
            return CategoryLabel::Undetermined;
        };

        match raw.replace(',', ".").parse::<f64>() {
            Ok(value) if value.is_finite() => {
                if value >= 4.0 {
                    CategoryLabel::Excellent
                } else if value >= 3.0 {
                    CategoryLabel::Average
                } else {
                    CategoryLabel::Poor
                }
            }
            Ok(value) => {
                warn!("Rating '{}' is not finite ({})", raw, value);
                CategoryLabel::Undetermined
            }
            Err(e) => {
                warn!("Cannot parse rating '{}': {}", raw, e);
                CategoryLabel::Undetermined
            }
        }
    }

    /// Problem tags whose stems occur in `text`
    pub fn extract_problem_tags(&self, text: Option<&str>) -> BTreeSet<ProblemTag> {
        let Some(text) = text else {
            return BTreeSet::new();
        };
        let lowered = text.to_lowercase();

        self.matchers
            .iter()
            .filter(|(_, regex)| regex.is_match(&lowered))
            .map(|(tag, _)| *tag)
            .collect()
    }

    pub fn classify(&self, record: &ReviewRecord) -> ClassifiedReview {
        ClassifiedReview {
            category: self.classify_rating(record.rating.as_deref()),
            tags: self.extract_problem_tags(record.body_text.as_deref()),
            record: record.clone(),
        }
    }

    /// Classify every record, preserving table order
    pub fn classify_all<'a, I>(&self, records: I) -> Vec<ClassifiedReview>
    where
        I: IntoIterator<Item = &'a ReviewRecord>,
    {
        records.into_iter().map(|r| self.classify(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TextClassifier {
        TextClassifier::new(&KeywordTable::default()).unwrap()
    }

    fn tags(list: &[ProblemTag]) -> BTreeSet<ProblemTag> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_rating_boundaries() {
        let c = classifier();
        assert_eq!(c.classify_rating(Some("4")), CategoryLabel::Excellent);
        assert_eq!(c.classify_rating(Some("5")), CategoryLabel::Excellent);
        assert_eq!(c.classify_rating(Some("3.9")), CategoryLabel::Average);
        assert_eq!(c.classify_rating(Some("3")), CategoryLabel::Average);
        assert_eq!(c.classify_rating(Some("2,5")), CategoryLabel::Poor);
        assert_eq!(c.classify_rating(Some(" 1 ")), CategoryLabel::Poor);
    }

    #[test]
    fn test_unparseable_rating_is_undetermined() {
        let c = classifier();
        assert_eq!(c.classify_rating(Some("abc")), CategoryLabel::Undetermined);
        assert_eq!(c.classify_rating(Some("")), CategoryLabel::Undetermined);
        assert_eq!(c.classify_rating(None), CategoryLabel::Undetermined);
        assert_eq!(c.classify_rating(Some("NaN")), CategoryLabel::Undetermined);
    }

    #[test]
    fn test_tags_from_text() {
        let c = classifier();
        assert_eq!(
            c.extract_problem_tags(Some("Деньги не выплатили, ждал три месяца")),
            tags(&[ProblemTag::Payouts, ProblemTag::Timeliness])
        );
        assert_eq!(
            c.extract_problem_tags(Some("Деньги не выплатили вовремя")),
            tags(&[ProblemTag::Payouts])
        );
        assert_eq!(
            c.extract_problem_tags(Some("ГРУБЫЙ менеджер, отказ в выплате")),
            tags(&[
                ProblemTag::Payouts,
                ProblemTag::Service,
                ProblemTag::InsuranceCaseDenial
            ])
        );
        assert_eq!(
            c.extract_problem_tags(Some("Не признали страховой случай")),
            tags(&[ProblemTag::InsuranceCaseDenial])
        );
    }

    #[test]
    fn test_stem_must_start_at_word_boundary() {
        let c = classifier();
        // "предоформление" contains "оформлен" mid-word
        assert!(c.extract_problem_tags(Some("предоформление")).is_empty());
        assert!(c.extract_problem_tags(Some("сорокалетний клиент")).is_empty());
        assert_eq!(
            c.extract_problem_tags(Some("нарушили сроков")),
            tags(&[ProblemTag::Timeliness])
        );
    }

    #[test]
    fn test_missing_text_has_no_tags() {
        let c = classifier();
        assert!(c.extract_problem_tags(None).is_empty());
        assert!(c.extract_problem_tags(Some("Всё отлично, спасибо")).is_empty());
    }

    #[test]
    fn test_substitute_keyword_table() {
        let table = KeywordTable::new(vec![ProblemKeywords {
            tag: ProblemTag::Documents,
            stems: vec!["Polic".to_string()],
        }]);
        let c = TextClassifier::new(&table).unwrap();
        assert_eq!(
            c.extract_problem_tags(Some("Lost my policy again")),
            tags(&[ProblemTag::Documents])
        );
        assert!(c.extract_problem_tags(Some("выплат нет")).is_empty());
    }

    #[test]
    fn test_classify_record() {
        let c = classifier();
        let mut record = ReviewRecord::new("СБСЖ", "https://www.banki.ru/insurance/response/1/");
        record.rating = Some("1".to_string());
        record.body_text = Some("Потеряли документы".to_string());

        let classified = c.classify(&record);
        assert_eq!(classified.category, CategoryLabel::Poor);
        assert_eq!(classified.tags, tags(&[ProblemTag::Documents]));
        assert_eq!(classified.record, record);
    }
}
