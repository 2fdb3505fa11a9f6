//! Report output: one workbook with the classified reviews, the
//! recommendations and the distribution charts
//!
//! Sheet order is fixed: `Reviews` first, `Recommendations` only when there is
//! something to recommend, then `Charts` holding the chart data and the bar
//! charts drawn from it. The workbook is rebuilt in full on every analysis.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ClassifiedReview, Recommendation, TIMESTAMP_FORMAT};
use crate::stats::ReviewStats;
use crate::store::TABLE_COLUMNS;
use rust_xlsxwriter::{Chart, ChartType, Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REVIEWS_SHEET: &str = "Reviews";
pub const RECOMMENDATIONS_SHEET: &str = "Recommendations";
pub const CHARTS_SHEET: &str = "Charts";

const DERIVED_COLUMNS: [&str; 2] = ["Category", "ProblemTags"];
const RECOMMENDATION_COLUMNS: [&str; 3] = ["Category", "PrimaryAction", "SecondaryActions"];

/// Longest string a worksheet cell accepts
const MAX_CELL_CHARS: usize = 32_767;

/// One bar of a distribution chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartBar {
    pub label: String,
    pub count: usize,
}

/// Data behind the rating and problem distribution charts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartData {
    pub rating_distribution: Vec<ChartBar>,
    pub problem_distribution: Vec<ChartBar>,
}

impl ChartData {
    /// Both distributions sorted by descending count
    pub fn from_stats(stats: &ReviewStats) -> Self {
        Self {
            rating_distribution: stats
                .ranked_categories()
                .into_iter()
                .map(|(label, count)| ChartBar {
                    label: label.to_string(),
                    count,
                })
                .collect(),
            problem_distribution: stats
                .ranked_problems()
                .into_iter()
                .map(|(tag, count)| ChartBar {
                    label: tag.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

/// Writes the analysis results to the report workbook
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.report_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the workbook and replace the previous one
    pub fn write(
        &self,
        reviews: &[ClassifiedReview],
        stats: &ReviewStats,
        recommendations: &[Recommendation],
    ) -> Result<()> {
        let mut workbook = build_workbook(reviews, &ChartData::from_stats(stats), recommendations)
            .map_err(|e| Error::persistence(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::persistence(&self.path, e))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        if let Err(e) = workbook.save(&tmp_path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Error::persistence(&self.path, e));
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| Error::persistence(&self.path, e))?;

        info!(
            "Report saved to {:?} ({} reviews, {} recommendations)",
            self.path,
            reviews.len(),
            recommendations.len()
        );
        Ok(())
    }
}

/// Assemble the report workbook in memory
pub fn build_workbook(
    reviews: &[ClassifiedReview],
    charts: &ChartData,
    recommendations: &[Recommendation],
) -> std::result::Result<Workbook, XlsxError> {
    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();

    workbook.push_worksheet(reviews_sheet(reviews, &header)?);

    if recommendations.is_empty() {
        debug!("No recommendations this run");
    } else {
        workbook.push_worksheet(recommendations_sheet(recommendations, &header)?);
    }

    workbook.push_worksheet(charts_sheet(charts, &header)?);
    Ok(workbook)
}

fn reviews_sheet(
    reviews: &[ClassifiedReview],
    header: &Format,
) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(REVIEWS_SHEET)?;

    for (col, name) in TABLE_COLUMNS.iter().chain(DERIVED_COLUMNS.iter()).enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, header)?;
    }

    for (i, review) in reviews.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, value) in table_row(review).iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row, col as u16, cell_text(value))?;
            }
        }
    }

    Ok(sheet)
}

fn recommendations_sheet(
    recommendations: &[Recommendation],
    header: &Format,
) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(RECOMMENDATIONS_SHEET)?;

    for (col, name) in RECOMMENDATION_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, header)?;
    }

    for (i, rec) in recommendations.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, rec.subject.to_string())?;
        sheet.write_string(row, 1, cell_text(&rec.primary_action))?;
        sheet.write_string(row, 2, cell_text(&rec.secondary_actions.join("; ")))?;
    }

    Ok(sheet)
}

/// Distribution tables in columns A:B and D:E with a bar chart beside each
fn charts_sheet(charts: &ChartData, header: &Format) -> std::result::Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(CHARTS_SHEET)?;

    write_distribution(&mut sheet, 0, ("Category", "Reviews"), &charts.rating_distribution, header)?;
    write_distribution(&mut sheet, 3, ("Problem", "Mentions"), &charts.problem_distribution, header)?;

    if let Some(chart) = bar_chart(
        ChartType::Column,
        "Rating distribution",
        ("Category", "Reviews"),
        0,
        charts.rating_distribution.len(),
    ) {
        sheet.insert_chart(0, 7, &chart)?;
    }

    if let Some(chart) = bar_chart(
        ChartType::Bar,
        "Problems in poor reviews",
        ("Mentions", "Problem"),
        3,
        charts.problem_distribution.len(),
    ) {
        sheet.insert_chart(20, 7, &chart)?;
    }

    Ok(sheet)
}

fn write_distribution(
    sheet: &mut Worksheet,
    first_col: u16,
    headings: (&str, &str),
    bars: &[ChartBar],
    header: &Format,
) -> std::result::Result<(), XlsxError> {
    sheet.write_string_with_format(0, first_col, headings.0, header)?;
    sheet.write_string_with_format(0, first_col + 1, headings.1, header)?;

    for (i, bar) in bars.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, first_col, bar.label.as_str())?;
        sheet.write_number(row, first_col + 1, bar.count as f64)?;
    }
    Ok(())
}

/// A single-series chart over a distribution table; `None` when it has no rows
fn bar_chart(
    kind: ChartType,
    title: &str,
    axes: (&str, &str),
    first_col: u16,
    rows: usize,
) -> Option<Chart> {
    if rows == 0 {
        return None;
    }
    let last_row = rows as u32;

    let mut chart = Chart::new(kind);
    chart.title().set_name(title);
    chart.x_axis().set_name(axes.0);
    chart.y_axis().set_name(axes.1);
    chart.legend().set_hidden();
    chart
        .add_series()
        .set_categories((CHARTS_SHEET, 1, first_col, last_row, first_col))
        .set_values((CHARTS_SHEET, 1, first_col + 1, last_row, first_col + 1));

    Some(chart)
}

fn table_row(review: &ClassifiedReview) -> [String; 10] {
    let r = &review.record;
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        r.company.clone(),
        r.complaint_url.clone(),
        text(&r.title),
        text(&r.status),
        text(&r.body_text),
        r.timestamp
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        text(&r.rating),
        text(&r.payout_rating),
        review.category.to_string(),
        review.tags_column(),
    ]
}

fn cell_text(value: &str) -> String {
    if value.chars().count() <= MAX_CELL_CHARS {
        value.to_string()
    } else {
        value.chars().take(MAX_CELL_CHARS).collect()
    }
}

/// Print the analysis summary to console
pub fn print_summary(stats: &ReviewStats, recommendations: &[Recommendation]) {
    println!("\n📊 Review Analysis\n");
    println!("Reviews analyzed: {}", stats.total);
    for (label, count) in stats.ranked_categories() {
        println!("  {}: {}", label, count);
    }

    println!("\nPoor reviews: {}", stats.bad_count);
    let ranked = stats.ranked_problems();
    if ranked.is_empty() {
        println!("No problems found in poor reviews.");
    } else {
        println!("Problem distribution:");
        for (tag, count) in ranked {
            println!("- {} ({}): {} mentions", tag, tag.local_name(), count);
        }
    }

    if !recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in recommendations {
            println!("- [{}] {}", rec.subject, rec.primary_action);
            for action in &rec.secondary_actions {
                println!("    · {}", action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryLabel, ProblemTag, RecommendationSubject, ReviewRecord};
    use crate::stats::aggregate;
    use tempfile::TempDir;

    fn classified() -> Vec<ClassifiedReview> {
        let mut record = ReviewRecord::new("СБС", "https://www.banki.ru/insurance/response/1/");
        record.body_text = Some("Долго, \"очень\" долго".to_string());
        record.rating = Some("1".to_string());
        vec![ClassifiedReview {
            record,
            category: CategoryLabel::Poor,
            tags: [ProblemTag::Timeliness, ProblemTag::Payouts].into_iter().collect(),
        }]
    }

    fn recommendation() -> Recommendation {
        Recommendation {
            subject: RecommendationSubject::Problem(ProblemTag::Payouts),
            primary_action: "Fix payouts".to_string(),
            secondary_actions: vec!["Notify".to_string(), "Audit".to_string()],
        }
    }

    fn sheet_names(workbook: &mut Workbook) -> Vec<String> {
        workbook.worksheets_mut().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_recommendations_sheet_follows_reviews() {
        let reviews = classified();
        let charts = ChartData::from_stats(&aggregate(&reviews));

        let mut workbook = build_workbook(&reviews, &charts, &[recommendation()]).unwrap();

        assert_eq!(
            sheet_names(&mut workbook),
            vec![REVIEWS_SHEET, RECOMMENDATIONS_SHEET, CHARTS_SHEET]
        );
    }

    #[test]
    fn test_no_recommendations_sheet_when_empty() {
        let reviews = classified();
        let charts = ChartData::from_stats(&aggregate(&reviews));

        let mut workbook = build_workbook(&reviews, &charts, &[]).unwrap();

        assert_eq!(sheet_names(&mut workbook), vec![REVIEWS_SHEET, CHARTS_SHEET]);
    }

    #[test]
    fn test_reviews_row_carries_derived_columns() {
        let row = table_row(&classified()[0]);
        assert_eq!(row[8], "Poor");
        assert_eq!(row[9], "payouts; timeliness");
        assert_eq!(row[6], "1");
    }

    #[test]
    fn test_write_replaces_single_workbook() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("reviews.xlsx");
        let writer = ReportWriter::new(&path);
        let reviews = classified();
        let stats = aggregate(&reviews);

        writer.write(&reviews, &stats, &[recommendation()]).unwrap();
        writer.write(&reviews, &stats, &[]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_empty_table_still_writes_workbook() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reviews.xlsx");

        ReportWriter::new(&path)
            .write(&[], &ReviewStats::default(), &[])
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_chart_data_sorted_by_count() {
        let mut stats = ReviewStats {
            total: 4,
            bad_count: 3,
            ..ReviewStats::default()
        };
        stats.category_counts.insert(CategoryLabel::Excellent, 1);
        stats.category_counts.insert(CategoryLabel::Poor, 3);
        stats.problem_stats.insert(ProblemTag::Documents, 1);
        stats.problem_stats.insert(ProblemTag::Service, 2);

        let data = ChartData::from_stats(&stats);

        assert_eq!(data.rating_distribution[0].label, "Poor");
        assert_eq!(data.problem_distribution[0].label, "service");
        assert_eq!(data.problem_distribution[1].count, 1);
        assert!(bar_chart(ChartType::Bar, "t", ("x", "y"), 3, 0).is_none());
    }

    #[test]
    fn test_overlong_text_is_truncated_to_cell_limit() {
        let long = "я".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(cell_text(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(cell_text("short"), "short");
    }
}
