//! Default values for configuration

use super::{ActionTemplate, CompanyConfig, ProblemKeywords};
use crate::models::ProblemTag;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default reviews portal
pub fn default_base_url() -> String {
    "https://www.banki.ru/".to_string()
}

/// Default user agent (the portal rejects obvious bots)
pub fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/90.0.4430.212 Safari/537.36"
        .to_string()
}

/// Default request timeout in seconds
pub fn default_timeout_secs() -> u64 {
    30
}

/// Default pause between page fetches in milliseconds
pub fn default_page_delay_ms() -> u64 {
    100
}

/// Default maximum listing pages per company
pub fn default_max_pages() -> u32 {
    5
}

/// The portal's certificate chain does not validate everywhere
pub fn default_accept_invalid_certs() -> bool {
    true
}

/// Default companies to watch
pub fn default_companies() -> Vec<CompanyConfig> {
    vec![
        CompanyConfig {
            id: "СБСЖ".to_string(),
            path: "insurance/responses/company/sberbankstrahovaniezhizni/".to_string(),
            max_pages: None,
        },
        CompanyConfig {
            id: "СБС".to_string(),
            path: "insurance/responses/company/sberbankstrahovanie/".to_string(),
            max_pages: None,
        },
    ]
}

pub fn default_table_file() -> PathBuf {
    PathBuf::from("reviews.csv")
}

/// Workbook with the classified reviews, recommendations and charts
pub fn default_report_file() -> PathBuf {
    PathBuf::from("reviews.xlsx")
}

/// Default keyword stems per problem tag
pub fn default_problem_keywords() -> Vec<ProblemKeywords> {
    let table: [(ProblemTag, &[&str]); 5] = [
        (ProblemTag::Payouts, &["выплат", "деньги", "компенсац", "возмещен"]),
        (ProblemTag::Timeliness, &["срок", "долго", "ждал", "задержк"]),
        (
            ProblemTag::Service,
            &["сотрудник", "менеджер", "вежлив", "груб", "обслуж"],
        ),
        (ProblemTag::Documents, &["документ", "справк", "бумаг", "оформлен"]),
        (
            ProblemTag::InsuranceCaseDenial,
            &["отказ", "непризнан", "страховой случай"],
        ),
    ];

    table
        .into_iter()
        .map(|(tag, stems)| ProblemKeywords {
            tag,
            stems: stems.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

/// Default number of ranked problems that get a recommendation
pub fn default_top_n() -> usize {
    3
}

/// Poor reviews above this count trigger the general recommendation
pub fn default_general_threshold() -> usize {
    10
}

fn template(primary: &str, secondary: &str) -> ActionTemplate {
    ActionTemplate {
        primary: primary.to_string(),
        secondary: vec![secondary.to_string()],
    }
}

/// Default action templates per problem tag
pub fn default_action_templates() -> BTreeMap<ProblemTag, ActionTemplate> {
    BTreeMap::from([
        (
            ProblemTag::Payouts,
            template(
                "Audit the payout pipeline and publish a clear payout timeline",
                "Proactively notify clients about payout status changes",
            ),
        ),
        (
            ProblemTag::Timeliness,
            template(
                "Introduce internal deadlines for claim handling",
                "Send clients progress updates on open claims",
            ),
        ),
        (
            ProblemTag::Service,
            template(
                "Run customer-service training for front-line staff",
                "Add a satisfaction survey after each contact",
            ),
        ),
        (
            ProblemTag::Documents,
            template(
                "Simplify and publish the required document checklist",
                "Accept documents through an online upload channel",
            ),
        ),
        (
            ProblemTag::InsuranceCaseDenial,
            template(
                "Review denial criteria and explain each denial in writing",
                "Offer an appeal procedure with a named contact",
            ),
        ),
    ])
}

/// Default template for the general improvement recommendation
pub fn default_general_template() -> ActionTemplate {
    template(
        "Set up a dedicated review-response team for negative feedback",
        "Track the share of poor reviews as a service quality KPI",
    )
}

/// Default interval between scheduled ticks in seconds
pub fn default_interval_secs() -> u64 {
    60
}
