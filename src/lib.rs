//! review-watch - incremental review scraping and problem reporting
//!
//! This crate provides:
//! - An incremental crawler for paginated review listings
//! - A flat CSV review table with merge/dedup semantics
//! - Keyword-based problem tagging and rating categories
//! - Statistics, ranked recommendations and a report writer
//! - A fixed-interval scheduler running crawl + analysis ticks

pub mod classify;
pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod models;
pub mod parse;
pub mod progress;
pub mod recommend;
pub mod report;
pub mod stats;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
