// SPDX-License-Identifier: MIT

//! Vetter: audit your social-media history for content risks
//!
//! Pipeline: fetch posts/likes/bookmarks into a local SQLite store,
//! batch them through Gemini for content-risk classification, and
//! aggregate the verdicts into a severity-ranked report.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod gemini;
pub mod report;

pub use config::AppConfig;
pub use error::{Result, VetterError};
