//! Adapters that shape upstream LeetCode JSON/GraphQL responses into the
//! records the pipeline persists. All HTTP traffic goes through
//! `crate::fetcher::Fetcher`; nothing here opens a connection directly.

pub mod contests;
pub mod questions;
pub mod ranking;
pub mod user;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::store::models::DataRegion;

fn unix_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRankingRecord {
    pub contest_id: i64,
    pub username: String,
    #[serde(default)]
    pub user_slug: Option<String>,
    pub rank: i32,
    pub score: i32,
    pub finish_time: i64,
    pub data_region: String,
}

impl RawRankingRecord {
    /// US ranking entries frequently omit `username`, carrying the login
    /// slug only; CN entries carry both. This mirrors the original's
    /// `record_dict.get("user_slug", record_dict.get("username"))` override,
    /// applied only for the US region.
    pub fn resolved_username(&self, region: DataRegion) -> String {
        match region {
            DataRegion::Us => self
                .user_slug
                .clone()
                .unwrap_or_else(|| self.username.clone()),
            DataRegion::Cn => self.username.clone(),
        }
    }

    pub fn finish_time_utc(&self) -> DateTime<Utc> {
        unix_to_utc(self.finish_time)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubmission {
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub fail_count: i32,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub status: Option<i32>,
}

impl RawSubmission {
    pub fn date_utc(&self) -> DateTime<Utc> {
        unix_to_utc(self.date)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    pub question_id: i32,
    pub title: String,
    #[serde(default)]
    pub english_title: Option<String>,
    pub title_slug: String,
    pub credit: i32,
}

impl RawQuestion {
    /// CN responses carry an `english_title` override; when present it wins.
    pub fn resolved_title(&self) -> String {
        self.english_title.clone().unwrap_or_else(|| self.title.clone())
    }
}
