use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::{archive_records, contests, predict_records, questions, submissions, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataRegion {
    Us,
    Cn,
}

impl DataRegion {
    pub fn as_str(self) -> &'static str {
        match self {
            DataRegion::Us => "US",
            DataRegion::Cn => "CN",
        }
    }
}

impl std::fmt::Display for DataRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataRegion {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "US" => Ok(DataRegion::Us),
            "CN" => Ok(DataRegion::Cn),
            other => Err(crate::error::Error::MalformedPayload(format!(
                "unknown data_region `{other}`"
            ))),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = contests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contest {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i32,
    pub end_time: DateTime<Utc>,
    pub past: bool,
    pub predict_time: Option<DateTime<Utc>>,
    pub user_num_us: Option<i32>,
    pub user_num_cn: Option<i32>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = contests)]
pub struct NewContest {
    pub slug: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i32,
    pub end_time: DateTime<Utc>,
    pub past: bool,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = predict_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PredictRecord {
    pub id: i32,
    pub contest_slug: String,
    pub username: String,
    pub user_slug: String,
    pub data_region: String,
    pub rank: i32,
    pub score: i32,
    pub finish_time: DateTime<Utc>,
    pub attended_contests_count: i32,
    pub old_rating: f64,
    pub new_rating: Option<f64>,
    pub delta_rating: Option<f64>,
    pub update_time: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = predict_records)]
pub struct NewPredictRecord {
    pub contest_slug: String,
    pub username: String,
    pub user_slug: String,
    pub data_region: String,
    pub rank: i32,
    pub score: i32,
    pub finish_time: DateTime<Utc>,
    pub attended_contests_count: i32,
    pub old_rating: f64,
    pub update_time: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = archive_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ArchiveRecord {
    pub id: i32,
    pub contest_slug: String,
    pub username: String,
    pub user_slug: String,
    pub data_region: String,
    pub rank: i32,
    pub score: i32,
    pub finish_time: DateTime<Utc>,
    pub attended_contests_count: i32,
    pub old_rating: f64,
    pub new_rating: Option<f64>,
    pub delta_rating: Option<f64>,
    pub real_time_rank: Vec<i32>,
    pub update_time: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = archive_records)]
pub struct NewArchiveRecord {
    pub contest_slug: String,
    pub username: String,
    pub user_slug: String,
    pub data_region: String,
    pub rank: i32,
    pub score: i32,
    pub finish_time: DateTime<Utc>,
    pub attended_contests_count: i32,
    pub old_rating: f64,
    pub update_time: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub data_region: String,
    pub username: String,
    pub user_slug: String,
    pub rating: f64,
    pub attended_contests_count: i32,
    pub update_time: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub data_region: String,
    pub username: String,
    pub user_slug: String,
    pub rating: f64,
    pub attended_contests_count: i32,
    pub update_time: DateTime<Utc>,
}

pub const NEW_USER_INITIAL_RATING: f64 = 1500.0;
pub const NEW_USER_CONTESTS_ATTENDED: i32 = 0;

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = questions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Question {
    pub id: i32,
    pub contest_slug: String,
    pub question_id: i32,
    pub title: String,
    pub title_slug: String,
    pub credit: i32,
    pub qi: i32,
    pub real_time_count: Vec<i32>,
    pub update_time: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = questions)]
pub struct NewQuestion {
    pub contest_slug: String,
    pub question_id: i32,
    pub title: String,
    pub title_slug: String,
    pub credit: i32,
    pub qi: i32,
    pub update_time: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Submission {
    pub id: i32,
    pub contest_slug: String,
    pub data_region: String,
    pub username: String,
    pub question_id: i32,
    pub date: DateTime<Utc>,
    pub fail_count: i32,
    pub credit: i32,
    pub lang: Option<String>,
    pub status: Option<String>,
    pub update_time: DateTime<Utc>,
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = submissions)]
pub struct NewSubmission {
    pub contest_slug: String,
    pub data_region: String,
    pub username: String,
    pub question_id: i32,
    pub date: DateTime<Utc>,
    pub fail_count: i32,
    pub credit: i32,
    pub lang: Option<String>,
    pub status: Option<String>,
    pub update_time: DateTime<Utc>,
}
