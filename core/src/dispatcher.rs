//! The scheduler: a one-minute tick loop that recognizes the two fixed
//! contest start slots (weekly Sunday 02:30 UTC, biweekly Saturday 14:30 UTC)
//! and arms the prediction pipeline's delayed follow-up jobs around them.
//! Grounded on the teacher's `tokio::spawn` + `tokio::time::interval`
//! background-task shape (`recommendation::start_background_crawl`), since
//! nothing here needs a persistent job queue — every job this process arms
//! either fires within the next 95 minutes or is superseded by the next tick.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};

use crate::app::App;
use crate::config::ContestReference;
use crate::pipeline;

const TICK_SECONDS: u64 = 60;

struct DailySlot {
    weekday: Weekday,
    hour: u32,
    minute: u32,
}

const WEEKLY_CONTEST_TIME: DailySlot = DailySlot {
    weekday: Weekday::Sun,
    hour: 2,
    minute: 30,
};

const BIWEEKLY_CONTEST_TIME: DailySlot = DailySlot {
    weekday: Weekday::Sat,
    hour: 14,
    minute: 30,
};

fn matches_slot(now: DateTime<Utc>, slot: &DailySlot) -> bool {
    now.weekday() == slot.weekday && now.hour() == slot.hour && now.minute() == slot.minute
}

/// Whole weeks elapsed from `reference` to `now`. Floors toward zero/negative
/// for `now` before `reference`, matching the original's
/// `floor((now - base).total_seconds() / (7*86400))`.
pub fn weeks_since(reference: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (now - reference).num_seconds();
    seconds.div_euclid(7 * 86400)
}

pub fn weekly_contest_slug(number: i64) -> String {
    format!("weekly-contest-{number}")
}

pub fn biweekly_contest_slug(number: i64) -> String {
    format!("biweekly-contest-{number}")
}

/// Recovers a contest's start instant from its slug, by anchoring the
/// trailing contest number against the appropriate reference.
pub fn infer_contest_start(
    contest_slug: &str,
    weekly_ref: ContestReference,
    biweekly_ref: ContestReference,
) -> Option<DateTime<Utc>> {
    let (prefix, rest) = contest_slug.rsplit_once('-')?;
    let number: i64 = rest.parse().ok()?;

    if prefix.starts_with("weekly") {
        Some(weekly_ref.start_time + Duration::weeks(number - weekly_ref.number))
    } else if prefix.starts_with("biweekly") {
        Some(biweekly_ref.start_time + Duration::weeks(2 * (number - biweekly_ref.number)))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    WeeklyContest { slug: String },
    BiweeklyContest { slug: String },
    BiweeklySkipped { would_be_slug: String },
    Refresh,
}

/// Pure tick logic: given the current instant and the two contest
/// references, decides what this minute's tick should arm.
pub fn decide(now: DateTime<Utc>, weekly_ref: ContestReference, biweekly_ref: ContestReference) -> Decision {
    if matches_slot(now, &WEEKLY_CONTEST_TIME) {
        let weeks = weeks_since(weekly_ref.start_time, now);
        return Decision::WeeklyContest {
            slug: weekly_contest_slug(weekly_ref.number + weeks),
        };
    }

    if matches_slot(now, &BIWEEKLY_CONTEST_TIME) {
        let weeks = weeks_since(biweekly_ref.start_time, now);
        let biweek_number = biweekly_ref.number + weeks.div_euclid(2);
        let slug = biweekly_contest_slug(biweek_number);
        return if weeks.rem_euclid(2) == 0 {
            Decision::BiweeklyContest { slug }
        } else {
            Decision::BiweeklySkipped { would_be_slug: slug }
        };
    }

    Decision::Refresh
}

/// Arms the post-start pipeline jobs for a freshly-started contest: two
/// pre-cache passes at +25min/+70min and the full prediction run at +95min.
fn schedule_contest_jobs(app: Arc<App>, contest_slug: String) {
    let pre_cache_25 = app.clone();
    let slug_25 = contest_slug.clone();
    tokio::spawn(async move {
        tokio::time::sleep(StdDuration::from_secs(25 * 60)).await;
        pipeline::pre_cache_users(&pre_cache_25, &slug_25).await;
    });

    let pre_cache_70 = app.clone();
    let slug_70 = contest_slug.clone();
    tokio::spawn(async move {
        tokio::time::sleep(StdDuration::from_secs(70 * 60)).await;
        pipeline::pre_cache_users(&pre_cache_70, &slug_70).await;
    });

    tokio::spawn(async move {
        tokio::time::sleep(StdDuration::from_secs(95 * 60)).await;
        pipeline::run_prediction_pipeline(&app, &contest_slug, pipeline::DEFAULT_MAX_READINESS_ATTEMPTS).await;
    });
}

/// Background marker type held by `App`; carries no mutable state today but
/// gives the dispatcher a place to grow scheduling metrics without changing
/// `App`'s shape.
pub struct DispatcherState {}

impl DispatcherState {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for DispatcherState {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the one-minute tick loop. Runs until the process exits.
pub async fn run(app: Arc<App>) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(TICK_SECONDS));
    loop {
        interval.tick().await;
        let now = Utc::now();
        let decision = decide(now, app.config.weekly_contest_ref, app.config.biweekly_contest_ref);

        match decision {
            Decision::WeeklyContest { slug } => {
                tracing::info!(slug, "arming weekly contest pipeline");
                schedule_contest_jobs(app.clone(), slug);
            }
            Decision::BiweeklyContest { slug } => {
                tracing::info!(slug, "arming biweekly contest pipeline");
                schedule_contest_jobs(app.clone(), slug);
            }
            Decision::BiweeklySkipped { would_be_slug } => {
                tracing::info!(would_be_slug, "odd biweekly week, skipping");
            }
            Decision::Refresh => {
                let refresh_app = app.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(StdDuration::from_secs(60)).await;
                    pipeline::refresh_contest_list(&refresh_app).await;
                });

                let update_app = app.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(StdDuration::from_secs(10 * 60)).await;
                    pipeline::update_last_contests(&update_app).await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_ref() -> ContestReference {
        ContestReference {
            number: 294,
            start_time: "2022-05-22T02:30:00Z".parse().unwrap(),
        }
    }

    fn biweekly_ref() -> ContestReference {
        ContestReference {
            number: 78,
            start_time: "2022-05-14T14:30:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn weekly_slot_arms_the_right_contest_number() {
        let now: DateTime<Utc> = "2023-05-21T02:30:00Z".parse().unwrap();
        let decision = decide(now, weekly_ref(), biweekly_ref());
        assert_eq!(
            decision,
            Decision::WeeklyContest {
                slug: "weekly-contest-346".into()
            }
        );
    }

    #[test]
    fn biweekly_slot_arms_on_even_weeks_and_skips_odd() {
        let even_week: DateTime<Utc> = "2022-05-14T14:30:00Z".parse().unwrap();
        assert_eq!(
            decide(even_week, weekly_ref(), biweekly_ref()),
            Decision::BiweeklyContest {
                slug: "biweekly-contest-78".into()
            }
        );

        let odd_week: DateTime<Utc> = "2022-05-21T14:30:00Z".parse().unwrap();
        match decide(odd_week, weekly_ref(), biweekly_ref()) {
            Decision::BiweeklySkipped { would_be_slug } => {
                assert_eq!(would_be_slug, "biweekly-contest-78")
            }
            other => panic!("expected BiweeklySkipped, got {other:?}"),
        }
    }

    #[test]
    fn off_slot_minutes_fall_back_to_refresh() {
        let now: DateTime<Utc> = "2023-05-21T03:00:00Z".parse().unwrap();
        assert_eq!(decide(now, weekly_ref(), biweekly_ref()), Decision::Refresh);
    }

    #[test]
    fn infers_weekly_contest_start_from_slug() {
        let start = infer_contest_start("weekly-contest-346", weekly_ref(), biweekly_ref()).unwrap();
        let expected: DateTime<Utc> = "2023-05-21T02:30:00Z".parse().unwrap();
        assert_eq!(start, expected);
    }
}
