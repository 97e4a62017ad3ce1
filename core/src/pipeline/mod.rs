//! The prediction pipeline orchestrator: the sequence that runs once a
//! contest starts (readiness poll → predict pass → rate → archive pass) plus
//! the standalone jobs the dispatcher arms around it (pre-cache, contest
//! list refresh, last-contest correction).

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::app::App;
use crate::crawler::{contests, questions, ranking, user, RawRankingRecord, RawSubmission};
use crate::dispatcher;
use crate::engine::{convolution::ConvolutionEngine, RatingEngine};
use crate::error::Result;
use crate::rank;
use crate::store::models::{
    DataRegion, NewArchiveRecord, NewContest, NewPredictRecord, NewQuestion, NewSubmission, NewUser,
    NEW_USER_CONTESTS_ATTENDED, NEW_USER_INITIAL_RATING,
};
use crate::store::StoreGateway;

pub const DEFAULT_MAX_READINESS_ATTEMPTS: u32 = 300;
const READINESS_POLL_SECONDS: u64 = 60;

/// Bound on concurrent "simple write" store calls — matches the original's
/// `asyncio.gather(..., limit=50)` for non-upsert-with-io-contention paths.
const SIMPLE_WRITE_CONCURRENCY: usize = 50;
/// Upserts that fight over row locks get a tighter cap.
const UPSERT_CONCURRENCY: usize = 5;
const CN_USER_REFRESH_CONCURRENCY: usize = 1;
const US_USER_REFRESH_CONCURRENCY: usize = 5;

fn store_of(app: &App) -> StoreGateway {
    StoreGateway::new(app.diesel.clone())
}

// ---- the full post-start run -------------------------------------------

/// Polls CN's `user_num` every 60s until two consecutive reads agree (or
/// `max_attempts` is exhausted), then runs the predict → rate → archive
/// sequence regardless of whether readiness was confirmed.
#[tracing::instrument(skip(app))]
pub async fn run_prediction_pipeline(app: &App, contest_slug: &str, max_attempts: u32) {
    let mut previous: Option<i32> = None;
    let mut ready = false;

    for attempt in 0..max_attempts {
        let current = ranking::probe_user_num(&app.http, contest_slug, DataRegion::Cn).await;
        if let (Some(prev), Some(cur)) = (previous, current) {
            if prev == cur {
                ready = true;
                break;
            }
        }
        previous = current;
        tracing::debug!(contest_slug, attempt, current, "CN readiness poll");
        tokio::time::sleep(StdDuration::from_secs(READINESS_POLL_SECONDS)).await;
    }

    if !ready {
        tracing::error!(contest_slug, max_attempts, "CN data never stabilized, proceeding anyway");
    }

    if let Err(err) = save_recent_and_next_two_contests(app).await {
        tracing::error!(?err, "failed to refresh contest list before prediction");
    }
    if let Err(err) = save_predict_contest_records(app, contest_slug, DataRegion::Cn).await {
        tracing::error!(?err, contest_slug, "predict pass failed");
    }
    if let Err(err) = predict_contests(app, contest_slug).await {
        tracing::error!(?err, contest_slug, "rating prediction failed");
    }
    if let Err(err) = save_archive_contest_records(app, contest_slug, DataRegion::Cn, false).await {
        tracing::error!(?err, contest_slug, "archive pass failed");
    }
}

/// A lighter warm-up pass run twice before the contest ends: both regions'
/// predict records, without the archive/submission machinery.
#[tracing::instrument(skip(app))]
pub async fn pre_cache_users(app: &App, contest_slug: &str) {
    for region in [DataRegion::Cn, DataRegion::Us] {
        if let Err(err) = save_predict_contest_records(app, contest_slug, region).await {
            tracing::error!(?err, contest_slug, ?region, "pre-cache predict save failed");
        }
    }
}

/// Off-slot tick job: pulls the recent-past and upcoming-two contest lists
/// and upserts them.
#[tracing::instrument(skip(app))]
pub async fn refresh_contest_list(app: &App) {
    if let Err(err) = save_recent_and_next_two_contests(app).await {
        tracing::error!(?err, "contest list refresh failed");
    }
}

async fn save_recent_and_next_two_contests(app: &App) -> Result<()> {
    let store = store_of(app);

    let recent = contests::fetch_recent_contests(&app.http).await?;
    let upcoming = contests::fetch_next_two_contests(&app.http).await?;

    for contest in recent.into_iter().chain(upcoming) {
        let new_contest = NewContest {
            slug: contest.title_slug,
            title: contest.title,
            start_time: contest.start_time,
            duration_seconds: contest.duration_seconds,
            end_time: contest.start_time + chrono::Duration::seconds(contest.duration_seconds as i64),
            past: contest.start_time + chrono::Duration::seconds(contest.duration_seconds as i64) < Utc::now(),
        };
        store.upsert_contest(&new_contest).await?;
    }

    Ok(())
}

/// Off-slot correction job: re-runs the archive pass (only) for the current
/// weekly and biweekly contests, against CN data.
#[tracing::instrument(skip(app))]
pub async fn update_last_contests(app: &App) {
    let now = Utc::now();
    let weekly_ref = app.config.weekly_contest_ref;
    let biweekly_ref = app.config.biweekly_contest_ref;

    let weekly_weeks = dispatcher::weeks_since(weekly_ref.start_time, now);
    let weekly_slug = dispatcher::weekly_contest_slug(weekly_ref.number + weekly_weeks);

    let biweekly_weeks = dispatcher::weeks_since(biweekly_ref.start_time, now);
    let biweekly_slug = dispatcher::biweekly_contest_slug(biweekly_ref.number + biweekly_weeks.div_euclid(2));

    for slug in [weekly_slug, biweekly_slug] {
        if let Err(err) = save_archive_contest_records(app, &slug, DataRegion::Cn, false).await {
            tracing::error!(?err, slug, "last-contest archive refresh failed");
        }
    }
}

// ---- predict pass --------------------------------------------------------

#[tracing::instrument(skip(app))]
pub async fn save_predict_contest_records(app: &App, contest_slug: &str, region: DataRegion) -> Result<()> {
    let store = store_of(app);
    let (records, _submissions) = ranking::fetch_contest_records(&app.http, contest_slug, region).await?;
    let now = Utc::now();

    let new_records: Vec<NewPredictRecord> = records
        .iter()
        .map(|r| to_new_predict_record(r, contest_slug, region, now))
        .collect();

    let saved = store.delete_then_insert_predict_records(contest_slug, new_records).await?;

    save_users_of_contest(app, contest_slug, true).await?;

    let scoring: Vec<_> = saved.into_iter().filter(|r| r.score != 0).collect();
    let http = app.http.clone();
    stream::iter(scoring)
        .map(|record| {
            let store = store.clone();
            let http = http.clone();
            async move {
                let region: DataRegion = record.data_region.parse()?;
                let (rating, attended) = user::fetch_user_rating(&http, region, &record.username).await;
                let rating = rating.unwrap_or(NEW_USER_INITIAL_RATING);
                let attended = attended.unwrap_or(NEW_USER_CONTESTS_ATTENDED);
                store.fill_predict_record_rating(record.id, rating, attended).await
            }
        })
        .buffer_unordered(SIMPLE_WRITE_CONCURRENCY)
        .for_each(|result: Result<()>| {
            if let Err(err) = result {
                tracing::error!(?err, "failed to fill predict record rating");
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

fn to_new_predict_record(
    raw: &RawRankingRecord,
    contest_slug: &str,
    region: DataRegion,
    now: DateTime<Utc>,
) -> NewPredictRecord {
    NewPredictRecord {
        contest_slug: contest_slug.to_string(),
        username: raw.resolved_username(region),
        user_slug: raw.user_slug.clone().unwrap_or_default(),
        data_region: region.as_str().to_string(),
        rank: raw.rank,
        score: raw.score,
        finish_time: raw.finish_time_utc(),
        attended_contests_count: NEW_USER_CONTESTS_ATTENDED,
        old_rating: NEW_USER_INITIAL_RATING,
        update_time: now,
    }
}

/// `predictor.py`'s rating step, minus its `records`/`ranks` variable-swap
/// bug: `ranks` is built straight from `records`, not from an undefined name.
#[tracing::instrument(skip(app))]
pub async fn predict_contests(app: &App, contest_slug: &str) -> Result<()> {
    let store = store_of(app);
    let records = store.predict_records_for_contest(contest_slug, true).await?;

    let ranks: Vec<i32> = records.iter().map(|r| r.rank).collect();
    let old_ratings: Vec<f64> = records.iter().map(|r| r.old_rating).collect();
    let ks: Vec<i32> = records.iter().map(|r| r.attended_contests_count).collect();

    let deltas = ConvolutionEngine.elo_delta(&ranks, &old_ratings, &ks);

    let is_biweekly = contest_slug.to_lowercase().starts_with("bi");
    let now = Utc::now();

    for (record, delta) in records.iter().zip(deltas.iter()) {
        let new_rating = record.old_rating + delta;
        store.save_predicted_delta(record.id, new_rating, *delta).await?;

        if is_biweekly {
            let region: DataRegion = record.data_region.parse()?;
            store
                .apply_predicted_rating(
                    region,
                    &record.username,
                    new_rating,
                    record.attended_contests_count + 1,
                    now,
                )
                .await?;
        }
    }

    store.set_predict_time(contest_slug, now).await?;
    Ok(())
}

// ---- archive pass ---------------------------------------------------------

#[tracing::instrument(skip(app))]
pub async fn save_archive_contest_records(
    app: &App,
    contest_slug: &str,
    region: DataRegion,
    save_users: bool,
) -> Result<()> {
    let store = store_of(app);
    let pipeline_start = Utc::now();

    let (records, nested_submissions) = ranking::fetch_contest_records(&app.http, contest_slug, region).await?;

    let new_records: Vec<NewArchiveRecord> = records
        .iter()
        .map(|r| to_new_archive_record(r, contest_slug, region, pipeline_start))
        .collect();
    store.upsert_archive_records(new_records).await?;
    store.tombstone_archive_records(contest_slug, pipeline_start).await?;

    if save_users {
        save_users_of_contest(app, contest_slug, false).await?;
    }

    save_submission(
        app,
        contest_slug,
        &records,
        &nested_submissions,
        pipeline_start,
        region,
        true,
    )
    .await?;

    Ok(())
}

fn to_new_archive_record(
    raw: &RawRankingRecord,
    contest_slug: &str,
    region: DataRegion,
    now: DateTime<Utc>,
) -> NewArchiveRecord {
    NewArchiveRecord {
        contest_slug: contest_slug.to_string(),
        username: raw.resolved_username(region),
        user_slug: raw.user_slug.clone().unwrap_or_default(),
        data_region: region.as_str().to_string(),
        rank: raw.rank,
        score: raw.score,
        finish_time: raw.finish_time_utc(),
        attended_contests_count: NEW_USER_CONTESTS_ATTENDED,
        old_rating: NEW_USER_INITIAL_RATING,
        update_time: now,
    }
}

// ---- user refresh ----------------------------------------------------------

/// `predict=true`: only participants whose `User` row is missing or stale.
/// `predict=false`: every distinct archived participant, unconditionally.
#[tracing::instrument(skip(app))]
pub async fn save_users_of_contest(app: &App, contest_slug: &str, predict: bool) -> Result<()> {
    let store = store_of(app);
    let participants = if predict {
        store.stale_predict_participants(contest_slug).await?
    } else {
        store.archive_participants(contest_slug).await?
    };

    let (cn, us): (Vec<_>, Vec<_>) = participants.into_iter().partition(|(region, _)| *region == DataRegion::Cn);

    let cn_task = refresh_users(app, cn, CN_USER_REFRESH_CONCURRENCY);
    let us_task = refresh_users(app, us, US_USER_REFRESH_CONCURRENCY);
    futures::future::join(cn_task, us_task).await;

    Ok(())
}

async fn refresh_users(app: &App, participants: Vec<(DataRegion, String)>, concurrency: usize) {
    stream::iter(participants)
        .map(|(region, username)| async move { upsert_user_rating(app, region, &username, true).await })
        .buffer_unordered(concurrency)
        .for_each(|result: Result<()>| {
            if let Err(err) = result {
                tracing::error!(?err, "failed to refresh user rating");
            }
            futures::future::ready(())
        })
        .await;
}

async fn upsert_user_rating(app: &App, region: DataRegion, username: &str, save_new_user: bool) -> Result<()> {
    let store = store_of(app);
    let (rating, attended) = user::fetch_user_rating(&app.http, region, username).await;

    if rating.is_none() && !save_new_user {
        return Ok(());
    }

    let new_user = NewUser {
        data_region: region.as_str().to_string(),
        username: username.to_string(),
        user_slug: username.to_string(),
        rating: rating.unwrap_or(NEW_USER_INITIAL_RATING),
        attended_contests_count: attended.unwrap_or(NEW_USER_CONTESTS_ATTENDED),
        update_time: Utc::now(),
    };
    store.upsert_user(&new_user).await
}

// ---- submissions / questions -----------------------------------------------

#[tracing::instrument(skip(app, records, nested_submissions))]
async fn save_submission(
    app: &App,
    contest_slug: &str,
    records: &[RawRankingRecord],
    nested_submissions: &[HashMap<i32, RawSubmission>],
    pipeline_start: DateTime<Utc>,
    region: DataRegion,
    track_real_time_rank: bool,
) -> Result<()> {
    let store = store_of(app);
    let credit_map = save_questions(app, contest_slug).await?;

    let mut new_submissions = Vec::new();
    for (record, by_question) in records.iter().zip(nested_submissions.iter()) {
        let username = record.resolved_username(region);
        for (question_id, submission) in by_question {
            let credit = credit_map.get(question_id).copied().unwrap_or(0);
            new_submissions.push(NewSubmission {
                contest_slug: contest_slug.to_string(),
                data_region: region.as_str().to_string(),
                username: username.clone(),
                question_id: *question_id,
                date: submission.date_utc(),
                fail_count: submission.fail_count,
                credit,
                lang: submission.lang.clone(),
                status: submission.status.map(|s| s.to_string()),
                update_time: pipeline_start,
            });
        }
    }

    stream::iter(new_submissions)
        .map(|submission| {
            let store = store.clone();
            async move { store.upsert_submissions(vec![submission]).await }
        })
        .buffer_unordered(UPSERT_CONCURRENCY)
        .for_each(|result: Result<()>| {
            if let Err(err) = result {
                tracing::error!(?err, "failed to upsert submission batch");
            }
            futures::future::ready(())
        })
        .await;

    store.tombstone_submissions(contest_slug, pipeline_start).await?;

    save_questions_real_time_count(app, contest_slug).await?;

    if track_real_time_rank {
        if let Some(start_time) =
            dispatcher::infer_contest_start(contest_slug, app.config.weekly_contest_ref, app.config.biweekly_contest_ref)
        {
            let series = rank::reconstruct(&store, contest_slug, start_time, 1).await?;
            for ((username, region), ranks) in series {
                store.set_archive_real_time_rank(contest_slug, region, &username, ranks).await?;
            }
        } else {
            tracing::warn!(contest_slug, "could not infer contest start, skipping real-time rank tracking");
        }
    }

    Ok(())
}

#[tracing::instrument(skip(app))]
async fn save_questions(app: &App, contest_slug: &str) -> Result<HashMap<i32, i32>> {
    let store = store_of(app);
    let now = Utc::now();

    let Some(raw_questions) = questions::fetch_question_list(&app.http, contest_slug, DataRegion::Cn).await else {
        tracing::warn!(contest_slug, "question list fetch failed, keeping previously stored questions");
        let existing = store.questions_for_contest(contest_slug).await?;
        return Ok(existing.into_iter().map(|q| (q.question_id, q.credit)).collect());
    };

    let new_questions: Vec<NewQuestion> = raw_questions
        .iter()
        .enumerate()
        .map(|(idx, q)| NewQuestion {
            contest_slug: contest_slug.to_string(),
            question_id: q.question_id,
            title: q.resolved_title(),
            title_slug: q.title_slug.clone(),
            credit: q.credit,
            qi: idx as i32 + 1,
            update_time: now,
        })
        .collect();

    let saved = store.upsert_questions(new_questions).await?;
    store.tombstone_questions(contest_slug, now).await?;

    Ok(saved.into_iter().map(|q| (q.question_id, q.credit)).collect())
}

#[tracing::instrument(skip(app))]
async fn save_questions_real_time_count(app: &App, contest_slug: &str) -> Result<()> {
    let store = store_of(app);

    let Some(start_time) =
        dispatcher::infer_contest_start(contest_slug, app.config.weekly_contest_ref, app.config.biweekly_contest_ref)
    else {
        return Ok(());
    };

    let questions = store.questions_for_contest(contest_slug).await?;
    let end_time = start_time + chrono::Duration::minutes(90);

    for question in questions {
        let mut counts = Vec::new();
        let mut time_point = start_time + chrono::Duration::minutes(1);
        while time_point <= end_time {
            let subs = store.submissions_up_to(contest_slug, time_point).await?;
            let count = subs.iter().filter(|s| s.question_id == question.question_id).count() as i32;
            counts.push(count);
            time_point += chrono::Duration::minutes(1);
        }
        store.set_question_real_time_count(question.question_id, counts).await?;
    }

    Ok(())
}
