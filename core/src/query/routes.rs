use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::{AppError, Error};
use crate::store::models::{ArchiveRecord, Contest, DataRegion};
use crate::store::StoreGateway;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
/// The read API caps bulk rating lookups the same way the original's ad-hoc
/// scripts did: a contest rarely needs more than two dozen names at once.
const MAX_BULK_USERNAMES: usize = 26;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PageQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Serialize)]
pub struct ContestListResponse {
    contests: Vec<Contest>,
    total: i64,
}

#[tracing::instrument(skip(ctx))]
pub async fn list_contests(
    State(ctx): State<App>,
    Query(page): Query<PageQuery>,
) -> Result<axum::Json<ContestListResponse>, AppError> {
    let store = StoreGateway::new(ctx.diesel.clone());
    let contests = store.recent_contests(page.limit(), page.offset()).await?;
    let total = store.count_contests().await?;
    Ok(axum::Json(ContestListResponse { contests, total }))
}

#[derive(Debug, Serialize)]
pub struct ContestCountResponse {
    total: i64,
}

#[tracing::instrument(skip(ctx))]
pub async fn count_contests(State(ctx): State<App>) -> Result<axum::Json<ContestCountResponse>, AppError> {
    let store = StoreGateway::new(ctx.diesel.clone());
    let total = store.count_contests().await?;
    Ok(axum::Json(ContestCountResponse { total }))
}

#[derive(Debug, Serialize)]
pub struct ArchiveRecordPage {
    records: Vec<ArchiveRecord>,
}

#[tracing::instrument(skip(ctx))]
pub async fn list_records(
    State(ctx): State<App>,
    Path(contest_slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<axum::Json<ArchiveRecordPage>, AppError> {
    let store = StoreGateway::new(ctx.diesel.clone());
    let records = store
        .archive_records_page(&contest_slug, page.limit(), page.offset())
        .await?;
    Ok(axum::Json(ArchiveRecordPage { records }))
}

#[tracing::instrument(skip(ctx))]
pub async fn get_user_record(
    State(ctx): State<App>,
    Path((contest_slug, region, username)): Path<(String, String, String)>,
) -> Result<axum::Json<ArchiveRecord>, AppError> {
    let region: DataRegion = region.parse()?;
    let store = StoreGateway::new(ctx.diesel.clone());
    let record = store
        .archive_record_for_user(&contest_slug, region, &username)
        .await?
        .ok_or_else(|| Error::MalformedPayload(format!("no record for {username} in {contest_slug}")))?;
    Ok(axum::Json(record))
}

#[derive(Debug, Deserialize)]
pub struct BulkRatingRequest {
    usernames: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkRatingResponse {
    ratings: Vec<crate::store::models::PredictRecord>,
}

#[tracing::instrument(skip(ctx, body))]
pub async fn bulk_ratings(
    State(ctx): State<App>,
    crate::json::Json(body): crate::json::Json<BulkRatingRequest>,
) -> Result<axum::Json<BulkRatingResponse>, AppError> {
    if body.usernames.len() > MAX_BULK_USERNAMES {
        return Err(Error::MalformedPayload(format!(
            "at most {MAX_BULK_USERNAMES} usernames per request"
        ))
        .into());
    }

    let store = StoreGateway::new(ctx.diesel.clone());
    let ratings = store.predicted_ratings(&body.usernames).await?;
    Ok(axum::Json(BulkRatingResponse { ratings }))
}

#[derive(Debug, Serialize)]
pub struct RealTimeRankResponse {
    ranks: Vec<i32>,
}

#[tracing::instrument(skip(ctx))]
pub async fn real_time_rank(
    State(ctx): State<App>,
    Path((contest_slug, region, username)): Path<(String, String, String)>,
) -> Result<axum::Json<RealTimeRankResponse>, AppError> {
    let region: DataRegion = region.parse()?;
    let store = StoreGateway::new(ctx.diesel.clone());
    let record = store
        .archive_record_for_user(&contest_slug, region, &username)
        .await?
        .ok_or_else(|| Error::MalformedPayload(format!("no record for {username} in {contest_slug}")))?;
    Ok(axum::Json(RealTimeRankResponse {
        ranks: record.real_time_rank,
    }))
}
