//! The only module that talks `diesel`/`diesel_async` directly. Everything
//! else — crawler, engine, rank reconstructor, pipeline, dispatcher, read API
//! — goes through `StoreGateway`.

pub mod models;
pub mod schema;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Text, Timestamptz};
use diesel_async::RunQueryDsl;

use crate::app::DbPool;
use crate::error::Result;
use models::{
    ArchiveRecord, Contest, DataRegion, NewArchiveRecord, NewContest, NewPredictRecord,
    NewQuestion, NewSubmission, NewUser, PredictRecord, Question, Submission, User,
};

/// Participants whose `User` row hasn't been touched in this long are
/// eligible for a refresh before the predict pass fills their `old_rating`.
const STALE_USER_THRESHOLD_HOURS: i64 = 36;

#[derive(Clone)]
pub struct StoreGateway {
    pool: DbPool,
}

#[derive(QueryableByName, Debug, Clone)]
struct RegionUsernameRow {
    #[diesel(sql_type = Text)]
    data_region: String,
    #[diesel(sql_type = Text)]
    username: String,
}

impl StoreGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::deadpool::Object<diesel_async::AsyncPgConnection>>
    {
        self.pool
            .get()
            .await
            .map_err(|e| crate::error::Error::Pool(e.to_string()))
    }

    // ---- contests ----------------------------------------------------

    #[tracing::instrument(skip(self))]
    pub async fn find_contest(&self, slug: &str) -> Result<Option<Contest>> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::contests
            .filter(dsl::slug.eq(slug))
            .first(&mut conn)
            .await
            .optional()?)
    }

    /// Insert a contest if new, or refresh its mutable fields if seen before.
    #[tracing::instrument(skip(self, new))]
    pub async fn upsert_contest(&self, new: &NewContest) -> Result<Contest> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;

        diesel::insert_into(dsl::contests)
            .values(new)
            .on_conflict(dsl::slug)
            .do_update()
            .set(new)
            .execute(&mut conn)
            .await?;

        Ok(dsl::contests
            .filter(dsl::slug.eq(&new.slug))
            .first(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_predict_time(&self, slug: &str, at: DateTime<Utc>) -> Result<()> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;
        diesel::update(dsl::contests.filter(dsl::slug.eq(slug)))
            .set(dsl::predict_time.eq(at))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_user_num(
        &self,
        slug: &str,
        region: DataRegion,
        user_num: i32,
    ) -> Result<()> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;
        match region {
            DataRegion::Us => {
                diesel::update(dsl::contests.filter(dsl::slug.eq(slug)))
                    .set(dsl::user_num_us.eq(user_num))
                    .execute(&mut conn)
                    .await?;
            }
            DataRegion::Cn => {
                diesel::update(dsl::contests.filter(dsl::slug.eq(slug)))
                    .set(dsl::user_num_cn.eq(user_num))
                    .execute(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn recent_contests(&self, limit: i64, offset: i64) -> Result<Vec<Contest>> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::contests
            .order(dsl::start_time.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn count_contests(&self) -> Result<i64> {
        use schema::contests::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::contests.count().get_result(&mut conn).await?)
    }

    // ---- predict records (delete-then-insert) -------------------------

    /// Replaces the whole `PredictRecord` set for `contest_slug`. Duplicate
    /// `(data_region, username)` pairs in `records` keep the first
    /// occurrence; later ones are dropped with a warning.
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub async fn delete_then_insert_predict_records(
        &self,
        contest_slug: &str,
        records: Vec<NewPredictRecord>,
    ) -> Result<Vec<PredictRecord>> {
        use schema::predict_records::dsl;

        let mut seen = std::collections::HashSet::new();
        let mut deduped = Vec::with_capacity(records.len());
        for record in records {
            let key = (record.data_region.clone(), record.username.clone());
            if !seen.insert(key) {
                tracing::warn!(
                    username = %record.username,
                    data_region = %record.data_region,
                    "duplicate participant record, dropping"
                );
                continue;
            }
            deduped.push(record);
        }

        let mut conn = self.conn().await?;

        diesel::delete(dsl::predict_records.filter(dsl::contest_slug.eq(contest_slug)))
            .execute(&mut conn)
            .await?;

        if deduped.is_empty() {
            return Ok(Vec::new());
        }

        Ok(diesel::insert_into(dsl::predict_records)
            .values(&deduped)
            .get_results(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn predict_records_for_contest(
        &self,
        contest_slug: &str,
        only_scoring: bool,
    ) -> Result<Vec<PredictRecord>> {
        use schema::predict_records::dsl;
        let mut conn = self.conn().await?;

        let mut query = dsl::predict_records
            .filter(dsl::contest_slug.eq(contest_slug))
            .into_boxed();
        if only_scoring {
            query = query.filter(dsl::score.ne(0));
        }

        Ok(query.order(dsl::rank.asc()).load(&mut conn).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fill_predict_record_rating(
        &self,
        id: i32,
        old_rating: f64,
        attended_contests_count: i32,
    ) -> Result<()> {
        use schema::predict_records::dsl;
        let mut conn = self.conn().await?;
        diesel::update(dsl::predict_records.filter(dsl::id.eq(id)))
            .set((
                dsl::old_rating.eq(old_rating),
                dsl::attended_contests_count.eq(attended_contests_count),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn save_predicted_delta(
        &self,
        id: i32,
        new_rating: f64,
        delta_rating: f64,
    ) -> Result<()> {
        use schema::predict_records::dsl;
        let mut conn = self.conn().await?;
        diesel::update(dsl::predict_records.filter(dsl::id.eq(id)))
            .set((
                dsl::new_rating.eq(new_rating),
                dsl::delta_rating.eq(delta_rating),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn predicted_ratings(&self, usernames: &[String]) -> Result<Vec<PredictRecord>> {
        use schema::predict_records::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::predict_records
            .filter(dsl::username.eq_any(usernames))
            .load(&mut conn)
            .await?)
    }

    // ---- archive records (upsert-by-identity + tombstone) --------------

    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert_archive_records(&self, records: Vec<NewArchiveRecord>) -> Result<()> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;

        for record in &records {
            diesel::insert_into(dsl::archive_records)
                .values(record)
                .on_conflict((dsl::contest_slug, dsl::data_region, dsl::username))
                .do_update()
                .set(record)
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Deletes any `ArchiveRecord` for `contest_slug` last touched before
    /// `pipeline_start`, i.e. participants who vanished between crawls.
    #[tracing::instrument(skip(self))]
    pub async fn tombstone_archive_records(
        &self,
        contest_slug: &str,
        pipeline_start: DateTime<Utc>,
    ) -> Result<usize> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;
        Ok(diesel::delete(
            dsl::archive_records
                .filter(dsl::contest_slug.eq(contest_slug))
                .filter(dsl::update_time.lt(pipeline_start)),
        )
        .execute(&mut conn)
        .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_records_for_contest(&self, contest_slug: &str) -> Result<Vec<ArchiveRecord>> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::archive_records
            .filter(dsl::contest_slug.eq(contest_slug))
            .filter(dsl::score.ne(0))
            .load(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_records_page(
        &self,
        contest_slug: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ArchiveRecord>> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::archive_records
            .filter(dsl::contest_slug.eq(contest_slug))
            .order(dsl::rank.asc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_record_for_user(
        &self,
        contest_slug: &str,
        region: DataRegion,
        username: &str,
    ) -> Result<Option<ArchiveRecord>> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::archive_records
            .filter(dsl::contest_slug.eq(contest_slug))
            .filter(dsl::data_region.eq(region.as_str()))
            .filter(dsl::username.eq(username))
            .first(&mut conn)
            .await
            .optional()?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_archive_real_time_rank(
        &self,
        contest_slug: &str,
        region: DataRegion,
        username: &str,
        ranks: Vec<i32>,
    ) -> Result<()> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;
        diesel::update(
            dsl::archive_records
                .filter(dsl::contest_slug.eq(contest_slug))
                .filter(dsl::data_region.eq(region.as_str()))
                .filter(dsl::username.eq(username)),
        )
        .set(dsl::real_time_rank.eq(ranks))
        .execute(&mut conn)
        .await?;
        Ok(())
    }

    // ---- submissions / questions ---------------------------------------

    #[tracing::instrument(skip(self, subs), fields(count = subs.len()))]
    pub async fn upsert_submissions(&self, subs: Vec<NewSubmission>) -> Result<()> {
        use schema::submissions::dsl;
        let mut conn = self.conn().await?;
        for s in &subs {
            diesel::insert_into(dsl::submissions)
                .values(s)
                .on_conflict((dsl::contest_slug, dsl::data_region, dsl::username, dsl::question_id))
                .do_update()
                .set(s)
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn tombstone_submissions(
        &self,
        contest_slug: &str,
        pipeline_start: DateTime<Utc>,
    ) -> Result<usize> {
        use schema::submissions::dsl;
        let mut conn = self.conn().await?;
        Ok(diesel::delete(
            dsl::submissions
                .filter(dsl::contest_slug.eq(contest_slug))
                .filter(dsl::update_time.lt(pipeline_start)),
        )
        .execute(&mut conn)
        .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn submissions_up_to(
        &self,
        contest_slug: &str,
        at_or_before: DateTime<Utc>,
    ) -> Result<Vec<Submission>> {
        use schema::submissions::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::submissions
            .filter(dsl::contest_slug.eq(contest_slug))
            .filter(dsl::date.le(at_or_before))
            .load(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self, questions), fields(count = questions.len()))]
    pub async fn upsert_questions(&self, questions: Vec<NewQuestion>) -> Result<Vec<Question>> {
        use schema::questions::dsl;
        let mut conn = self.conn().await?;
        let mut saved = Vec::with_capacity(questions.len());
        for q in &questions {
            diesel::insert_into(dsl::questions)
                .values(q)
                .on_conflict(dsl::question_id)
                .do_update()
                .set(q)
                .execute(&mut conn)
                .await?;
            saved.push(
                dsl::questions
                    .filter(dsl::question_id.eq(q.question_id))
                    .first(&mut conn)
                    .await?,
            );
        }
        Ok(saved)
    }

    #[tracing::instrument(skip(self))]
    pub async fn tombstone_questions(
        &self,
        contest_slug: &str,
        pipeline_start: DateTime<Utc>,
    ) -> Result<usize> {
        use schema::questions::dsl;
        let mut conn = self.conn().await?;
        Ok(diesel::delete(
            dsl::questions
                .filter(dsl::contest_slug.eq(contest_slug))
                .filter(dsl::update_time.lt(pipeline_start)),
        )
        .execute(&mut conn)
        .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn questions_for_contest(&self, contest_slug: &str) -> Result<Vec<Question>> {
        use schema::questions::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::questions
            .filter(dsl::contest_slug.eq(contest_slug))
            .load(&mut conn)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_question_real_time_count(&self, question_id: i32, counts: Vec<i32>) -> Result<()> {
        use schema::questions::dsl;
        let mut conn = self.conn().await?;
        diesel::update(dsl::questions.filter(dsl::question_id.eq(question_id)))
            .set(dsl::real_time_count.eq(counts))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    // ---- users -----------------------------------------------------------

    #[tracing::instrument(skip(self))]
    pub async fn find_user(&self, region: DataRegion, username: &str) -> Result<Option<User>> {
        use schema::users::dsl;
        let mut conn = self.conn().await?;
        Ok(dsl::users
            .filter(dsl::data_region.eq(region.as_str()))
            .filter(dsl::username.eq(username))
            .first(&mut conn)
            .await
            .optional()?)
    }

    #[tracing::instrument(skip(self, new))]
    pub async fn upsert_user(&self, new: &NewUser) -> Result<()> {
        use schema::users::dsl;
        let mut conn = self.conn().await?;
        diesel::insert_into(dsl::users)
            .values(new)
            .on_conflict((dsl::data_region, dsl::username))
            .do_update()
            .set(new)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Writes the predictor's output straight back into `User`, used for
    /// biweekly contests only (see `pipeline::predict_pass`).
    #[tracing::instrument(skip(self))]
    pub async fn apply_predicted_rating(
        &self,
        region: DataRegion,
        username: &str,
        new_rating: f64,
        attended_contests_count: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        use schema::users::dsl;
        let mut conn = self.conn().await?;
        diesel::update(
            dsl::users
                .filter(dsl::data_region.eq(region.as_str()))
                .filter(dsl::username.eq(username)),
        )
        .set((
            dsl::rating.eq(new_rating),
            dsl::attended_contests_count.eq(attended_contests_count),
            dsl::update_time.eq(at),
        ))
        .execute(&mut conn)
        .await?;
        Ok(())
    }

    /// Participants of `contest_slug`'s predict records whose `User` row is
    /// missing or older than 36 hours, restricted to nonzero score — the set
    /// the predict pass needs fresh ratings for before it can compute deltas.
    #[tracing::instrument(skip(self))]
    pub async fn stale_predict_participants(
        &self,
        contest_slug: &str,
    ) -> Result<Vec<(DataRegion, String)>> {
        let mut conn = self.conn().await?;
        let cutoff = Utc::now() - chrono::Duration::hours(STALE_USER_THRESHOLD_HOURS);

        let rows: Vec<RegionUsernameRow> = diesel::sql_query(
            r#"
            SELECT DISTINCT pr.data_region, pr.username
            FROM predict_records pr
            WHERE pr.contest_slug = $1 AND pr.score != 0
              AND NOT EXISTS (
                SELECT 1 FROM users u
                WHERE u.data_region = pr.data_region
                  AND u.username = pr.username
                  AND u.update_time >= $2
              )
            "#,
        )
        .bind::<Text, _>(contest_slug)
        .bind::<Timestamptz, _>(cutoff)
        .load(&mut conn)
        .await?;

        rows.into_iter()
            .map(|r| Ok((r.data_region.parse()?, r.username)))
            .collect()
    }

    /// All distinct participants of an archive pass, unconditioned on
    /// staleness — mirrors the non-predict branch of the original
    /// `save_users_of_contest`, which refreshes every archived participant.
    #[tracing::instrument(skip(self))]
    pub async fn archive_participants(&self, contest_slug: &str) -> Result<Vec<(DataRegion, String)>> {
        use schema::archive_records::dsl;
        let mut conn = self.conn().await?;

        let rows: Vec<(String, String)> = dsl::archive_records
            .filter(dsl::contest_slug.eq(contest_slug))
            .select((dsl::data_region, dsl::username))
            .distinct()
            .load(&mut conn)
            .await?;

        rows.into_iter()
            .map(|(region, username)| Ok((region.parse()?, username)))
            .collect()
    }

    /// Grouped standing of every participant at a single grid instant:
    /// `Submission` rows with `date <= time_point`, grouped by
    /// `(username, data_region)`, pre-sorted by `(credit_sum DESC,
    /// penalty_date ASC)`. Tie-breaking and the trailing sentinel fill are
    /// the caller's job (`rank::reconstruct`) — ranking application-side
    /// keeps the tie semantics explicit instead of folding them into SQL.
    #[tracing::instrument(skip(self))]
    pub async fn grouped_standing_at(
        &self,
        contest_slug: &str,
        time_point: DateTime<Utc>,
    ) -> Result<Vec<GroupedStanding>> {
        let mut conn = self.conn().await?;

        let rows: Vec<GroupedStandingRow> = diesel::sql_query(
            r#"
            SELECT
                username,
                data_region,
                SUM(credit) AS credit_sum,
                MAX(date) + (SUM(fail_count) * interval '5 minutes') AS penalty_date
            FROM submissions
            WHERE contest_slug = $1 AND date <= $2
            GROUP BY username, data_region
            ORDER BY credit_sum DESC, penalty_date ASC
            "#,
        )
        .bind::<Text, _>(contest_slug)
        .bind::<Timestamptz, _>(time_point)
        .load(&mut conn)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(GroupedStanding {
                    username: r.username,
                    data_region: r.data_region.parse()?,
                    credit_sum: r.credit_sum,
                    penalty_date: r.penalty_date,
                })
            })
            .collect()
    }
}

#[derive(QueryableByName, Debug, Clone)]
struct GroupedStandingRow {
    #[diesel(sql_type = Text)]
    username: String,
    #[diesel(sql_type = Text)]
    data_region: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    credit_sum: i64,
    #[diesel(sql_type = Timestamptz)]
    penalty_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GroupedStanding {
    pub username: String,
    pub data_region: DataRegion,
    pub credit_sum: i64,
    pub penalty_date: DateTime<Utc>,
}
