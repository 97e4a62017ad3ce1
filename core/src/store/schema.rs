// @generated-by-hand: mirrors what `diesel print-schema` would emit against
// the migrations this crate assumes are already applied. See the `CREATE
// INDEX` statements documented above each table.

#[allow(unused_imports)]
use diesel::sql_types::*;

diesel::table! {
    // CREATE UNIQUE INDEX contests_slug_idx ON contests (slug);
    // CREATE INDEX contests_start_time_idx ON contests (start_time);
    // CREATE INDEX contests_end_time_idx ON contests (end_time);
    // CREATE INDEX contests_predict_time_idx ON contests (predict_time);
    contests (id) {
        id -> Int4,
        slug -> Text,
        title -> Text,
        start_time -> Timestamptz,
        duration_seconds -> Int4,
        end_time -> Timestamptz,
        past -> Bool,
        predict_time -> Nullable<Timestamptz>,
        user_num_us -> Nullable<Int4>,
        user_num_cn -> Nullable<Int4>,
    }
}

diesel::table! {
    // CREATE INDEX predict_records_contest_slug_idx ON predict_records (contest_slug);
    // CREATE INDEX predict_records_username_idx ON predict_records (username);
    // CREATE INDEX predict_records_user_slug_idx ON predict_records (user_slug);
    // CREATE INDEX predict_records_rank_idx ON predict_records (rank);
    // CREATE INDEX predict_records_data_region_idx ON predict_records (data_region);
    predict_records (id) {
        id -> Int4,
        contest_slug -> Text,
        username -> Text,
        user_slug -> Text,
        data_region -> Text,
        rank -> Int4,
        score -> Int4,
        finish_time -> Timestamptz,
        attended_contests_count -> Int4,
        old_rating -> Float8,
        new_rating -> Nullable<Float8>,
        delta_rating -> Nullable<Float8>,
        update_time -> Timestamptz,
    }
}

diesel::table! {
    // CREATE UNIQUE INDEX archive_records_identity_idx
    //   ON archive_records (contest_slug, data_region, username);
    // CREATE INDEX archive_records_username_idx ON archive_records (username);
    // CREATE INDEX archive_records_user_slug_idx ON archive_records (user_slug);
    // CREATE INDEX archive_records_rank_idx ON archive_records (rank);
    // CREATE INDEX archive_records_data_region_idx ON archive_records (data_region);
    archive_records (id) {
        id -> Int4,
        contest_slug -> Text,
        username -> Text,
        user_slug -> Text,
        data_region -> Text,
        rank -> Int4,
        score -> Int4,
        finish_time -> Timestamptz,
        attended_contests_count -> Int4,
        old_rating -> Float8,
        new_rating -> Nullable<Float8>,
        delta_rating -> Nullable<Float8>,
        real_time_rank -> Array<Int4>,
        update_time -> Timestamptz,
    }
}

diesel::table! {
    // CREATE UNIQUE INDEX questions_question_id_idx ON questions (question_id);
    // CREATE INDEX questions_title_slug_idx ON questions (title_slug);
    // CREATE INDEX questions_contest_slug_idx ON questions (contest_slug);
    questions (id) {
        id -> Int4,
        contest_slug -> Text,
        question_id -> Int4,
        title -> Text,
        title_slug -> Text,
        credit -> Int4,
        qi -> Int4,
        real_time_count -> Array<Int4>,
        update_time -> Timestamptz,
    }
}

diesel::table! {
    // CREATE UNIQUE INDEX submissions_identity_idx
    //   ON submissions (contest_slug, data_region, username, question_id);
    // CREATE INDEX submissions_contest_slug_idx ON submissions (contest_slug);
    // CREATE INDEX submissions_username_idx ON submissions (username);
    // CREATE INDEX submissions_data_region_idx ON submissions (data_region);
    // CREATE INDEX submissions_question_id_idx ON submissions (question_id);
    // CREATE INDEX submissions_date_idx ON submissions (date);
    submissions (id) {
        id -> Int4,
        contest_slug -> Text,
        data_region -> Text,
        username -> Text,
        question_id -> Int4,
        date -> Timestamptz,
        fail_count -> Int4,
        credit -> Int4,
        lang -> Nullable<Text>,
        status -> Nullable<Text>,
        update_time -> Timestamptz,
    }
}

diesel::table! {
    // CREATE UNIQUE INDEX users_identity_idx ON users (data_region, username);
    // CREATE INDEX users_username_idx ON users (username);
    // CREATE INDEX users_user_slug_idx ON users (user_slug);
    // CREATE INDEX users_rating_idx ON users (rating);
    users (id) {
        id -> Int4,
        data_region -> Text,
        username -> Text,
        user_slug -> Text,
        rating -> Float8,
        attended_contests_count -> Int4,
        update_time -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    contests,
    predict_records,
    archive_records,
    questions,
    submissions,
    users,
);
