//! Reconstructs each participant's rank at 1-minute-resolution points across
//! the 90-minute contest window, from raw submissions — the data we can only
//! get fresh from the live ranking API for a narrow crawl window, so the
//! replay has to be rebuilt from what we stored.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::store::models::DataRegion;
use crate::store::{GroupedStanding, StoreGateway};

const CONTEST_WINDOW_MINUTES: i64 = 90;

/// `(username, data_region) -> raw_rank` at one instant, plus the sentinel
/// value (the last raw_rank assigned) for participants absent at this point.
pub struct Standing {
    pub ranks: HashMap<(String, DataRegion), i32>,
    pub sentinel_rank: i32,
}

/// Walks `rows` (already sorted by `(credit_sum DESC, penalty_date ASC)`)
/// assigning a 1-based `raw_rank` to each row, carrying the rank forward as
/// `tie_rank` whenever both `credit_sum` and `penalty_date` exactly match the
/// previous row.
pub fn aggregate_rank(rows: &[GroupedStanding]) -> Standing {
    let mut ranks = HashMap::with_capacity(rows.len());
    let mut raw_rank = 0;
    let mut prev_key: Option<(i64, DateTime<Utc>)> = None;
    let mut tie_rank = 0;

    for row in rows {
        raw_rank += 1;
        let key = (row.credit_sum, row.penalty_date);
        let rank = if prev_key == Some(key) {
            tie_rank
        } else {
            raw_rank
        };
        tie_rank = rank;
        prev_key = Some(key);
        ranks.insert((row.username.clone(), row.data_region), rank);
    }

    Standing {
        ranks,
        sentinel_rank: raw_rank,
    }
}

/// For every 1-minute grid point from `start + delta` to `start + 90min`,
/// computes each participant's rank and appends it to their running series.
/// A participant absent at a given point (hasn't submitted yet, or dropped
/// out of the standings query entirely) gets `sentinel_rank + 1` so that
/// `series[user].len() == step` holds after every iteration.
#[tracing::instrument(skip(store))]
pub async fn reconstruct(
    store: &StoreGateway,
    contest_slug: &str,
    start_time: DateTime<Utc>,
    delta_minutes: i64,
) -> Result<HashMap<(String, DataRegion), Vec<i32>>> {
    let mut series: HashMap<(String, DataRegion), Vec<i32>> = HashMap::new();
    let end_time = start_time + Duration::minutes(CONTEST_WINDOW_MINUTES);

    let mut step = 0_i64;
    let mut time_point = start_time + Duration::minutes(delta_minutes);

    while time_point <= end_time {
        step += 1;

        let rows = store.grouped_standing_at(contest_slug, time_point).await?;
        let standing = aggregate_rank(&rows);
        let sentinel = standing.sentinel_rank + 1;

        for (key, rank) in &standing.ranks {
            series.entry(key.clone()).or_default().push(*rank);
        }

        for (key, history) in series.iter_mut() {
            if !standing.ranks.contains_key(key) && history.len() < step as usize {
                history.push(sentinel);
            }
        }

        time_point += Duration::minutes(delta_minutes);
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(username: &str, region: DataRegion, credit_sum: i64, penalty_minutes: i64) -> GroupedStanding {
        GroupedStanding {
            username: username.to_string(),
            data_region: region,
            credit_sum,
            penalty_date: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(penalty_minutes),
        }
    }

    #[test]
    fn ties_carry_the_same_rank() {
        let rows = vec![
            standing("alice", DataRegion::Us, 300, 10),
            standing("bob", DataRegion::Us, 200, 20),
            standing("carol", DataRegion::Us, 200, 20),
        ];

        let result = aggregate_rank(&rows);
        assert_eq!(result.ranks[&("alice".into(), DataRegion::Us)], 1);
        assert_eq!(result.ranks[&("bob".into(), DataRegion::Us)], 2);
        assert_eq!(result.ranks[&("carol".into(), DataRegion::Us)], 2);
        assert_eq!(result.sentinel_rank, 3);
    }

    #[test]
    fn distinct_penalty_dates_break_the_tie() {
        let rows = vec![
            standing("alice", DataRegion::Us, 200, 10),
            standing("bob", DataRegion::Us, 200, 20),
        ];
        let result = aggregate_rank(&rows);
        assert_eq!(result.ranks[&("alice".into(), DataRegion::Us)], 1);
        assert_eq!(result.ranks[&("bob".into(), DataRegion::Us)], 2);
    }
}
