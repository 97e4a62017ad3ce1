use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;
use crate::fetcher::{Fetcher, RequestSpec};
use crate::store::models::DataRegion;

use super::{RawRankingRecord, RawSubmission};

fn base_url(region: DataRegion) -> &'static str {
    match region {
        DataRegion::Us => "https://leetcode.com",
        DataRegion::Cn => "https://leetcode.cn",
    }
}

/// US ranking is the more rate-sensitive endpoint.
fn page_concurrency(region: DataRegion) -> usize {
    match region {
        DataRegion::Us => 5,
        DataRegion::Cn => 10,
    }
}

#[derive(Debug, Deserialize)]
struct RankingPage {
    #[serde(default)]
    user_num: i32,
    #[serde(default)]
    total_rank: Vec<RawRankingRecord>,
    #[serde(default)]
    submissions: Vec<HashMap<String, RawSubmission>>,
}

/// Single-page probe used by the readiness predicate; does not paginate.
#[tracing::instrument(skip(fetcher))]
pub async fn probe_user_num(
    fetcher: &Fetcher,
    contest_slug: &str,
    region: DataRegion,
) -> Option<i32> {
    let url = match region {
        DataRegion::Us => format!("https://leetcode.com/contest/api/ranking/{contest_slug}/?region=us"),
        DataRegion::Cn => format!("https://leetcode.cn/contest/api/ranking/{contest_slug}/?region=cn"),
    };

    let mut responses = fetcher.fetch_many(vec![((), RequestSpec::get(url))]).await;
    let (_, resp) = responses.pop()?;
    let resp = resp?;
    resp.json::<RankingPage>().ok().map(|p| p.user_num)
}

/// Pulls every ranking page for a contest. Page 1 discloses `user_num`, from
/// which the remaining page count is derived (`ceil(user_num / 25)`).
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_contest_records(
    fetcher: &Fetcher,
    contest_slug: &str,
    region: DataRegion,
) -> Result<(Vec<RawRankingRecord>, Vec<HashMap<i32, RawSubmission>>)> {
    let base = base_url(region);
    let first_page_url = format!("{base}/contest/api/ranking/{contest_slug}/");

    let mut first = fetcher
        .fetch_many(vec![((), RequestSpec::get(first_page_url))])
        .await;
    let (_, resp) = first.pop().expect("fetch_many preserves request count");
    let Some(resp) = resp else {
        tracing::error!(contest_slug, ?region, "failed to fetch first ranking page");
        return Ok((Vec::new(), Vec::new()));
    };

    let first_page: RankingPage = match resp.json() {
        Ok(p) => p,
        Err(err) => {
            tracing::error!(contest_slug, ?region, ?err, "failed to parse first ranking page");
            return Ok((Vec::new(), Vec::new()));
        }
    };

    let user_num = first_page.user_num;
    let page_max = (user_num as f64 / 25.0).ceil().max(1.0) as u32;
    tracing::info!(contest_slug, user_num, page_max, "paginating ranking pages");

    let requests: Vec<_> = (1..=page_max)
        .map(|page| {
            let url = format!("{base}/contest/api/ranking/{contest_slug}/?pagination={page}&region=global");
            (page, RequestSpec::get(url))
        })
        .collect();

    let paged_fetcher = fetcher.with_concurrency(page_concurrency(region));
    let responses = paged_fetcher.fetch_many(requests).await;

    let mut records = Vec::new();
    let mut nested_submissions = Vec::new();

    for (page, resp) in responses {
        let Some(resp) = resp else {
            tracing::warn!(contest_slug, page, "ranking page fetch failed permanently");
            continue;
        };
        match resp.json::<RankingPage>() {
            Ok(page_data) => {
                records.extend(page_data.total_rank);
                for by_question in page_data.submissions {
                    let mut converted = HashMap::with_capacity(by_question.len());
                    for (question_id, submission) in by_question {
                        if let Ok(qid) = question_id.parse::<i32>() {
                            converted.insert(qid, submission);
                        }
                    }
                    nested_submissions.push(converted);
                }
            }
            Err(err) => tracing::warn!(contest_slug, page, ?err, "failed to parse ranking page"),
        }
    }

    Ok((records, nested_submissions))
}
