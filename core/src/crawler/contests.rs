use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, RequestSpec};

const HOMEPAGE_URL: &str = "https://leetcode.com/contest/";
const GRAPHQL_URL: &str = "https://leetcode.com/graphql/";

const PAST_CONTESTS_QUERY: &str = r#"
    query pastContests($pageNo: Int) {
        pastContests(pageNo: $pageNo) {
            data { title titleSlug startTime duration }
        }
    }
"#;

#[derive(Debug, Clone)]
pub struct PastContest {
    pub title: String,
    pub title_slug: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i32,
}

#[derive(Debug, Deserialize)]
struct PastContestRaw {
    title: String,
    #[serde(rename = "titleSlug")]
    title_slug: String,
    #[serde(rename = "startTime")]
    start_time: i64,
    duration: i32,
}

impl From<PastContestRaw> for PastContest {
    fn from(raw: PastContestRaw) -> Self {
        PastContest {
            title: raw.title,
            title_slug: raw.title_slug,
            start_time: Utc
                .timestamp_opt(raw.start_time, 0)
                .single()
                .unwrap_or_else(Utc::now),
            duration_seconds: raw.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PastContestsEnvelope {
    data: PastContestsData,
}

#[derive(Debug, Deserialize)]
struct PastContestsData {
    #[serde(rename = "pastContests")]
    past_contests: PastContestsList,
}

#[derive(Debug, Deserialize)]
struct PastContestsList {
    data: Vec<PastContestRaw>,
}

#[tracing::instrument(skip(fetcher))]
async fn fetch_homepage_text(fetcher: &Fetcher) -> Result<String> {
    let mut responses = fetcher
        .fetch_many(vec![((), RequestSpec::get(HOMEPAGE_URL))])
        .await;
    let (_, resp) = responses.pop().expect("fetch_many preserves request count");
    match resp {
        Some(resp) => Ok(resp.text()),
        None => Err(Error::TransientUpstream("contest homepage fetch failed".into())),
    }
}

/// Fetches one page of `pastContests(pageNo)`.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_past_contests_page(fetcher: &Fetcher, page_no: u32) -> Result<Vec<PastContest>> {
    let body = serde_json::json!({
        "query": PAST_CONTESTS_QUERY,
        "variables": { "pageNo": page_no },
    });
    let mut responses = fetcher
        .fetch_many(vec![(page_no, RequestSpec::post_json(GRAPHQL_URL, body))])
        .await;
    let (_, resp) = responses.pop().expect("fetch_many preserves request count");

    let Some(resp) = resp else {
        tracing::warn!(page_no, "past contests page fetch failed permanently");
        return Ok(Vec::new());
    };

    match resp.json::<PastContestsEnvelope>() {
        Ok(env) => Ok(env.data.past_contests.data.into_iter().map(Into::into).collect()),
        Err(err) => {
            tracing::warn!(page_no, ?err, "failed to parse past contests page");
            Ok(Vec::new())
        }
    }
}

/// Fetches `1..=max_page_num` pages of the past-contests listing concurrently.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_past_contests(fetcher: &Fetcher, max_page_num: u32) -> Result<Vec<PastContest>> {
    let requests: Vec<_> = (1..=max_page_num)
        .map(|page| {
            let body = serde_json::json!({
                "query": PAST_CONTESTS_QUERY,
                "variables": { "pageNo": page },
            });
            (page, RequestSpec::post_json(GRAPHQL_URL, body))
        })
        .collect();

    let responses = fetcher.fetch_many(requests).await;
    let mut contests = Vec::new();

    for (page, resp) in responses {
        let Some(resp) = resp else {
            tracing::warn!(page, "past contests page fetch failed permanently");
            continue;
        };
        match resp.json::<PastContestsEnvelope>() {
            Ok(env) => contests.extend(env.data.past_contests.data.into_iter().map(Into::into)),
            Err(err) => tracing::warn!(page, ?err, "failed to parse past contests page"),
        }
    }

    tracing::info!(count = contests.len(), max_page_num, "fetched past contests");
    Ok(contests)
}

/// `pastContests(pageNo=1)` only — the handful of most recent contests.
pub async fn fetch_recent_contests(fetcher: &Fetcher) -> Result<Vec<PastContest>> {
    fetch_past_contests_page(fetcher, 1).await
}

/// Scrapes the contest homepage for `"pageNum": N`, then fetches every page.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_all_past_contests(fetcher: &Fetcher) -> Result<Vec<PastContest>> {
    let homepage = fetch_homepage_text(fetcher).await?;
    let re = Regex::new(r#""pageNum":\s*(\d+)"#).expect("static regex is valid");
    let Some(caps) = re.captures(&homepage) else {
        return Err(Error::MalformedPayload("pageNum not found in homepage HTML".into()));
    };
    let max_page_num: u32 = caps[1]
        .parse()
        .map_err(|_| Error::MalformedPayload("pageNum is not a valid integer".into()))?;

    fetch_past_contests(fetcher, max_page_num).await
}

/// Scrapes the homepage for `buildId`, then pulls `topTwoContests` out of the
/// Next.js data payload it points to.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_next_two_contests(fetcher: &Fetcher) -> Result<Vec<PastContest>> {
    let homepage = fetch_homepage_text(fetcher).await?;
    let re = Regex::new(r#""buildId":\s*"(.*?)""#).expect("static regex is valid");
    let Some(caps) = re.captures(&homepage) else {
        return Err(Error::MalformedPayload("buildId not found in homepage HTML".into()));
    };
    let build_id = caps[1].to_string();

    let url = format!("https://leetcode.com/_next/data/{build_id}/contest.json");
    let mut responses = fetcher.fetch_many(vec![((), RequestSpec::get(url))]).await;
    let (_, resp) = responses.pop().expect("fetch_many preserves request count");
    let Some(resp) = resp else {
        return Err(Error::TransientUpstream("next-two-contests fetch failed".into()));
    };

    let data: serde_json::Value = resp.json()?;
    let queries = data
        .pointer("/pageProps/dehydratedState/queries")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    for query in queries {
        if let Some(top_two) = query.pointer("/state/data/topTwoContests") {
            if let Ok(raw) = serde_json::from_value::<Vec<PastContestRaw>>(top_two.clone()) {
                if !raw.is_empty() {
                    return Ok(raw.into_iter().map(Into::into).collect());
                }
            }
        }
    }

    tracing::error!("topTwoContests not found in contest.json response");
    Ok(Vec::new())
}
