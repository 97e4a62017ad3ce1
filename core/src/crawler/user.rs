use serde::Deserialize;

use crate::fetcher::{Fetcher, RequestSpec};
use crate::store::models::DataRegion;

const CN_GRAPHQL_URL: &str = "https://leetcode.cn/graphql/noj-go/";
const US_GRAPHQL_URL: &str = "https://leetcode.com/graphql/";

const CN_QUERY: &str = r#"
    query userContestRankingInfo($userSlug: String!) {
        userContestRanking(userSlug: $userSlug) {
            attendedContestsCount
            rating
        }
    }
"#;

const US_QUERY: &str = r#"
    query getContestRankingData($username: String!) {
        userContestRanking(username: $username) {
            attendedContestsCount
            rating
        }
    }
"#;

#[derive(Debug, Deserialize)]
struct UserContestRankingEnvelope {
    data: UserContestRankingData,
}

#[derive(Debug, Deserialize)]
struct UserContestRankingData {
    #[serde(rename = "userContestRanking")]
    user_contest_ranking: Option<UserContestRanking>,
}

#[derive(Debug, Deserialize)]
struct UserContestRanking {
    #[serde(rename = "attendedContestsCount")]
    attended_contests_count: i32,
    rating: f64,
}

/// Returns `(None, None)` for an unknown user or any request/parse failure —
/// matching the original, which never distinguishes "no such user" from
/// "transport error" at this layer.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_user_rating(
    fetcher: &Fetcher,
    region: DataRegion,
    username: &str,
) -> (Option<f64>, Option<i32>) {
    let (url, query, variables) = match region {
        DataRegion::Cn => (
            CN_GRAPHQL_URL,
            CN_QUERY,
            serde_json::json!({ "userSlug": username }),
        ),
        DataRegion::Us => (
            US_GRAPHQL_URL,
            US_QUERY,
            serde_json::json!({ "username": username }),
        ),
    };

    let body = serde_json::json!({ "query": query, "variables": variables });
    let mut responses = fetcher
        .fetch_many(vec![((), RequestSpec::post_json(url, body))])
        .await;
    let Some((_, Some(resp))) = responses.pop() else {
        tracing::warn!(?region, username, "user rating fetch failed permanently");
        return (None, None);
    };

    match resp.json::<UserContestRankingEnvelope>() {
        Ok(env) => match env.data.user_contest_ranking {
            Some(ranking) => (Some(ranking.rating), Some(ranking.attended_contests_count)),
            None => (None, None),
        },
        Err(err) => {
            tracing::warn!(?region, username, ?err, "failed to parse user rating response");
            (None, None)
        }
    }
}
