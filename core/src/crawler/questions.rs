use serde::Deserialize;

use crate::fetcher::{Fetcher, RequestSpec};
use crate::store::models::DataRegion;

use super::RawQuestion;

#[derive(Debug, Deserialize)]
struct QuestionListEnvelope {
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

/// For CN, `english_title` overrides `title` when present — applied by the
/// caller via `RawQuestion::resolved_title`.
#[tracing::instrument(skip(fetcher))]
pub async fn fetch_question_list(
    fetcher: &Fetcher,
    contest_slug: &str,
    region: DataRegion,
) -> Option<Vec<RawQuestion>> {
    let url = match region {
        DataRegion::Us => format!("https://leetcode.com/contest/api/info/{contest_slug}/"),
        DataRegion::Cn => format!("https://leetcode.cn/contest/api/info/{contest_slug}/"),
    };

    let mut responses = fetcher.fetch_many(vec![((), RequestSpec::get(url))]).await;
    let (_, resp) = responses.pop()?;
    let resp = resp?;

    match resp.json::<QuestionListEnvelope>() {
        Ok(env) => Some(env.questions),
        Err(err) => {
            tracing::error!(contest_slug, ?region, ?err, "failed to parse question list");
            None
        }
    }
}
