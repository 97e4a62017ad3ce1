//! The HTTP fetcher: a concurrent, retrying, politeness-controlled multi-request
//! driver. One round drains up to `concurrent_num` pending requests, dispatches
//! them in parallel, and lets any non-200 response push the whole batch's
//! backoff up by one unit before the next round starts. Permanently-failed keys
//! never raise — they come back as `None` and the caller treats that as
//! "try again next scheduled run".

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter, state::keyed::DefaultKeyedStateStore};
use reqwest::{Method, StatusCode};
use tokio::sync::Mutex;

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_CONCURRENT_NUM: usize = 5;
pub const DEFAULT_RETRY_NUM: u32 = 10;

/// Per-host courtesy pacing on top of the round backoff: 10 requests/sec/host,
/// burst 10. This doesn't replace the retry/backoff algorithm below, it just
/// keeps a fast clean round from hammering a single host.
const COURTESY_RATE_PER_SEC: u32 = 10;

#[derive(Clone, Debug)]
pub struct RequestSpec {
    pub url: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            body: Some(body),
        }
    }

    fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub bytes: Bytes,
}

impl FetchedResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

type HostLimiter = RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

pub struct Fetcher {
    client: reqwest::Client,
    concurrent_num: usize,
    retry_num: u32,
    host_limiter: Arc<HostLimiter>,
}

impl Fetcher {
    pub fn new(concurrent_num: usize, retry_num: u32) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .build()
            .expect("building the reqwest client should never fail");

        let quota = Quota::per_second(NonZeroU32::new(COURTESY_RATE_PER_SEC).unwrap())
            .allow_burst(NonZeroU32::new(COURTESY_RATE_PER_SEC).unwrap());

        Self {
            client,
            concurrent_num,
            retry_num,
            host_limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    pub fn default_fetcher() -> Self {
        Self::new(DEFAULT_CONCURRENT_NUM, DEFAULT_RETRY_NUM)
    }

    /// A view of this fetcher with a different round concurrency, sharing the
    /// same HTTP client and per-host courtesy limiter. Used by callers that
    /// need a region-specific cap (e.g. ranking pagination: 5 for US, 10 for
    /// CN) without spinning up a second client.
    pub fn with_concurrency(&self, concurrent_num: usize) -> Self {
        Self {
            client: self.client.clone(),
            concurrent_num,
            retry_num: self.retry_num,
            host_limiter: self.host_limiter.clone(),
        }
    }

    async fn dispatch_one(&self, spec: &RequestSpec) -> Option<FetchedResponse> {
        self.host_limiter.until_key_ready(&spec.host()).await;

        let mut req = self.client.request(spec.method.clone(), &spec.url);
        if let Some(body) = &spec.body {
            req = req.json(body);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                match resp.bytes().await {
                    Ok(bytes) => Some(FetchedResponse { status, bytes }),
                    Err(err) => {
                        tracing::warn!(url = %spec.url, ?err, "failed to read response body");
                        None
                    }
                }
            }
            Err(err) => {
                tracing::warn!(url = %spec.url, ?err, "request transport failure");
                None
            }
        }
    }

    /// Drives `requests` to completion, returning a response (or `None` for a
    /// key that exhausted its retries) for every key, in the same order the
    /// keys were supplied in.
    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn fetch_many<K>(&self, requests: Vec<(K, RequestSpec)>) -> Vec<(K, Option<FetchedResponse>)>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        let order: Vec<K> = requests.iter().map(|(k, _)| k.clone()).collect();
        let mut queue: VecDeque<(K, RequestSpec)> = requests.into_iter().collect();
        let mut failures: HashMap<K, u32> = HashMap::new();
        let results: Arc<Mutex<HashMap<K, FetchedResponse>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut wait_time: u64 = 0;

        loop {
            let mut batch = Vec::with_capacity(self.concurrent_num);
            while batch.len() < self.concurrent_num {
                let Some((key, spec)) = queue.pop_front() else {
                    break;
                };
                if *failures.get(&key).unwrap_or(&0) >= self.retry_num {
                    tracing::error!("max retries reached for a key, dropping it permanently");
                    continue;
                }
                batch.push((key, spec));
            }

            if batch.is_empty() {
                break;
            }

            if wait_time > 0 {
                tokio::time::sleep(Duration::from_secs(wait_time)).await;
            }

            let mut round_failed = false;

            let outcomes: Vec<(K, RequestSpec, Option<FetchedResponse>)> = stream::iter(batch)
                .map(|(key, spec)| async {
                    let resp = self.dispatch_one(&spec).await;
                    (key, spec, resp)
                })
                .buffer_unordered(self.concurrent_num)
                .collect()
                .await;

            for (key, spec, resp) in outcomes {
                match resp {
                    Some(resp) if resp.status == StatusCode::OK => {
                        results.lock().await.insert(key, resp);
                    }
                    Some(resp) => {
                        tracing::warn!(url = %spec.url, status = %resp.status, "non-200 response, retrying");
                        *failures.entry(key.clone()).or_insert(0) += 1;
                        round_failed = true;
                        queue.push_back((key, spec));
                    }
                    None => {
                        *failures.entry(key.clone()).or_insert(0) += 1;
                        round_failed = true;
                        queue.push_back((key, spec));
                    }
                }
            }

            wait_time = if round_failed { wait_time + 1 } else { 0 };
        }

        let mut results = Arc::try_unwrap(results)
            .expect("no other fetch_many task should hold this Arc")
            .into_inner();

        order
            .into_iter()
            .map(|key| {
                let resp = results.remove(&key);
                (key, resp)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_spec_extracts_host() {
        let spec = RequestSpec::get("https://leetcode.com/contest/api/ranking/foo/");
        assert_eq!(spec.host(), "leetcode.com");
    }
}
