//! REST client
//!
//! Every call goes through the same attempt loop: global throttle, route
//! bucket, send, record headers, then decide whether to retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use wharf_common::HttpConfig;
use wharf_core::Snowflake;

use crate::error::{HttpError, HttpResult};
use crate::ratelimit::{Bucket, BucketGuard, GlobalThrottle, Migration, RateLimitHeaders, RateLimiter};
use crate::request::{encode_reason, Request, AUDIT_LOG_REASON};

/// Statuses retried with linear backoff
const RETRYABLE_SERVER_ERRORS: [u16; 3] = [500, 502, 504];

/// Rate-limited REST client, cheap to clone
#[derive(Clone)]
pub struct Http {
    inner: Arc<HttpInner>,
}

struct HttpInner {
    client: Client,
    config: HttpConfig,
    ratelimiter: RateLimiter,
    /// Resolved from `/users/@me` on first use
    application_id: OnceCell<Snowflake>,
}

/// 429 response body
#[derive(Debug, Deserialize)]
struct RateLimitedBody {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

impl Http {
    pub fn new(token: &str, config: HttpConfig) -> HttpResult<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| HttpError::InvalidRequest("token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| HttpError::InvalidRequest("invalid user agent".into()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        let ratelimiter = RateLimiter::new(GlobalThrottle::new(config.global_rate_per_sec));

        Ok(Self {
            inner: Arc::new(HttpInner {
                client,
                config,
                ratelimiter,
                application_id: OnceCell::new(),
            }),
        })
    }

    #[inline]
    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    #[inline]
    pub fn ratelimiter(&self) -> &RateLimiter {
        &self.inner.ratelimiter
    }

    /// The bot user's id, which doubles as its application id
    pub async fn application_id(&self) -> HttpResult<Snowflake> {
        self.inner
            .application_id
            .get_or_try_init(|| async { Ok::<_, HttpError>(self.get_current_user().await?.id) })
            .await
            .copied()
    }

    /// Send a request and decode the JSON response
    pub async fn request<T: DeserializeOwned>(&self, request: Request) -> HttpResult<T> {
        let body = self.execute(&request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send a request whose response body is ignored
    pub async fn request_empty(&self, request: Request) -> HttpResult<()> {
        self.execute(&request).await.map(|_| ())
    }

    async fn execute(&self, request: &Request) -> HttpResult<Vec<u8>> {
        let inner = &self.inner;
        let route_key = request.route.bucket_key();
        let mut bucket = inner.ratelimiter.bucket(&route_key);
        let max_attempts = inner.config.max_attempts.max(1);

        let mut last_status = 0;

        for attempt in 0..max_attempts {
            let mut guard = self.admit(&bucket).await;

            let response = self.build(request)?.send().await?;
            let status = response.status().as_u16();
            let headers = RateLimitHeaders::from_headers(response.headers());
            guard.update(&headers);
            let body = response.bytes().await?.to_vec();

            debug!(
                route = %route_key,
                status,
                remaining = ?headers.remaining,
                attempt,
                "REST response"
            );

            if status == 429 {
                let parsed = serde_json::from_slice::<RateLimitedBody>(&body).ok();
                let retry_after = parsed
                    .as_ref()
                    .and_then(|b| b.retry_after)
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .or(headers.retry_after);

                // Only the API's own limiter sends Via plus a scope; anything
                // else is the edge proxy and retrying makes it worse
                if !headers.via || (headers.scope.is_none() && !headers.global) {
                    warn!(route = %route_key, retry_after = ?retry_after, "Edge rate limit hit");
                    return Err(HttpError::EdgeRateLimited { retry_after });
                }

                let retry_after = retry_after.unwrap_or(Duration::from_secs(1));
                if headers.is_global() || parsed.is_some_and(|b| b.global) {
                    inner.ratelimiter.global().lock_for(retry_after);
                } else {
                    warn!(
                        route = %route_key,
                        retry_after_ms = retry_after.as_millis() as u64,
                        scope = ?headers.scope,
                        "Route rate limited"
                    );
                    guard.exhaust_for(retry_after);
                }
            }
            drop(guard);

            if let Some(hash) = headers.bucket.as_deref() {
                if let Migration::Remapped(canonical) =
                    inner.ratelimiter.migrate(&route_key, hash, &bucket)
                {
                    bucket = canonical;
                }
            }

            last_status = status;
            match status {
                200..=299 => return Ok(body),
                429 => continue,
                s if RETRYABLE_SERVER_ERRORS.contains(&s) => {
                    if attempt + 1 == max_attempts {
                        break;
                    }
                    let delay = inner.config.backoff(attempt);
                    warn!(
                        route = %route_key,
                        status = s,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Server error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                s => return Err(HttpError::from_response(s, &body)),
            }
        }

        Err(HttpError::RateLimitExhausted {
            route: route_key,
            attempts: max_attempts,
            status: last_status,
        })
    }

    /// Take the global gate and then the bucket
    ///
    /// The bucket wait can be long, so the global gate is checked again
    /// once the bucket is held; a global 429 recorded meanwhile still
    /// blocks this send.
    async fn admit<'b>(&self, bucket: &'b Bucket) -> BucketGuard<'b> {
        let global = self.inner.ratelimiter.global();
        global.acquire().await;
        let guard = bucket.acquire().await;
        global.wait_unlocked().await;
        guard
    }

    fn build(&self, request: &Request) -> HttpResult<reqwest::RequestBuilder> {
        let url = format!("{}{}", self.inner.config.api_base, request.route.path());
        let mut builder = self
            .inner
            .client
            .request(request.route.method().clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(reason) = &request.reason {
            builder = builder.header(AUDIT_LOG_REASON, encode_reason(reason));
        }
        request.body.apply(builder)
    }
}

impl std::fmt::Debug for Http {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http")
            .field("api_base", &self.inner.config.api_base)
            .field("ratelimiter", &self.inner.ratelimiter)
            .finish()
    }
}
