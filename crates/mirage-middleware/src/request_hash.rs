//! Request integrity middleware.
//!
//! Clients share a secret key with the server. With every request they send
//! an app version, a unix timestamp, a random nonce and
//! `hex(sha256(key + version + time + random))`. A request whose hash does
//! not match was not produced by a client holding the key.

use std::time::Duration;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use mirage_core::{codes, ApiError, ApiResult, BoxFuture, RequestContext};

use crate::middleware::Middleware;

/// Header carrying the client hash.
pub const HASH_HEADER: &str = "m-hash";
/// Header carrying the client version.
pub const VERSION_HEADER: &str = "m-version";
/// Header carrying the unix timestamp.
pub const TIME_HEADER: &str = "m-time";
/// Header carrying the nonce.
pub const RANDOM_HEADER: &str = "m-random";

/// Computes the expected request hash.
///
/// ```
/// use mirage_middleware::request_hash::compute_hash;
///
/// let hash = compute_hash("key", "1", "1700000000", "4821");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_hash(key: &str, version: &str, time: &str, random: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [key, version, time, random] {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Validates the `m-hash` family of headers.
#[derive(Clone)]
pub struct RequestHashMiddleware {
    key: String,
    max_skew: Option<Duration>,
}

impl RequestHashMiddleware {
    /// Creates the middleware with the shared key and no clock check.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            max_skew: None,
        }
    }

    /// Also rejects timestamps further than `max_skew` from the server clock.
    #[must_use]
    pub const fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew = Some(max_skew);
        self
    }

    fn check_time(&self, time: &str, now: i64) -> ApiResult<()> {
        let Some(max_skew) = self.max_skew else {
            return Ok(());
        };
        let sent: i64 = time.parse().map_err(|_| {
            ApiError::reject(codes::REQUEST_HASH_EXPIRED, "m-time is not a unix timestamp")
        })?;
        let max = i64::try_from(max_skew.as_secs()).unwrap_or(i64::MAX);
        if now.abs_diff(sent) > max.unsigned_abs() {
            tracing::debug!(sent, now, "request timestamp outside allowed skew");
            return Err(ApiError::reject(
                codes::REQUEST_HASH_EXPIRED,
                "request time is outside the allowed window",
            ));
        }
        Ok(())
    }

    fn verify(&self, ctx: &RequestContext, now: i64) -> ApiResult<()> {
        let header = |name: &str| ctx.header(name).map(str::trim).filter(|v| !v.is_empty());

        let (Some(hash), Some(version), Some(time), Some(random)) = (
            header(HASH_HEADER),
            header(VERSION_HEADER),
            header(TIME_HEADER),
            header(RANDOM_HEADER),
        ) else {
            let missing: Vec<&str> = [HASH_HEADER, VERSION_HEADER, TIME_HEADER, RANDOM_HEADER]
                .into_iter()
                .filter(|name| header(name).is_none())
                .collect();
            return Err(ApiError::reject(
                codes::REQUEST_HASH_MISSING,
                format!("missing request hash headers: {}", missing.join(", ")),
            ));
        };

        tracing::debug!(version, time, random, "checking request hash");
        let expected = compute_hash(&self.key, version, time, random);
        let provided = hash.to_ascii_lowercase();
        if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            return Err(ApiError::reject(
                codes::REQUEST_HASH_INVALID,
                "request hash does not match",
            ));
        }

        self.check_time(time, now)
    }
}

impl std::fmt::Debug for RequestHashMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHashMiddleware")
            .field("max_skew", &self.max_skew)
            .finish_non_exhaustive()
    }
}

impl Middleware for RequestHashMiddleware {
    fn name(&self) -> &'static str {
        "request_hash"
    }

    fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> {
        let result = self.verify(ctx, chrono::Utc::now().timestamp());
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mirage_core::ServiceRegistry;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn ctx(headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = http::Request::builder().uri("/x");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        RequestContext::new(builder.body(Bytes::new()).unwrap(), Arc::new(ServiceRegistry::new()))
    }

    fn signed(key: &str, time: &str) -> RequestContext {
        let hash = compute_hash(key, "3", time, "1234");
        ctx(&[
            (HASH_HEADER, &hash),
            (VERSION_HEADER, "3"),
            (TIME_HEADER, time),
            (RANDOM_HEADER, "1234"),
        ])
    }

    #[test]
    fn test_hash_is_sha256_of_concatenation() {
        let mut hasher = Sha256::new();
        hasher.update(b"k11700000000r");
        assert_eq!(compute_hash("k", "1", "1700000000", "r"), hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_valid_hash_passes() {
        let mw = RequestHashMiddleware::new("secret");
        assert!(mw.verify(&signed("secret", "1700000000"), NOW).is_ok());
    }

    #[test]
    fn test_uppercase_hash_is_accepted() {
        let hash = compute_hash("secret", "3", "1", "9").to_uppercase();
        let ctx = ctx(&[
            (HASH_HEADER, &hash),
            (VERSION_HEADER, "3"),
            (TIME_HEADER, "1"),
            (RANDOM_HEADER, "9"),
        ]);
        assert!(RequestHashMiddleware::new("secret").verify(&ctx, NOW).is_ok());
    }

    #[test]
    fn test_missing_headers() {
        let err = RequestHashMiddleware::new("secret")
            .verify(&ctx(&[(VERSION_HEADER, "1"), (RANDOM_HEADER, " ")]), NOW)
            .unwrap_err();
        assert_eq!(err.dev_code().code(), "f00104");
        assert_eq!(
            err.dev_message(),
            "missing request hash headers: m-hash, m-time, m-random"
        );
    }

    #[test]
    fn test_wrong_key() {
        let err = RequestHashMiddleware::new("secret")
            .verify(&signed("guess", "1700000000"), NOW)
            .unwrap_err();
        assert_eq!(err.dev_code().code(), "f00105");
    }

    #[test]
    fn test_skew() {
        let mw = RequestHashMiddleware::new("secret").with_max_skew(Duration::from_secs(30));
        assert!(mw.verify(&signed("secret", "1700000020"), NOW).is_ok());

        let err = mw.verify(&signed("secret", "1699999000"), NOW).unwrap_err();
        assert_eq!(err.dev_code().code(), "f00106");

        let err = mw.verify(&signed("secret", "soon"), NOW).unwrap_err();
        assert_eq!(err.dev_code().code(), "f00106");
    }
}
