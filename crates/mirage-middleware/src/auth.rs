//! Token authentication middleware.

use std::sync::Arc;

use serde_json::Value;

use mirage_core::{codes, names, ApiError, ApiResult, BoxFuture, RequestContext};

use crate::jwt::{Authenticator, Hs256Authenticator};
use crate::middleware::Middleware;

/// Header carrying the bearer token.
pub const AUTH_HEADER: &str = "m-auth";

#[derive(Clone)]
enum Source {
    Fixed(Arc<dyn Authenticator>),
    Services,
}

/// Rejects requests without a valid `m-auth` token.
///
/// On success the decoded claims are stored on the context, where
/// [`AclMiddleware`](crate::AclMiddleware) and route actions can read them.
///
/// | Failure | Dev code |
/// |---------|----------|
/// | header absent | `f00410` |
/// | header blank | `f00409` |
/// | no authenticator configured | `f00415` |
/// | token rejected | see [`AuthError::dev_code`](crate::AuthError::dev_code) |
#[derive(Clone)]
pub struct AuthMiddleware {
    source: Source,
}

impl AuthMiddleware {
    /// Verifies tokens with `authenticator`.
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            source: Source::Fixed(authenticator),
        }
    }

    /// Verifies tokens with the [`Hs256Authenticator`] registered under the
    /// `security` service name, resolved per request.
    #[must_use]
    pub fn from_services() -> Self {
        Self {
            source: Source::Services,
        }
    }

    fn authenticator(&self, ctx: &RequestContext) -> ApiResult<Arc<dyn Authenticator>> {
        match &self.source {
            Source::Fixed(auth) => Ok(Arc::clone(auth)),
            Source::Services => ctx
                .services()
                .resolve::<Hs256Authenticator>(names::SECURITY)
                .map(|auth| auth as Arc<dyn Authenticator>)
                .map_err(|e| {
                    tracing::warn!(error = %e, "no authenticator registered");
                    ApiError::reject(
                        codes::AUTH_JWT_HASH_KEY_NOT_EXIST,
                        "hash key is not set yet. please set hash key first.",
                    )
                }),
        }
    }
}

impl std::fmt::Debug for AuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            Source::Fixed(_) => "fixed",
            Source::Services => "services",
        };
        f.debug_struct("AuthMiddleware").field("source", &source).finish()
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            let token = match ctx.header(AUTH_HEADER) {
                None => {
                    return Err(ApiError::reject(
                        codes::AUTH_HEADER_NOT_FOUND,
                        "AUTHORIZATION header not found",
                    ))
                }
                Some(raw) if raw.trim().is_empty() => {
                    return Err(ApiError::reject(
                        codes::AUTH_HEADER_EMPTY,
                        "AUTHORIZATION header is empty",
                    ))
                }
                Some(raw) => raw.trim().to_string(),
            };

            let claims = self.authenticator(ctx)?.verify(&token).map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                e.to_api_error()
            })?;

            tracing::debug!(claims = claims.len(), "token accepted");
            ctx.set_claims(Value::Object(claims));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mirage_core::ServiceRegistry;
    use serde_json::json;

    fn ctx_with(token: Option<&str>, services: Arc<ServiceRegistry>) -> RequestContext {
        let mut builder = http::Request::builder().uri("/secure");
        if let Some(token) = token {
            builder = builder.header(AUTH_HEADER, token);
        }
        RequestContext::new(builder.body(Bytes::new()).unwrap(), services)
    }

    fn authenticator() -> Hs256Authenticator {
        Hs256Authenticator::new("k").unwrap()
    }

    fn token(claims: serde_json::Value) -> String {
        authenticator().issue(claims.as_object().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_sets_claims() {
        let mw = AuthMiddleware::new(Arc::new(authenticator()));
        let mut ctx = ctx_with(Some(&token(json!({"rn": "admin"}))), Arc::default());
        mw.check(&mut ctx).await.unwrap();
        assert_eq!(ctx.claims().unwrap()["rn"], "admin");
    }

    #[tokio::test]
    async fn test_missing_and_blank_header() {
        let mw = AuthMiddleware::new(Arc::new(authenticator()));

        let err = mw.check(&mut ctx_with(None, Arc::default())).await.unwrap_err();
        assert_eq!(err.dev_code().code(), "f00410");

        let err = mw.check(&mut ctx_with(Some("  "), Arc::default())).await.unwrap_err();
        assert_eq!(err.dev_code().code(), "f00409");
    }

    #[tokio::test]
    async fn test_bad_token() {
        let mw = AuthMiddleware::new(Arc::new(authenticator()));
        let forged = Hs256Authenticator::new("other")
            .unwrap()
            .issue(json!({}).as_object().unwrap())
            .unwrap();
        let err = mw.check(&mut ctx_with(Some(&forged), Arc::default())).await.unwrap_err();
        assert_eq!(err.dev_code().code(), "f00407");
        assert_eq!(err.http_code(), 401);
    }

    #[tokio::test]
    async fn test_resolves_from_services() {
        let services = Arc::new(ServiceRegistry::new());
        let mw = AuthMiddleware::from_services();

        let err = mw
            .check(&mut ctx_with(Some("x.y.z"), Arc::clone(&services)))
            .await
            .unwrap_err();
        assert_eq!(err.dev_code().code(), "f00415");
        assert_eq!(err.http_code(), 500);

        services.register_instance(names::SECURITY, Arc::new(authenticator()));
        let mut ctx = ctx_with(Some(&token(json!({"uid": 1}))), services);
        mw.check(&mut ctx).await.unwrap();
        assert_eq!(ctx.claims().unwrap()["uid"], 1);
    }
}
