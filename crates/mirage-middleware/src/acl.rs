//! Role-based access control.
//!
//! [`Acl`] stores which operations each role may perform on each resource.
//! Anything not explicitly allowed is denied. [`AclMiddleware`] applies it
//! to the matched route: the resource is the route's collection prefix and
//! the operations are the route's access tags.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use mirage_core::{codes, names, ApiError, ApiResult, BoxFuture, RequestContext};

use crate::middleware::Middleware;

/// Claim holding the caller's role name.
pub const ROLE_CLAIM: &str = "rn";

type Grants = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Errors from persisting an [`Acl`].
#[derive(Debug, Error)]
pub enum AclError {
    /// The snapshot file could not be read or written.
    #[error("ACL error: cannot access {path}: {source}")]
    Io {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot is not valid JSON.
    #[error("ACL error: invalid snapshot {path}: {source}")]
    Parse {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory access list, default deny.
///
/// # Example
///
/// ```
/// use mirage_middleware::Acl;
///
/// let acl = Acl::new();
/// acl.allow("editor", "/posts", ["posts.write"]);
///
/// assert!(acl.is_allowed("editor", "/posts", "posts.write"));
/// assert!(!acl.is_allowed("editor", "/posts", "posts.delete"));
/// assert!(!acl.is_allowed("guest", "/posts", "posts.write"));
/// ```
#[derive(Debug, Default)]
pub struct Acl {
    grants: RwLock<Grants>,
}

impl Acl {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `operations` on `resource` to `role`.
    pub fn allow<I, S>(&self, role: &str, resource: &str, operations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut grants = self.grants.write();
        let ops = grants
            .entry(role.to_string())
            .or_default()
            .entry(resource.to_string())
            .or_default();
        let before = ops.len();
        ops.extend(operations.into_iter().map(Into::into));
        tracing::debug!(role, resource, added = ops.len() - before, "acl grant");
    }

    /// Withdraws `operations` on `resource` from `role`.
    pub fn revoke<'a, I>(&self, role: &str, resource: &str, operations: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut grants = self.grants.write();
        if let Some(ops) = grants.get_mut(role).and_then(|r| r.get_mut(resource)) {
            for op in operations {
                ops.remove(op);
            }
        }
    }

    /// Returns `true` if `role` may perform `operation` on `resource`.
    #[must_use]
    pub fn is_allowed(&self, role: &str, resource: &str, operation: &str) -> bool {
        self.grants
            .read()
            .get(role)
            .and_then(|r| r.get(resource))
            .is_some_and(|ops| ops.contains(operation))
    }

    /// Returns `true` if `role` has any grant.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.grants.read().contains_key(role)
    }

    /// Returns every role with grants, sorted.
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        self.grants.read().keys().cloned().collect()
    }

    /// Writes the grants to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AclError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&*self.grants.read()).map_err(|source| AclError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| AclError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads grants previously written by [`Acl::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AclError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AclError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let grants: Grants = serde_json::from_slice(&bytes).map_err(|source| AclError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), roles = grants.len(), "acl loaded");
        Ok(Self {
            grants: RwLock::new(grants),
        })
    }
}

/// Checks the caller's role against the matched route's access tags.
///
/// Routes without access tags are open. Otherwise the caller needs claims
/// (set by [`AuthMiddleware`](crate::AuthMiddleware)) with a role in
/// [`ROLE_CLAIM`], and the role must be allowed at least one of the tags on
/// the route's collection prefix.
#[derive(Debug, Clone)]
pub struct AclMiddleware {
    acl: Option<Arc<Acl>>,
}

impl AclMiddleware {
    /// Checks against `acl`.
    #[must_use]
    pub fn new(acl: Arc<Acl>) -> Self {
        Self { acl: Some(acl) }
    }

    /// Checks against the [`Acl`] registered under the `acl` service name.
    #[must_use]
    pub fn from_services() -> Self {
        Self { acl: None }
    }

    fn verify(&self, ctx: &RequestContext) -> ApiResult<()> {
        let Some(route) = ctx.route() else {
            return Ok(());
        };
        if route.accesses.is_empty() {
            return Ok(());
        }

        let claims = ctx.claims().ok_or_else(|| {
            ApiError::reject(
                codes::ACL_ACCESS_DENIED,
                "cant find token so checking acl is useless",
            )
        })?;
        let role = claims.get(ROLE_CLAIM).and_then(|v| v.as_str()).ok_or_else(|| {
            ApiError::reject(
                codes::ACL_ROLE_NOT_FOUND,
                "cant find role name in token so checking acl is useless",
            )
        })?;

        let acl = match &self.acl {
            Some(acl) => Arc::clone(acl),
            None => ctx.service::<Acl>(names::ACL)?,
        };

        let allowed = route
            .accesses
            .iter()
            .any(|op| acl.is_allowed(role, &route.prefix, op));
        if allowed {
            tracing::debug!(role, resource = %route.prefix, "acl granted");
            Ok(())
        } else {
            Err(ApiError::reject(
                codes::ACL_ACCESS_DENIED,
                "user has not access to this api",
            ))
        }
    }
}

impl Middleware for AclMiddleware {
    fn name(&self) -> &'static str {
        "acl"
    }

    fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(std::future::ready(self.verify(ctx)))
    }
}
