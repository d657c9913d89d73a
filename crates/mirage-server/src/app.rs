//! The application and its dispatcher.
//!
//! [`RestApp`] owns everything a request needs: the settings, the
//! [`Responder`], the [`ServiceRegistry`], the router and the booted
//! collections. There is no global state; two apps in one process never
//! see each other.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use mirage_core::{handler_fn, Envelope};
//! use mirage_server::{RestApp, Route, RouteCollection};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let app = RestApp::builder()
//!     .collection(RouteCollection::new("/users").route(
//!         Route::get("/:id", "getUser").handler(handler_fn(|ctx| async move {
//!             Ok(Envelope::ok(json!({ "id": ctx.path_param("id") })))
//!         })),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let request = http::Request::get("/users/42").body(Bytes::new()).unwrap();
//! let response = app.dispatch(request).await;
//! assert_eq!(response.status(), 200);
//! # });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::Method;

use mirage_config::AppConfig;
use mirage_core::{
    names, ApiError, BootError, BootResult, HttpResponse, MemoryCache, RequestContext, RequestId,
    Responder, RouteName, ServiceRegistry, Translator,
};
use mirage_middleware::{
    Acl, BeforeHook, Hs256Authenticator, RequestHashMiddleware, SharedMiddleware,
};
use mirage_router::Router;
use mirage_tasks::{ExecutionMode, Pipeline};
use mirage_telemetry::metrics::{record_rejection, record_request, InFlightGuard, UNMATCHED_ROUTE};
use mirage_telemetry::{log_request_complete, log_request_start};

use crate::collection::{BootedCollection, BootedRoute, RouteCollection};
use crate::lifecycle::{DispatchState, Lifecycle};

/// Metrics label for preflight requests.
pub const PREFLIGHT_ROUTE: &str = "preflight";

type Registration = Box<dyn FnOnce(&ServiceRegistry) + Send>;

/// Assembles a [`RestApp`].
///
/// Framework services are registered first, then the ones added here in
/// call order, so an application can replace any default by registering
/// the same name.
pub struct RestAppBuilder {
    config: AppConfig,
    collections: Vec<RouteCollection>,
    before_hook: BeforeHook,
    translator: Option<Translator>,
    registrations: Vec<Registration>,
}

impl RestAppBuilder {
    fn new() -> Self {
        Self {
            config: AppConfig::default(),
            collections: Vec::new(),
            before_hook: BeforeHook::noop(),
            translator: None,
            registrations: Vec::new(),
        }
    }

    /// Sets the configuration. Defaults to [`AppConfig::default`].
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a route collection.
    pub fn collection(mut self, collection: RouteCollection) -> Self {
        self.collections.push(collection);
        self
    }

    /// Installs the process-wide hook run before every route's middlewares.
    pub fn before_hook(mut self, middleware: SharedMiddleware) -> Self {
        self.before_hook = BeforeHook::new(middleware);
        self
    }

    /// Uses `translator` instead of one built from the configuration.
    pub fn translator(mut self, translator: Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Registers a lazily built service.
    pub fn service<T, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations
            .push(Box::new(move |services: &ServiceRegistry| services.register(name, factory)));
        self
    }

    /// Registers an already built service.
    pub fn service_instance<T>(mut self, name: impl Into<String>, instance: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations
            .push(Box::new(move |services: &ServiceRegistry| {
                services.register_instance(name, instance);
            }));
        self
    }

    /// Validates the configuration, registers services and boots every
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns a [`BootError`] for an invalid configuration, a service that
    /// cannot be built, an invalid or duplicate route, or two collections
    /// with the same prefix. Nothing is served after a boot error.
    pub fn build(self) -> BootResult<RestApp> {
        self.config.validate().map_err(|e| BootError::Config {
            reason: e.to_string(),
        })?;
        let config = Arc::new(self.config);

        let translator = match self.translator {
            Some(translator) => translator,
            None => default_translator(&config)?,
        };
        let translator = Arc::new(translator);

        let services = ServiceRegistry::new();
        register_defaults(&services, &config, &translator)?;
        for registration in self.registrations {
            registration(&services);
        }

        let responder = Responder::new(Arc::clone(&translator), config.cors_policy())
            .with_environment(&config.app.environment)
            .with_log_mode(config.app.log_mode);

        let mut router = Router::new();
        let mut collections: HashMap<u32, BootedCollection> =
            HashMap::with_capacity(self.collections.len());
        for collection in self.collections {
            if collections.contains_key(&collection.id()) {
                return Err(BootError::DuplicateCollection {
                    prefix: collection.prefix().to_string(),
                });
            }
            let booted = collection.boot(&mut router)?;
            collections.insert(booted.id, booted);
        }

        tracing::info!(
            environment = %config.app.environment,
            collections = collections.len(),
            routes = router.len(),
            services = services.len(),
            "application booted"
        );

        Ok(RestApp {
            config,
            responder,
            services: Arc::new(services),
            router,
            collections,
            before_hook: self.before_hook,
        })
    }
}

impl fmt::Debug for RestAppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestAppBuilder")
            .field("collections", &self.collections.len())
            .field("before_hook", &self.before_hook)
            .field("registrations", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

fn default_translator(config: &AppConfig) -> BootResult<Translator> {
    let translator = Translator::new(&config.app.lang, &config.app.fallback_lang);
    match &config.app.lang_dir {
        Some(dir) => translator.load_dir(dir).map_err(|e| BootError::Service {
            name: names::TRANSLATOR.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(translator),
    }
}

fn register_defaults(
    services: &ServiceRegistry,
    config: &Arc<AppConfig>,
    translator: &Arc<Translator>,
) -> BootResult<()> {
    services.register_instance(names::TRANSLATOR, Arc::clone(translator));
    services.register_instance(names::CONFIG, Arc::clone(config));
    services.register(names::ACL, Acl::new);

    let prefix = config.cache.prefix.clone();
    let enabled = config.app.enable_cache;
    let ttl = config.cache_ttl();
    services.register(names::CACHE, move || {
        MemoryCache::new()
            .with_prefix(prefix.clone())
            .with_enabled(enabled)
            .with_default_ttl(ttl)
    });

    if let Some(key) = &config.security.jwt_hash_key {
        let authenticator = Hs256Authenticator::new(key)
            .map_err(|e| BootError::Service {
                name: names::SECURITY.to_string(),
                reason: e.to_string(),
            })?
            .with_leeway(Duration::from_secs(config.security.jwt_leeway_secs));
        services.register_instance(names::SECURITY, Arc::new(authenticator));
    }
    Ok(())
}

/// Builds the request-signature middleware from the `security` settings.
///
/// Returns `None` when no request hash key is configured.
#[must_use]
pub fn request_hash_middleware(config: &AppConfig) -> Option<SharedMiddleware> {
    let key = config.security.request_hash_key.as_ref()?;
    let mut middleware = RequestHashMiddleware::new(key.clone());
    if let Some(skew) = config.security.request_hash_max_skew_secs {
        middleware = middleware.with_max_skew(Duration::from_secs(skew));
    }
    Some(Arc::new(middleware))
}

/// A booted application.
pub struct RestApp {
    config: Arc<AppConfig>,
    responder: Responder,
    services: Arc<ServiceRegistry>,
    router: Router,
    collections: HashMap<u32, BootedCollection>,
    before_hook: BeforeHook,
}

impl RestApp {
    /// Starts assembling an application.
    #[must_use]
    pub fn builder() -> RestAppBuilder {
        RestAppBuilder::new()
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the service registry.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Returns the responder.
    #[must_use]
    pub const fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Returns the number of registered `(method, path)` pairs.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Returns the booted collection prefixes.
    #[must_use]
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.collections.values().map(|c| c.prefix.as_str()).collect();
        prefixes.sort_unstable();
        prefixes
    }

    /// Returns the execution mode selected by `app.enable_parallel`.
    #[must_use]
    pub fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::from_flag(self.config.app.enable_parallel)
    }

    /// Creates a job pipeline over `data` in the configured execution mode.
    pub fn pipeline<D, O>(&self, data: D) -> Pipeline<D, O>
    where
        D: Send + Sync + 'static,
        O: Send + 'static,
    {
        Pipeline::new(data, self.execution_mode())
    }

    /// Dispatches a request with no known peer address.
    pub async fn dispatch(&self, request: http::Request<Bytes>) -> HttpResponse {
        self.dispatch_from(request, None).await
    }

    /// Dispatches a request.
    ///
    /// Always produces exactly one response. The [`Lifecycle`] of the
    /// request is stored in the response extensions.
    pub async fn dispatch_from(
        &self,
        request: http::Request<Bytes>,
        remote_addr: Option<SocketAddr>,
    ) -> HttpResponse {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new();

        let mut ctx = RequestContext::new(request, Arc::clone(&self.services));
        if let Some(addr) = remote_addr {
            ctx.set_remote_addr(addr);
        }
        let request_id = ctx.request_id();
        log_request_start!(request_id, ctx.method(), ctx.path());

        if ctx.method() == Method::OPTIONS {
            lifecycle.advance(DispatchState::Sent);
            let response = self.responder.preflight();
            return self.finish(response, lifecycle, request_id, PREFLIGHT_ROUTE, started);
        }

        lifecycle.advance(DispatchState::Matching);
        let Some((route, params)) = self.lookup(ctx.method(), ctx.path()) else {
            lifecycle.advance(DispatchState::NotFound);
            let response = self.fail(&ApiError::not_found(ctx.uri().to_string()));
            lifecycle.advance(DispatchState::Sent);
            return self.finish(response, lifecycle, request_id, UNMATCHED_ROUTE, started);
        };
        let label = route.matched.pattern.as_str();
        ctx.set_path_params(params);
        ctx.set_route(Arc::clone(&route.matched));

        lifecycle.advance(DispatchState::BeforeHooks);
        let checked = match self.before_hook.run(&mut ctx).await {
            Ok(()) => route.chain.check(&mut ctx).await,
            Err(rejection) => Err(rejection),
        };
        if let Err(rejection) = checked {
            lifecycle.advance(DispatchState::Aborted);
            record_rejection(rejection.middleware);
            tracing::debug!(
                request_id = %request_id,
                middleware = rejection.middleware,
                error = %rejection.error,
                "request rejected"
            );
            let response = self.fail(&rejection.error);
            lifecycle.advance(DispatchState::Sent);
            return self.finish(response, lifecycle, request_id, label, started);
        }

        lifecycle.advance(DispatchState::Handling);
        let response = match route.invoke(ctx).await {
            Ok(envelope) => {
                lifecycle.advance(DispatchState::AfterHook);
                self.responder.send(envelope)
            }
            Err(err) => {
                lifecycle.advance(DispatchState::Aborted);
                self.fail(&err)
            }
        };
        lifecycle.advance(DispatchState::Sent);
        self.finish(response, lifecycle, request_id, label, started)
    }

    /// Finds the booted route for a request by hash lookups on the decoded
    /// route name.
    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(&Arc<BootedRoute>, Vec<(String, String)>)> {
        let found = self.router.match_route(method, path)?;
        let Some(name) = RouteName::decode(found.name) else {
            tracing::error!(name = found.name, "router returned a malformed route name");
            return None;
        };
        let route = self
            .collections
            .get(&name.collection_id)
            .and_then(|collection| collection.route(name.route_id));
        if route.is_none() {
            tracing::error!(route = %name, "matched route is not booted");
        }
        Some((route?, found.params.into_vec()))
    }

    /// The global error handler.
    fn fail(&self, err: &ApiError) -> HttpResponse {
        if let Some(source) = std::error::Error::source(err) {
            tracing::error!(error = %err, source = %source, "request failed");
        }
        self.responder.send(err.to_envelope())
    }

    fn finish(
        &self,
        mut response: HttpResponse,
        lifecycle: Lifecycle,
        request_id: RequestId,
        route: &str,
        started: Instant,
    ) -> HttpResponse {
        let http_code = response.status().as_u16();
        let elapsed = started.elapsed();
        record_request(route, http_code, elapsed);
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        log_request_complete!(request_id, route, http_code, duration_ms);
        tracing::trace!(request_id = %request_id, lifecycle = %lifecycle, "dispatch finished");
        response.extensions_mut().insert(lifecycle);
        response
    }
}

impl fmt::Debug for RestApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestApp")
            .field("environment", &self.config.app.environment)
            .field("routes", &self.router.len())
            .field("prefixes", &self.prefixes())
            .field("services", &self.services.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use mirage_core::{handler_fn, Envelope};
    use mirage_middleware::middleware_fn;
    use serde_json::json;

    fn ok_route(path: &str, action: &str) -> Route {
        Route::get(path, action).handler(handler_fn(|_ctx| async { Ok(Envelope::success()) }))
    }

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::get(uri).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_default_services() {
        let app = RestApp::builder().build().unwrap();
        let services = app.services();
        assert!(services.resolve::<Translator>(names::TRANSLATOR).is_ok());
        assert!(services.resolve::<MemoryCache>(names::CACHE).is_ok());
        assert!(services.resolve::<Acl>(names::ACL).is_ok());
        assert!(services.resolve::<AppConfig>(names::CONFIG).is_ok());
        assert!(!services.contains(names::SECURITY));
    }

    #[test]
    fn test_security_service_with_key() {
        let mut config = AppConfig::default();
        config.security.jwt_hash_key = Some("secret".into());
        let app = RestApp::builder().config(config).build().unwrap();
        assert!(app
            .services()
            .resolve::<Hs256Authenticator>(names::SECURITY)
            .is_ok());
    }

    #[test]
    fn test_user_service_overrides_default() {
        let app = RestApp::builder()
            .service(names::CACHE, || MemoryCache::new().with_enabled(false))
            .build()
            .unwrap();
        let cache = app.services().resolve::<MemoryCache>(names::CACHE).unwrap();
        assert!(!cache.is_enabled());
        cache.set("k", json!(1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_follows_config() {
        let mut config = AppConfig::default();
        config.app.enable_cache = false;
        let app = RestApp::builder().config(config).build().unwrap();
        let cache = app.services().resolve::<MemoryCache>(names::CACHE).unwrap();
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_invalid_config_is_a_boot_error() {
        let mut config = AppConfig::default();
        config.server.http_addr = "nowhere".into();
        let err = RestApp::builder().config(config).build().unwrap_err();
        assert!(matches!(err, BootError::Config { .. }));
    }

    #[test]
    fn test_duplicate_collection() {
        let err = RestApp::builder()
            .collection(RouteCollection::new("/users").route(ok_route("/a", "a")))
            .collection(RouteCollection::new("/users").route(ok_route("/b", "b")))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            BootError::DuplicateCollection {
                prefix: "/users".into()
            }
        );
    }

    #[test]
    fn test_duplicate_across_collections() {
        let err = RestApp::builder()
            .collection(RouteCollection::new("/a").route(ok_route("/x", "first")))
            .collection(RouteCollection::new("").route(ok_route("/a/x", "second")))
            .build()
            .unwrap_err();
        assert_eq!(err, BootError::duplicate_route("GET", "/a/x"));
    }

    #[test]
    fn test_request_hash_middleware_from_config() {
        let mut config = AppConfig::default();
        assert!(request_hash_middleware(&config).is_none());
        config.security.request_hash_key = Some("k".into());
        let middleware = request_hash_middleware(&config).unwrap();
        assert_eq!(middleware.name(), "request_hash");
    }

    #[test]
    fn test_execution_mode_follows_config() {
        let app = RestApp::builder().build().unwrap();
        assert_eq!(app.execution_mode(), ExecutionMode::Sequential);

        let mut config = AppConfig::default();
        config.app.enable_parallel = true;
        let app = RestApp::builder().config(config).build().unwrap();
        assert_eq!(app.execution_mode(), ExecutionMode::Parallel);
    }

    #[tokio::test]
    async fn test_pipeline_from_app() {
        let app = RestApp::builder().build().unwrap();
        let results = app
            .pipeline(3_u32)
            .add_job("double", |n: &u32| n * 2)
            .add_job("square", |n: &u32| n * n)
            .run()
            .await
            .unwrap();
        assert_eq!(results["double"], 6);
        assert_eq!(results["square"], 9);
    }

    #[tokio::test]
    async fn test_lifecycle_is_attached() {
        let app = RestApp::builder()
            .collection(RouteCollection::new("/ping").route(ok_route("", "ping")))
            .build()
            .unwrap();

        let response = app.dispatch(get("/ping")).await;
        let lifecycle = response.extensions().get::<Lifecycle>().unwrap();
        assert_eq!(
            lifecycle.history(),
            &[
                DispatchState::Idle,
                DispatchState::Matching,
                DispatchState::BeforeHooks,
                DispatchState::Handling,
                DispatchState::AfterHook,
                DispatchState::Sent,
            ]
        );

        let response = app.dispatch(get("/nope")).await;
        let lifecycle = response.extensions().get::<Lifecycle>().unwrap();
        assert!(lifecycle.passed(DispatchState::NotFound));
        assert!(lifecycle.is_sent());
    }

    #[tokio::test]
    async fn test_before_hook_runs_first() {
        let app = RestApp::builder()
            .before_hook(middleware_fn("maintenance", |_| {
                Err(ApiError::reject("f00000-500", "down for maintenance"))
            }))
            .collection(RouteCollection::new("/ping").route(
                Route::get("", "ping")
                    .handler(handler_fn(|_ctx| async { Ok(Envelope::success()) }))
                    .middleware(middleware_fn("never", |_| {
                        Err(ApiError::reject("f00401-401", "should not run"))
                    })),
            ))
            .build()
            .unwrap();

        let response = app.dispatch(get("/ping")).await;
        assert_eq!(response.status(), 500);
        let lifecycle = response.extensions().get::<Lifecycle>().unwrap();
        assert!(lifecycle.passed(DispatchState::Aborted));
        assert!(!lifecycle.passed(DispatchState::Handling));
    }

    #[tokio::test]
    async fn test_handler_error_aborts() {
        let app = RestApp::builder()
            .collection(RouteCollection::new("/boom").route(Route::get("", "boom").handler(
                handler_fn(|_ctx| async { Err(ApiError::handler("f00301-500", "save failed")) }),
            )))
            .build()
            .unwrap();

        let response = app.dispatch(get("/boom")).await;
        assert_eq!(response.status(), 500);
        let lifecycle = response.extensions().get::<Lifecycle>().unwrap();
        assert_eq!(
            lifecycle.history(),
            &[
                DispatchState::Idle,
                DispatchState::Matching,
                DispatchState::BeforeHooks,
                DispatchState::Handling,
                DispatchState::Aborted,
                DispatchState::Sent,
            ]
        );
    }
}
