//! Dispatcher integration tests.
//!
//! Every test boots a real `RestApp` and drives it through
//! `RestApp::dispatch`, without a socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};

use mirage_config::AppConfig;
use mirage_core::{handler_fn, ApiError, BootError, Envelope, HttpResponse, Translator};
use mirage_middleware::{middleware_fn, Acl, AclMiddleware, AuthMiddleware, Hs256Authenticator};
use mirage_server::{DispatchState, Lifecycle, RestApp, Route, RouteCollection};

fn request(method: &str, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

async fn body_json(response: HttpResponse) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn users_app(config: AppConfig) -> RestApp {
    let users = RouteCollection::new("/users").route(Route::get("/:id", "getUser").handler(
        handler_fn(|ctx| async move {
            let id = ctx.path_param("id").unwrap_or_default().to_string();
            Ok(Envelope::create(Some(json!({ "id": id })), "s00000-200", "ok")?)
        }),
    ));
    RestApp::builder()
        .config(config)
        .collection(users)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_user_wire_format() {
    let app = users_app(AppConfig::default());
    let response = app.dispatch(request("GET", "/users/42")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/json; charset=UTF-8"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    assert!(response.headers().contains_key("etag"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        r#"{"status":{"http_code":200,"dev_code":"s00000","dev_message":"","message":"success"},"output":{"id":"42"}}"#
    );
}

#[tokio::test]
async fn test_dev_message_only_in_dev() {
    let prod = users_app(AppConfig::default());
    let body = body_json(prod.dispatch(request("GET", "/users/1")).await).await;
    assert_eq!(body["status"]["dev_message"], "");

    let dev = users_app(AppConfig::development());
    let body = body_json(dev.dispatch(request("GET", "/users/1")).await).await;
    assert_eq!(body["status"]["dev_message"], "ok");
}

#[tokio::test]
async fn test_translated_message_follows_language() {
    let app = RestApp::builder()
        .translator(Translator::new("en", "en").with_catalog("en", [("s00000", "done")]))
        .collection(RouteCollection::new("/ping").route(
            Route::get("", "ping").handler(handler_fn(|_ctx| async { Ok(Envelope::success()) })),
        ))
        .build()
        .unwrap();

    let body = body_json(app.dispatch(request("GET", "/ping")).await).await;
    assert_eq!(body["status"]["message"], "done");
}

#[tokio::test]
async fn test_rejecting_middleware_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let app = RestApp::builder()
        .collection(RouteCollection::new("/login").route(
            Route::post("", "login")
                .handler(handler_fn(move |_ctx| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Envelope::success())
                    }
                }))
                .middleware(middleware_fn("credentials", |_| {
                    Err(ApiError::reject("f00401-401", "invalid username or password"))
                })),
        ))
        .config(AppConfig::development())
        .build()
        .unwrap();

    let response = app.dispatch(request("POST", "/login")).await;
    assert_eq!(response.status(), 401);

    let lifecycle = response.extensions().get::<Lifecycle>().unwrap().clone();
    assert!(lifecycle.passed(DispatchState::Aborted));

    let body = body_json(response).await;
    assert_eq!(body["status"]["http_code"], 401);
    assert_eq!(body["status"]["dev_code"], "f00401");
    assert_eq!(body["status"]["dev_message"], "invalid username or password");
    assert_eq!(body["output"], json!({}));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_order_and_halt() {
    let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let step = |name: &'static str, fail: bool| {
        let log = Arc::clone(&log);
        middleware_fn(name, move |_| {
            log.lock().push(name);
            if fail {
                Err(ApiError::reject("f00500-403", "denied"))
            } else {
                Ok(())
            }
        })
    };

    let handler_log = Arc::clone(&log);
    let app = RestApp::builder()
        .before_hook(step("before", false))
        .collection(RouteCollection::new("/ordered").route(
            Route::get("", "ordered")
                .handler(handler_fn(move |_ctx| {
                    handler_log.lock().push("handler");
                    async { Ok(Envelope::success()) }
                }))
                .middleware(step("first", false))
                .middleware(step("second", false))
                .middleware(step("third", true))
                .middleware(step("fourth", false)),
        ))
        .build()
        .unwrap();

    let response = app.dispatch(request("GET", "/ordered")).await;
    assert_eq!(response.status(), 403);
    assert_eq!(*log.lock(), vec!["before", "first", "second", "third"]);
}

#[tokio::test]
async fn test_options_bypasses_routing_and_middleware() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    let app = RestApp::builder()
        .before_hook(middleware_fn("before", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .collection(RouteCollection::new("/users").route(
            Route::get("/:id", "show").handler(handler_fn(|_ctx| async {
                Err(ApiError::internal("route must not run"))
            })),
        ))
        .build()
        .unwrap();

    for uri in ["/users/1", "/unknown"] {
        let response = app.dispatch(request("OPTIONS", uri)).await;
        assert_eq!(response.status(), 200);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(
            headers["access-control-allow-methods"],
            "GET,POST,PUT,PATCH,DELETE,OPTIONS"
        );
        assert!(headers.contains_key("access-control-allow-headers"));

        let lifecycle = response.extensions().get::<Lifecycle>().unwrap();
        assert_eq!(lifecycle.history(), &[DispatchState::Idle, DispatchState::Sent]);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unmatched_route() {
    let app = users_app(AppConfig::development());

    for (method, uri) in [("GET", "/posts/1"), ("DELETE", "/users/1"), ("GET", "/users/1/extra")] {
        let response = app.dispatch(request(method, uri)).await;
        assert_eq!(response.status(), 404, "{method} {uri}");
        let body = body_json(response).await;
        assert_eq!(body["status"]["dev_code"], "f00103");
        assert_eq!(body["status"]["http_code"], 404);
        assert_eq!(body["status"]["dev_message"], format!("Route not Found: {uri}"));
    }
}

#[tokio::test]
async fn test_duplicate_route_fails_boot_without_overwrite() {
    let first = Route::get("/:id", "first").handler(handler_fn(|_ctx| async {
        Ok(Envelope::ok(json!({"which": "first"})))
    }));
    let second = Route::get("/:id", "second").handler(handler_fn(|_ctx| async {
        Ok(Envelope::ok(json!({"which": "second"})))
    }));

    let err = RestApp::builder()
        .collection(RouteCollection::new("/users").route(first.clone()).route(second))
        .build()
        .unwrap_err();
    assert_eq!(err, BootError::duplicate_route("GET", "/users/:id"));

    // The first registration is what a successful boot serves.
    let app = RestApp::builder()
        .collection(RouteCollection::new("/users").route(first))
        .build()
        .unwrap();
    let body = body_json(app.dispatch(request("GET", "/users/9")).await).await;
    assert_eq!(body["output"]["which"], "first");
}

#[test]
fn test_options_route_fails_boot() {
    let err = RestApp::builder()
        .collection(RouteCollection::new("/users").route(
            Route::new("options", "/:id", "preflight").handler(handler_fn(|_ctx| async {
                Ok(Envelope::success())
            })),
        ))
        .build()
        .unwrap_err();
    assert!(matches!(err, BootError::InvalidRoute { reason, .. } if reason.contains("preflight")));
}

#[tokio::test]
async fn test_handler_error_envelope() {
    let app = RestApp::builder()
        .config(AppConfig::development())
        .collection(RouteCollection::new("/orders").route(Route::post("", "create").handler(
            handler_fn(|_ctx| async {
                Err(ApiError::handler_with_source(
                    "f00301-500",
                    "could not save order",
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ))
            }),
        )))
        .build()
        .unwrap();

    let response = app.dispatch(request("POST", "/orders")).await;
    assert_eq!(response.status(), 500);
    let body = body_json(response).await;
    assert_eq!(body["status"]["dev_code"], "f00301");
    assert_eq!(body["status"]["dev_message"], "could not save order");
}

#[tokio::test]
async fn test_missing_service_is_a_500_envelope() {
    let app = RestApp::builder()
        .collection(RouteCollection::new("/db").route(Route::get("", "query").handler(
            handler_fn(|ctx| async move {
                let _db = ctx.service::<String>("db")?;
                Ok(Envelope::success())
            }),
        )))
        .build()
        .unwrap();

    let response = app.dispatch(request("GET", "/db")).await;
    assert_eq!(response.status(), 500);
    let body = body_json(response).await;
    assert_eq!(body["status"]["dev_code"], "f00001");
}

#[tokio::test]
async fn test_secured_route_with_default_services() {
    let mut config = AppConfig::default();
    config.security.jwt_hash_key = Some("jwt-secret".into());

    let app = RestApp::builder()
        .config(config)
        .collection(RouteCollection::new("/posts").route(
            Route::delete("/:id", "deletePost")
                .handler(handler_fn(|ctx| async move {
                    Ok(Envelope::ok(json!({ "deleted": ctx.path_param("id") })))
                }))
                .middleware(Arc::new(AuthMiddleware::from_services()))
                .middleware(Arc::new(AclMiddleware::from_services()))
                .access("posts.delete"),
        ))
        .build()
        .unwrap();

    let acl = app.services().resolve::<Acl>("acl").unwrap();
    acl.allow("admin", "/posts", ["posts.delete"]);
    let auth = app
        .services()
        .resolve::<Hs256Authenticator>("security")
        .unwrap();

    let token = |role: &str| auth.issue(json!({ "rn": role }).as_object().unwrap()).unwrap();

    let mut admin = request("DELETE", "/posts/3");
    admin
        .headers_mut()
        .insert("m-auth", token("admin").parse().unwrap());
    let response = app.dispatch(admin).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(response).await["output"]["deleted"], "3");

    let mut viewer = request("DELETE", "/posts/3");
    viewer
        .headers_mut()
        .insert("m-auth", token("viewer").parse().unwrap());
    let response = app.dispatch(viewer).await;
    assert_eq!(response.status(), 403);

    let response = app.dispatch(request("DELETE", "/posts/3")).await;
    assert_eq!(response.status(), 401);
    assert_eq!(body_json(response).await["status"]["dev_code"], "f00410");
}
