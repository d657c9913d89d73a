//! The prelude is enough to build, boot and exercise an application.

use std::sync::Arc;

use mirage::prelude::*;
use mirage_test::TestClient;
use serde_json::json;

fn report_app(parallel: bool) -> Arc<RestApp> {
    let mut config = AppConfig::development();
    config.app.enable_parallel = parallel;

    let reports = RouteCollection::new("/reports").route(Route::get("/:year", "summary").handler(
        handler_fn(|ctx| async move {
            let year: u32 = ctx
                .path_param("year")
                .and_then(|y| y.parse().ok())
                .ok_or_else(|| ApiError::reject("f00102-400", "year must be a number"))?;

            let config = ctx.service::<AppConfig>(names::CONFIG)?;
            let pipeline: Pipeline<u32, u32> =
                Pipeline::new(year, ExecutionMode::from_flag(config.app.enable_parallel))
                    .add_job("orders", |year: &u32| year % 100)
                    .add_job("refunds", |year: &u32| year % 7);
            let results = pipeline
                .run()
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;

            Ok(Envelope::ok(json!(results)))
        }),
    ));

    Arc::new(RestApp::builder().config(config).collection(reports).build().unwrap())
}

#[tokio::test]
async fn test_pipeline_in_handler_both_modes() {
    for parallel in [false, true] {
        let app = report_app(parallel);
        assert_eq!(app.execution_mode(), ExecutionMode::from_flag(parallel));

        TestClient::new(app)
            .get("/reports/2024")
            .send()
            .await
            .assert_status(200)
            .assert_dev_code("s00000")
            .assert_output(&json!({ "orders": 24, "refunds": 1 }));
    }
}

#[tokio::test]
async fn test_rejection_from_handler() {
    TestClient::new(report_app(false))
        .get("/reports/last")
        .send()
        .await
        .assert_status(400)
        .assert_dev_code("f00102")
        .assert_dev_message("year must be a number")
        .assert_passed(DispatchState::Aborted);
}

#[test]
fn test_init_telemetry_disabled() {
    let mut config = AppConfig::default();
    config.logging.enabled = false;
    assert!(mirage::init_telemetry(&config).is_ok());
}

#[test]
fn test_module_reexports() {
    assert!(mirage::router::is_known_method("PURGE"));
    assert_eq!(mirage::core::reason_phrase(404), "Not Found");
    assert_eq!(mirage::server::PREFLIGHT_ROUTE, "preflight");
}
