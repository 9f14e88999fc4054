use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    check_suppression, create_blackout, delete_blackout, get_blackout, health_check,
    list_blackouts, stats, AppState,
};
use crate::compaction::RetentionWorker;
use crate::config::ServerConfig;
use crate::lifecycle::{AuditDispatcher, AuditSink, AuditStats, LifecycleGuard, ScopePolicy};
use crate::storage::MemoryWindowStore;
use crate::suppression::SuppressionEvaluator;

/// Time allowed for queued audit events to drain on shutdown
const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Blackout administration
        .route("/blackout", post(create_blackout))
        .route("/blackouts", get(list_blackouts))
        .route("/blackout/:id", get(get_blackout).delete(delete_blackout))
        // Suppression
        .route("/suppression", post(check_suppression))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Wire store, guard and evaluator into shared state
pub fn build_state(
    store: Arc<MemoryWindowStore>,
    audit: Arc<dyn AuditSink>,
    audit_stats: Option<Arc<AuditStats>>,
    config: &ServerConfig,
) -> AppState {
    AppState {
        store: Arc::clone(&store),
        guard: LifecycleGuard::new(
            Arc::clone(&store),
            Arc::new(ScopePolicy),
            audit,
            config.guard_config(),
        ),
        evaluator: SuppressionEvaluator::new(store, config.store_timeout()),
        audit_stats,
    }
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize window store
    let store = match &config.data_dir {
        Some(dir) => {
            let store = MemoryWindowStore::open(dir).await?;
            tracing::info!(
                data_dir = %dir.display(),
                blackouts = store.len(),
                "Loaded blackout snapshot"
            );
            Arc::new(store)
        }
        None => {
            tracing::info!("Running without data directory, blackouts are not persisted");
            Arc::new(MemoryWindowStore::new())
        }
    };

    // Audit delivery
    let (dispatcher, audit_handle) =
        AuditDispatcher::start(config.audit_targets(), config.audit_queue_capacity);
    let audit_stats = dispatcher.stats();

    let state = Arc::new(build_state(
        Arc::clone(&store),
        Arc::new(dispatcher),
        Some(audit_stats),
        &config,
    ));

    // Start background workers
    let retention_worker = config.retention().map(|retention| {
        Arc::new(RetentionWorker::new(
            Arc::clone(&store),
            retention,
            config.retention_check_interval(),
        ))
    });
    let retention_handle = retention_worker
        .as_ref()
        .map(|worker| Arc::clone(worker).start());

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting blackout server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(retention_worker))
        .await?;

    if let Some(handle) = retention_handle {
        handle.abort();
    }

    // The router held the last dispatcher handle, so the queue is closed now
    if tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit_handle)
        .await
        .is_err()
    {
        tracing::warn!("Audit queue did not drain before shutdown");
    }

    tracing::info!("Blackout server stopped");
    Ok(())
}

async fn shutdown_signal(retention_worker: Option<Arc<RetentionWorker<MemoryWindowStore>>>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping workers...");
    if let Some(worker) = retention_worker {
        worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::{CUSTOMERS_HEADER, SCOPES_HEADER, USER_HEADER};
    use crate::lifecycle::AuditEvent;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::util::ServiceExt;

    struct NullSink;

    impl AuditSink for NullSink {
        fn record(&self, _event: AuditEvent) {}
    }

    fn create_test_app() -> Router {
        let state = build_state(
            Arc::new(MemoryWindowStore::new()),
            Arc::new(NullSink),
            Some(Arc::new(AuditStats::default())),
            &ServerConfig::default(),
        );
        build_router(Arc::new(state))
    }

    fn request(method: &str, uri: &str, user: Option<(&str, &str, &str)>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((name, scopes, customers)) = user {
            builder = builder
                .header(USER_HEADER, name)
                .header(SCOPES_HEADER, scopes)
                .header(CUSTOMERS_HEADER, customers);
        }
        builder
    }

    const ADMIN: Option<(&str, &str, &str)> = Some(("root", "admin", ""));
    const ACME: Option<(&str, &str, &str)> = Some(("alice", "write:blackouts", "acme"));
    const GLOBEX: Option<(&str, &str, &str)> = Some(("bob", "write:blackouts", "globex"));

    fn json_request(
        method: &str,
        uri: &str,
        user: Option<(&str, &str, &str)>,
        body: serde_json::Value,
    ) -> Request<Body> {
        request(method, uri, user)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str, user: Option<(&str, &str, &str)>) -> Request<Body> {
        request(method, uri, user).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_test_app();

        let response = app
            .oneshot(empty_request("GET", "/health", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blackout_lifecycle() {
        let app = create_test_app();

        // Create
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/blackout",
                ACME,
                serde_json::json!({"environment": "Production", "service": ["Web"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let body = body_json(response).await;
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(location, format!("/blackout/{}", id));
        assert_eq!(body["blackout"]["customer"], "acme");
        assert_eq!(body["blackout"]["user"], "alice");
        assert_eq!(body["blackout"]["status"], "active");
        assert_eq!(body["blackout"]["duration"], 3600);

        // Read back
        let response = app
            .clone()
            .oneshot(empty_request("GET", &location, ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["blackout"]["id"], id.as_str());
        assert_eq!(body["blackout"]["environment"], "Production");

        // Matching alert is suppressed
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/suppression",
                None,
                serde_json::json!({
                    "alert": {"customer": "acme", "environment": "Production", "service": ["Web", "Db"]}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["suppressed"], true);
        assert_eq!(body["matched"], serde_json::json!([id.as_str()]));

        // Delete, then it is gone
        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &location, ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("GET", &location, ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(empty_request("DELETE", &location, ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let app = create_test_app();

        let response = app
            .oneshot(json_request(
                "POST",
                "/blackout",
                None,
                serde_json::json!({"environment": "Production"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_validation_error() {
        let app = create_test_app();

        let response = app
            .oneshot(json_request(
                "POST",
                "/blackout",
                ADMIN,
                serde_json::json!({
                    "environment": "Production",
                    "startTime": "2024-03-01T12:00:00Z",
                    "endTime": "2024-03-01T11:00:00Z"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_huge_duration_is_rejected() {
        let app = create_test_app();

        let response = app
            .oneshot(json_request(
                "POST",
                "/blackout",
                ADMIN,
                serde_json::json!({"environment": "Production", "duration": 1_000_000_000_000_000i64}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_foreign_customer_is_forbidden() {
        let app = create_test_app();

        let response = app
            .oneshot(json_request(
                "POST",
                "/blackout",
                ACME,
                serde_json::json!({"environment": "Production", "customer": "globex"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_other_customer_window_is_not_found() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/blackout",
                GLOBEX,
                serde_json::json!({"environment": "Production"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(empty_request("GET", &format!("/blackout/{}", id), ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(empty_request("DELETE", &format!("/blackout/{}", id), ACME))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let app = create_test_app();

        for environment in ["Production", "Staging", "Development"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/blackout",
                    ADMIN,
                    serde_json::json!({"environment": environment}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/blackouts", ADMIN))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total"], 3);

        let response = app
            .clone()
            .oneshot(empty_request(
                "GET",
                "/blackouts?environment=Production&environment=Staging",
                ADMIN,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["total"], 2);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/blackouts?status=expired", ADMIN))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
        assert_eq!(body["message"], "not found");

        let response = app
            .oneshot(empty_request("GET", "/blackouts?colour=blue", ADMIN))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_suppression_at_explicit_time() {
        let app = create_test_app();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/blackout",
                ADMIN,
                serde_json::json!({
                    "environment": "Production",
                    "startTime": "2024-03-01T12:00:00Z",
                    "endTime": "2024-03-01T13:00:00Z"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let check = |time: &str| {
            json_request(
                "POST",
                "/suppression",
                None,
                serde_json::json!({
                    "alert": {"environment": "Production", "resource": "web01"},
                    "time": time
                }),
            )
        };

        let response = app.clone().oneshot(check("2024-03-01T12:30:00Z")).await.unwrap();
        assert_eq!(body_json(response).await["suppressed"], true);

        // End is exclusive
        let response = app.oneshot(check("2024-03-01T13:00:00Z")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["suppressed"], false);
        assert_eq!(body["matched"], serde_json::json!([]));
    }
}
