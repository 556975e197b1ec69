use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use shopper_shared::middleware::{metrics_middleware, JwtConfig};

use crate::config::AppConfig;
use crate::services::MissionService;

pub mod admin_routes;
pub mod auth_routes;
pub mod extract;
pub mod health;
pub mod mission_routes;

pub struct AppState {
    pub config: AppConfig,
    pub missions: MissionService,
    pub metrics: PrometheusHandle,
}

impl JwtConfig for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

/// Trims a query filter; blank means absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origin_list()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn router(state: Arc<AppState>) -> Router {
    let auth = Router::new()
        .route("/register", post(auth_routes::register))
        .route("/login", post(auth_routes::login))
        .route("/me", get(auth_routes::me));

    let missions = Router::new()
        .route("/", get(mission_routes::list_available))
        .route("/assigned", get(mission_routes::assigned))
        .route("/completed", get(mission_routes::completed))
        .route("/:mission_id", get(mission_routes::get_mission))
        .route("/:mission_id/apply", post(mission_routes::apply))
        .route(
            "/:mission_id/reports",
            get(mission_routes::own_report).post(mission_routes::submit_report),
        )
        .route("/:mission_id/reports/:report_id", get(mission_routes::get_report));

    let admin = Router::new()
        .route(
            "/missions",
            get(admin_routes::list_missions).post(admin_routes::create_mission),
        )
        .route(
            "/missions/:mission_id",
            get(admin_routes::get_mission)
                .put(admin_routes::update_mission)
                .delete(admin_routes::delete_mission),
        )
        .route("/missions/:mission_id/assign", post(admin_routes::assign))
        .route(
            "/missions/:mission_id/survey",
            get(admin_routes::get_survey).post(admin_routes::replace_survey),
        )
        .route("/reports", get(admin_routes::list_reports))
        .route("/reports/:report_id", get(admin_routes::get_report))
        .route("/reports/:report_id/approve", patch(admin_routes::approve_report))
        .route("/reports/:report_id/refuse", patch(admin_routes::refuse_report))
        .route("/users", get(admin_routes::list_users))
        .route("/users/:user_id", axum::routing::put(admin_routes::update_user))
        .route("/stats", get(admin_routes::stats));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/auth", auth)
        .nest("/api/missions", missions)
        .nest("/api/admin", admin)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use shopper_shared::types::auth::UserRole;

    use super::*;
    use crate::domain::review::RefusalPolicy;
    use crate::services::testing::{harness, Harness};
    use crate::services::token_service::create_access_token;

    const SECRET: &str = "router-test-secret";

    fn test_config() -> AppConfig {
        AppConfig {
            port: 0,
            db_host: "localhost".into(),
            db_port: 5432,
            db_user: "test".into(),
            db_password: "test".into(),
            db_name: "test".into(),
            db_connection_limit: 1,
            db_connect_timeout_secs: 1,
            jwt_secret: SECRET.into(),
            jwt_expires_in_secs: 600,
            cors_origins: "http://localhost:3000".into(),
            rabbitmq_url: None,
            refusal_policy: RefusalPolicy::AnyRefusal,
        }
    }

    fn app(h: &Harness) -> Router {
        router(Arc::new(AppState {
            config: test_config(),
            missions: h.service.clone(),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
        }))
    }

    fn bearer(id: Uuid, role: UserRole) -> String {
        format!("Bearer {}", create_access_token(id, role, SECRET, 600).unwrap())
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", token);
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn register_then_read_profile() {
        let h = harness();
        let app = app(&h);

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Robin", "email": "robin@example.com", "password": "mystery42"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "shopper");
        let token = format!("Bearer {}", body["data"]["token"].as_str().unwrap());

        let (status, body) = call(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "robin@example.com");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "robin@example.com", "password": "nope-nope1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn roles_are_enforced() {
        let h = harness();
        let app = app(&h);
        let shopper = h.shopper();
        let admin = h.admin();

        let (status, _) = call(&app, "GET", "/api/admin/stats", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let shopper_token = bearer(shopper.id, UserRole::Shopper);
        let (status, _) = call(&app, "GET", "/api/admin/stats", Some(&shopper_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The stored role wins over a stale token claim.
        let forged = bearer(shopper.id, UserRole::Admin);
        let (status, _) = call(&app, "GET", "/api/admin/stats", Some(&forged), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin_token = bearer(admin.id, UserRole::Admin);
        let (status, body) = call(&app, "GET", "/api/admin/stats", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["activeShoppers"], 1);

        let (status, _) = call(&app, "GET", "/api/missions", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn mission_lifecycle_over_http() {
        let h = harness();
        let app = app(&h);
        let admin = bearer(h.admin().id, UserRole::Admin);
        let shopper_row = h.shopper();
        let shopper = bearer(shopper_row.id, UserRole::Shopper);

        let (status, body) = call(
            &app,
            "POST",
            "/api/admin/missions",
            Some(&admin),
            Some(json!({
                "title": "Coffee shop visit",
                "description": "Order a latte and time the service",
                "deadline": "2030-01-15T18:00",
                "reward": 25.5,
                "location": "Lyon",
                "category": "food",
                "businessName": "Bean There"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let mission_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "GET", "/api/missions?sortBy=reward&order=desc", Some(&shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);

        let (status, body) = call(&app, "POST", &format!("/api/missions/{mission_id}/apply"), Some(&shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["missionStatus"], "assigned");

        let (status, body) = call(&app, "POST", &format!("/api/missions/{mission_id}/apply"), Some(&shopper), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E2002");

        let report = json!({"answers": [{"questionId": "q1", "questionType": "text", "response": "quick"}]});
        let uri = format!("/api/missions/{mission_id}/reports");
        let (status, body) = call(&app, "POST", &uri, Some(&shopper), Some(report.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let report_id = body["data"]["report"]["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "POST", &uri, Some(&shopper), Some(report)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", &format!("{uri}/{report_id}"), Some(&shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["answers"][0]["response"], "quick");

        let (status, body) = call(
            &app,
            "PATCH",
            &format!("/api/admin/reports/{report_id}/approve"),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["missionStatus"], "approved");
        assert_eq!(body["data"]["payment"]["amount"], 25.5);

        let (status, body) = call(
            &app,
            "PATCH",
            &format!("/api/admin/reports/{report_id}/refuse"),
            Some(&admin),
            Some(json!({"reason": "too late"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E3003");

        let (status, body) = call(&app, "GET", "/api/missions/completed", Some(&shopper), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["reportStatus"], "approved");
    }

    #[tokio::test]
    async fn validation_failures_use_the_error_envelope() {
        let h = harness();
        let app = app(&h);
        let admin = bearer(h.admin().id, UserRole::Admin);

        let (status, body) = call(
            &app,
            "POST",
            "/api/admin/missions",
            Some(&admin),
            Some(json!({
                "title": "  ",
                "description": "d",
                "deadline": "someday",
                "reward": -1,
                "location": "x",
                "category": "y",
                "businessName": "z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["errors"]["title"].is_string());
        assert!(body["errors"]["deadline"].is_string());
        assert!(body["errors"]["reward"].is_string());

        let (status, body) = call(&app, "GET", "/api/admin/missions?limit=500", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["limit"].is_string());

        let (status, _) = call(&app, "GET", "/api/admin/missions/not-a-uuid", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "GET", &format!("/api/admin/missions/{}", Uuid::now_v7()), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "E2001");
    }

    #[tokio::test]
    async fn health_reports_database_status() {
        let h = harness();
        let (status, body) = call(&app(&h), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"][0]["name"], "database");
    }
}
