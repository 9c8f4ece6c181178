pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::state::AppState;
use crate::{admin, analytics, auth, consultation, crs, pathway, profile, reports};

pub fn build_router(state: AppState) -> Router {
    let media_mount = media_mount_path(&state.config.media_url);
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/auth/register", post(auth::handlers::handle_register))
        .route("/api/auth/login", post(auth::handlers::handle_login))
        .route("/api/auth/me", get(auth::handlers::handle_me))
        .route(
            "/api/auth/token/refresh",
            post(auth::handlers::handle_refresh),
        )
        .route(
            "/api/auth/token/blacklist",
            post(auth::handlers::handle_blacklist),
        )
        .route(
            "/api/auth/create-admin",
            post(auth::handlers::handle_create_admin),
        )
        // Profile
        .route(
            "/api/profile",
            get(profile::handlers::handle_get_profile)
                .patch(profile::handlers::handle_update_profile),
        )
        // CRS
        .route("/api/crs/calculate", post(crs::handlers::handle_calculate))
        .route(
            "/api/crs/calculate-detailed",
            post(crs::handlers::handle_calculate_detailed),
        )
        .route(
            "/api/crs/calculations",
            get(crs::handlers::handle_list_calculations),
        )
        .route("/api/crs/session", post(crs::handlers::handle_upsert_session))
        .route("/api/crs/session/:id", get(crs::handlers::handle_get_session))
        .route(
            "/api/crs/calculation/:id",
            get(crs::handlers::handle_get_calculation),
        )
        // Pathway advisor
        .route("/api/pathway/submit", post(pathway::handlers::handle_submit))
        .route(
            "/api/pathway/submissions",
            get(pathway::handlers::handle_list_submissions),
        )
        .route(
            "/api/pathway/submissions/:id",
            get(pathway::handlers::handle_get_submission),
        )
        // Consultations
        .route(
            "/api/consultation/request",
            post(consultation::handlers::handle_create_request),
        )
        .route(
            "/api/consultation/requests",
            get(consultation::handlers::handle_list_requests),
        )
        .route(
            "/api/consultation/requests/:id",
            get(consultation::handlers::handle_get_request),
        )
        .route(
            "/api/consultation/requests/:id/status",
            patch(consultation::handlers::handle_update_status),
        )
        // Analytics
        .route(
            "/api/analytics/page-view",
            post(analytics::handlers::handle_page_view),
        )
        .route(
            "/api/analytics/button-click",
            post(analytics::handlers::handle_button_click),
        )
        .route(
            "/api/analytics/dashboard",
            get(analytics::handlers::handle_dashboard),
        )
        // AI reports
        .route(
            "/api/ai-provider/generate-report",
            post(reports::handlers::handle_generate_report),
        )
        .route(
            "/api/ai-provider/reports",
            get(reports::handlers::handle_list_reports),
        )
        .route(
            "/api/ai-provider/reports/:id",
            get(reports::handlers::handle_get_report),
        )
        .route(
            "/api/ai-provider/reports/user/:email",
            get(reports::handlers::handle_reports_by_email),
        )
        // Admin
        .route("/api/admin/users", get(admin::handlers::handle_list_users))
        .route("/api/admin/users/:id", get(admin::handlers::handle_get_user))
        .route(
            "/api/admin/users/:id/calculations",
            get(admin::handlers::handle_user_calculations),
        )
        .route(
            "/api/admin/users/:id/consultations",
            get(admin::handlers::handle_user_consultations),
        )
        .route(
            "/api/admin/users/:id/submissions",
            get(admin::handlers::handle_user_submissions),
        )
        .route(
            "/api/admin/users/:id/activity",
            get(admin::handlers::handle_user_activity),
        )
        .nest_service(&media_mount, media)
        .with_state(state)
}

/// `/media/` → `/media`. Falls back to `/media` for an unusable value.
fn media_mount_path(media_url: &str) -> String {
    let trimmed = media_url.trim_end_matches('/');
    if trimmed.starts_with('/') && trimmed.len() > 1 {
        trimmed.to_string()
    } else {
        "/media".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::test_support::offline_state;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(offline_state(PathBuf::from("media")));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "concierge-api");
    }

    #[tokio::test]
    async fn test_me_without_token_is_unauthorized() {
        let app = build_router(offline_state(PathBuf::from("media")));
        let response = app
            .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_admin_route_rejects_garbage_token() {
        let app = build_router(offline_state(PathBuf::from("media")));
        let response = app
            .oneshot(
                Request::get("/api/admin/users")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_consultation_rejects_bad_email_before_touching_db() {
        let app = build_router(offline_state(PathBuf::from("media")));
        let body = serde_json::json!({
            "user_name": "Ada",
            "user_email": "not-an-email",
            "consultation_type": "express_entry",
            "consultation_reason": "help",
            "preferred_date": "2027-01-01",
            "preferred_time": "10:00"
        });
        let response = app
            .oneshot(
                Request::post("/api/consultation/request")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_generate_report_without_api_key_fails() {
        let app = build_router(offline_state(PathBuf::from("media")));
        let response = app
            .oneshot(
                Request::post("/api/ai-provider/generate-report")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"path": "Express Entry"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_media_files_are_served() {
        let media = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(media.path().join("reports")).unwrap();
        std::fs::write(media.path().join("reports/r.pdf"), b"%PDF-1.7").unwrap();

        let app = build_router(offline_state(media.path().to_path_buf()));
        let response = app
            .oneshot(
                Request::get("/media/reports/r.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_media_mount_path() {
        assert_eq!(media_mount_path("/media/"), "/media");
        assert_eq!(media_mount_path("/files"), "/files");
        assert_eq!(media_mount_path("/"), "/media");
        assert_eq!(media_mount_path("media/"), "/media");
    }
}
