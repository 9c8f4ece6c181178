use axum::{extract::State, http::header::USER_AGENT, http::HeaderMap, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::analytics::dashboard::{build_dashboard, Dashboard};
use crate::auth::{policy, AuthUser, Resource};
use crate::errors::AppError;
use crate::models::analytics::TrackedEvent;
use crate::state::AppState;
use crate::validation::require_non_empty;

#[derive(Debug, Deserialize)]
pub struct PageViewRequest {
    pub page_path: String,
    pub page_title: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ButtonClickRequest {
    pub button_label: String,
    pub page_path: String,
    pub session_id: Option<String>,
}

/// The body's user agent wins; otherwise the request header, otherwise empty.
fn resolve_user_agent(body: Option<&str>, headers: &HeaderMap) -> String {
    body.filter(|ua| !ua.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// POST /api/analytics/page-view
pub async fn handle_page_view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PageViewRequest>,
) -> Result<Json<TrackedEvent>, AppError> {
    require_non_empty("page_path", &req.page_path)?;
    let user_agent = resolve_user_agent(req.user_agent.as_deref(), &headers);

    let event = sqlx::query_as::<_, TrackedEvent>(
        r#"
        INSERT INTO page_views (id, page_path, page_title, user_agent, session_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&req.page_path)
    .bind(&req.page_title)
    .bind(&user_agent)
    .bind(&req.session_id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(event))
}

/// POST /api/analytics/button-click
pub async fn handle_button_click(
    State(state): State<AppState>,
    Json(req): Json<ButtonClickRequest>,
) -> Result<Json<TrackedEvent>, AppError> {
    require_non_empty("button_label", &req.button_label)?;

    let event = sqlx::query_as::<_, TrackedEvent>(
        r#"
        INSERT INTO button_clicks (id, button_label, page_path, session_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&req.button_label)
    .bind(&req.page_path)
    .bind(&req.session_id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(event))
}

/// GET /api/analytics/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    Ok(Json(build_dashboard(&state.db).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_agent_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        assert_eq!(resolve_user_agent(Some("custom"), &headers), "custom");
        assert_eq!(resolve_user_agent(None, &headers), "Mozilla/5.0");
        assert_eq!(resolve_user_agent(Some(""), &headers), "Mozilla/5.0");
        assert_eq!(resolve_user_agent(None, &HeaderMap::new()), "");
    }
}
