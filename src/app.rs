use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{applications, auth, billing, jobs, network, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(jobs::router())
                .merge(applications::router())
                .merge(network::router())
                .merge(billing::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::jwt::JwtKeys, users::repo_types::Role};

    fn token(state: &AppState, role: Role, refresh: bool) -> String {
        let keys = JwtKeys::from_ref(state);
        let id = Uuid::new_v4();
        if refresh {
            keys.sign_refresh(id, role).unwrap()
        } else {
            keys.sign_access(id, role).unwrap()
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn me_requires_token() {
        let app = build_app(AppState::fake());
        let (status, body) = send(app, Request::get("/api/v1/me").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[tokio::test]
    async fn ban_requires_admin_role() {
        let state = AppState::fake();
        let bearer = format!("Bearer {}", token(&state, Role::Student, false));
        let app = build_app(state);
        let req = Request::post(format!("/api/v1/admin/users/{}/ban", Uuid::new_v4()))
            .header(header::AUTHORIZATION, bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"reason":"spam"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");
    }

    #[tokio::test]
    async fn ban_without_reason_is_a_validation_error() {
        let state = AppState::fake();
        let bearer = format!("Bearer {}", token(&state, Role::Admin, false));
        let app = build_app(state);
        let req = Request::post(format!("/api/v1/admin/users/{}/ban", Uuid::new_v4()))
            .header(header::AUTHORIZATION, bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("reason"));
    }

    #[tokio::test]
    async fn malformed_id_is_a_validation_error() {
        let state = AppState::fake();
        let bearer = format!("Bearer {}", token(&state, Role::Admin, false));
        let app = build_app(state);
        let req = Request::post("/api/v1/admin/users/not-a-uuid/approve")
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let state = AppState::fake();
        let bearer = format!("Bearer {}", token(&state, Role::Admin, true));
        let app = build_app(state);
        let req = Request::post(format!("/api/v1/admin/users/{}/unban", Uuid::new_v4()))
            .header(header::AUTHORIZATION, bearer)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn connection_response_requires_token() {
        let app = build_app(AppState::fake());
        let req = Request::post(format!("/api/v1/network/requests/{}/response", Uuid::new_v4()))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"accept"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn billing_webhook_rejects_bad_signature() {
        let app = build_app(AppState::fake());
        let req = Request::post("/api/v1/billing/webhook")
            .header("x-billing-signature", "deadbeef")
            .body(Body::from(r#"{"type":"subscription.activated"}"#))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid signature");
    }

    #[tokio::test]
    async fn billing_webhook_acknowledges_unknown_events() {
        let state = AppState::fake();
        let body = r#"{"type":"invoice.paid"}"#;
        let sig = crate::billing::webhook::sign(&state.config.billing_webhook_secret, body.as_bytes());
        let app = build_app(state);
        let req = Request::post("/api/v1/billing/webhook")
            .header("x-billing-signature", sig)
            .body(Body::from(body))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
    }
}
