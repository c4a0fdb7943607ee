use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::state::AppState;
use crate::{auth, plans};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(plans::router())
                .route("/health", get(health)),
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
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Liveness plus a database round trip.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.users.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            error!(error = %e, "health check: database unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };
    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
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
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn registration(username: &str, email: &str, password: &str) -> Value {
        json!({
            "username": username,
            "email": email,
            "password": password,
            "first_name": "Alice",
            "last_name": "Liddell",
            "birth_date": "1994-05-17",
            "age": 30,
            "height": 165,
            "weight": 60,
            "goal": "build muscle"
        })
    }

    async fn register_and_login(app: &Router, username: &str, email: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(registration(username, email, "pw123")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"username": username, "password": "pw123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_login_generate_tweak_and_read_back() {
        let (state, _, llm) = AppState::fake();
        let app = build_app(state);
        let token = register_and_login(&app, "alice", "a@x.com").await;

        let (status, me) = send(&app, "GET", "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "alice");
        assert!(me.get("password_hash").is_none());

        llm.push_reply("T1");
        let (status, generated) = send(
            &app,
            "POST",
            "/api/v1/plans/generate",
            Some(&token),
            Some(json!({"goal": "build muscle", "planType": "new"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["meal_plan"], "T1");

        llm.push_reply("T2");
        let (status, tweaked) = send(
            &app,
            "POST",
            "/api/v1/plans/tweak",
            Some(&token),
            Some(json!({"change": "more protein"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tweaked["meal_plan"], "T2");

        let (status, current) = send(&app, "GET", "/api/v1/plans/current", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["meal_plan"], "T2");
        assert_eq!(current["version"], 2);
    }

    #[tokio::test]
    async fn wrong_password_gets_no_token() {
        let (state, _, _) = AppState::fake();
        let app = build_app(state);
        register_and_login(&app, "alice", "a@x.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({"username": "alice", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("access_token").is_none());
        assert_eq!(body["detail"], "Incorrect username or password");
    }

    #[tokio::test]
    async fn a_user_cannot_touch_another_users_plan() {
        let (state, store, llm) = AppState::fake();
        let app = build_app(state);
        let alice = register_and_login(&app, "alice", "a@x.com").await;
        let bob = register_and_login(&app, "bob", "b@x.com").await;

        llm.push_reply("bob plan");
        send(&app, "POST", "/api/v1/plans/generate", Some(&bob), Some(json!({}))).await;

        llm.push_reply("alice plan");
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/plans/generate",
            Some(&alice),
            Some(json!({"username": "bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(store.get("bob").unwrap().current_plan, "bob plan");
        assert_eq!(store.get("alice").unwrap().current_plan, "alice plan");
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let (state, _, _) = AppState::fake();
        let app = build_app(state);
        register_and_login(&app, "alice", "a@x.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(registration("alice", "new@x.com", "pw")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Username already registered");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/register",
            None,
            Some(registration("carol", "a@x.com", "pw")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn bad_tokens_share_one_response() {
        let (state, store, _) = AppState::fake();
        let keys = state.keys.clone();
        let app = build_app(state);
        let token = register_and_login(&app, "alice", "a@x.com").await;

        let expired = crate::auth::jwt::tests::expired_token(&keys, "alice");
        let mut tampered = token.clone();
        tampered.push('x');
        let ghost = keys.issue("ghost").unwrap().token;

        let mut details = Vec::new();
        for t in [expired.as_str(), tampered.as_str(), ghost.as_str()] {
            let (status, body) = send(&app, "GET", "/api/v1/plans/current", Some(t), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            details.push(body["detail"].clone());
        }
        let (status, body) = send(&app, "GET", "/api/v1/plans/current", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        details.push(body["detail"].clone());

        assert!(details.iter().all(|d| d == "Could not validate credentials"));
        assert_eq!(store.get("alice").unwrap().plan_version, 0);
    }

    #[tokio::test]
    async fn tweak_before_generate_is_not_found() {
        let (state, _, _) = AppState::fake();
        let app = build_app(state);
        let token = register_and_login(&app, "alice", "a@x.com").await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/plans/tweak",
            Some(&token),
            Some(json!({"change": "less salt"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_generic_500() {
        let (state, store, llm) = AppState::fake();
        let app = build_app(state);
        let token = register_and_login(&app, "alice", "a@x.com").await;
        llm.push_error(crate::completion::CompletionError::ApiError {
            status: 401,
            message: "bad api key sk-...".into(),
        });
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/plans/generate",
            Some(&token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["detail"].as_str().unwrap().contains("sk-"));
        assert_eq!(store.get("alice").unwrap().current_plan, "");
    }

    #[tokio::test]
    async fn follow_up_needs_a_token_unless_anonymous_is_enabled() {
        let conversation = json!({"conversation": [
            {"role": "assistant", "content": "Mon: oats"},
            {"role": "user", "content": "Can I swap oats for rice?"}
        ]});

        let (state, _, _) = AppState::fake();
        let app = build_app(state);
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/plans/follow-up",
            None,
            Some(conversation.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = register_and_login(&app, "alice", "a@x.com").await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/plans/follow-up",
            Some(&token),
            Some(conversation.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].is_string());

        let mut config = AppState::fake_config();
        config.follow_up_allow_anonymous = true;
        let (state, _, _) = AppState::fake_with(
            config,
            crate::completion::fake::ScriptedCompletion::new(),
        );
        let app = build_app(state);
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/plans/follow-up",
            None,
            Some(conversation.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_follow_up_still_rejects_a_malformed_authorization_header() {
        let conversation = json!({"conversation": [
            {"role": "user", "content": "Is rice ok?"}
        ]});
        let mut config = AppState::fake_config();
        config.follow_up_allow_anonymous = true;
        let (state, _, llm) = AppState::fake_with(
            config,
            crate::completion::fake::ScriptedCompletion::new(),
        );
        let app = build_app(state);

        for header in ["Token abc", "Bearer ", "Basic dXNlcjpwdw==", "Bearer not-a-jwt"] {
            let req = Request::builder()
                .method("POST")
                .uri("/api/v1/plans/follow-up")
                .header("authorization", header)
                .header("content-type", "application/json")
                .body(Body::from(conversation.to_string()))
                .unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "header {header:?}");
        }
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn health_reports_database() {
        let (state, _, _) = AppState::fake();
        let app = build_app(state);
        let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }
}
