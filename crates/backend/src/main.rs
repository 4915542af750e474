// =============================================================================
// Rooted Hearts Backend - API Server Entry Point
// =============================================================================
// Table of Contents:
// 1. Imports
// 2. Application State
// 3. Main Entry Point
// 4. Router Setup
// =============================================================================

mod admin;
mod assessment;
mod auth;
mod blog;
mod config;
mod conversations;
mod db;
mod error;
mod profiles;
mod reports;

use axum::{
    routing::{get, post, put},
    Router,
};
use rooted_hearts_common::AssessmentCatalog;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;

// -----------------------------------------------------------------------------
// 2. Application State
// -----------------------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub catalog: AssessmentCatalog,
}

// -----------------------------------------------------------------------------
// 3. Main Entry Point
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables from multiple possible locations
    // Try current directory first, then crates/backend/
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("crates/backend/.env");
    }

    // Load configuration
    let config = Config::from_env()?;
    let bind_addr = config.bind_address.clone();
    let frontend_url = config.frontend_url.clone();

    // Ensure database directory exists for SQLite
    if config.database_url.starts_with("sqlite:") && !config.database_url.contains(":memory:") {
        let db_path = config
            .database_url
            .trim_start_matches("sqlite:")
            .trim_start_matches("//")
            .split('?')
            .next()
            .unwrap_or_default();
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Could not create database directory {:?}: {}", parent, e);
                }
            }
        }
    }

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    // Create app state
    let state = AppState {
        config: Arc::new(config),
        db,
        catalog: AssessmentCatalog::standard(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Rooted Hearts API Server running on http://{}", bind_addr);
    tracing::info!("Serving frontend at {}", frontend_url);

    axum::serve(listener, app).await?;

    Ok(())
}

// -----------------------------------------------------------------------------
// 4. Router Setup
// -----------------------------------------------------------------------------

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::get_current_user))
        .route("/api/auth/refresh", post(auth::refresh_token))
        // Assessment API
        .route("/api/assessment/questions", get(assessment::get_questions))
        .route("/api/assessment/submit", post(assessment::submit_assessment))
        .route("/api/assessment/status", get(assessment::get_status))
        .route("/api/assessment/growth", get(assessment::get_growth_plan))
        // Profiles API
        .route("/api/profiles", get(profiles::browse_profiles))
        .route("/api/profiles/:id", get(profiles::get_profile))
        .route("/api/profile", put(profiles::update_profile))
        .route("/api/profile/membership", put(profiles::update_membership))
        // Conversations API
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::express_interest),
        )
        .route("/api/conversations/:id", get(conversations::get_conversation))
        .route("/api/conversations/:id/messages", post(conversations::respond))
        .route(
            "/api/conversations/:id/consent",
            post(conversations::grant_consent).delete(conversations::withdraw_consent),
        )
        // Reports & Support
        .route("/api/reports", post(reports::create_report))
        .route(
            "/api/support",
            get(reports::get_my_support_messages).post(reports::create_support_message),
        )
        // Blog (public)
        .route("/api/blog", get(blog::list_published_posts))
        .route("/api/blog/:slug", get(blog::get_published_post))
        // Admin API
        .route("/api/admin/stats", get(admin::get_stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/moderate", post(admin::moderate_user))
        .route("/api/admin/users/:id/moderation", get(admin::get_moderation_history))
        .route("/api/admin/users/:id/background-check", put(admin::set_background_check))
        .route("/api/admin/reports", get(admin::list_reports))
        .route("/api/admin/reports/:id", put(admin::update_report))
        .route("/api/admin/support", get(admin::list_support_messages))
        .route("/api/admin/support/:id", put(admin::update_support_message))
        .route("/api/admin/blog", get(blog::list_all_posts).post(blog::create_post))
        .route("/api/admin/blog/:id", put(blog::update_post).delete(blog::delete_post))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "admin@rootedhearts.test";

    async fn test_app() -> (Router, Database) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();

        let state = AppState {
            config: Arc::new(Config {
                bind_address: "127.0.0.1:0".into(),
                database_url: "sqlite::memory:".into(),
                jwt_secret: "test-secret".into(),
                jwt_expiry_hours: 1,
                frontend_url: "http://localhost:3000".into(),
                admin_emails: vec![ADMIN_EMAIL.into()],
            }),
            db: db.clone(),
            catalog: AssessmentCatalog::standard(),
        };
        (create_router(state), db)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Register and return `(token, user_id)`.
    async fn register(app: &Router, email: &str, name: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "a-long-password", "display_name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn submit_all(app: &Router, token: &str, option_id: &str) -> (StatusCode, Value) {
        let (_, questions) = call(app, Method::GET, "/api/assessment/questions", None, None).await;
        let responses: Vec<Value> = questions["primary"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| json!({ "question_id": q["id"], "option_id": option_id }))
            .collect();
        call(
            app,
            Method::POST,
            "/api/assessment/submit",
            Some(token),
            Some(json!({ "responses": responses })),
        )
        .await
    }

    async fn passed_member(app: &Router, email: &str, name: &str) -> (String, String) {
        let (token, id) = register(app, email, name).await;
        let (status, body) = submit_all(app, &token, "a").await;
        assert_eq!(status, StatusCode::OK, "submit failed: {}", body);
        assert_eq!(body["result"]["passed"], true);
        (token, id)
    }

    fn long_message(opening: &str) -> String {
        format!(
            "{} I read your answers about repairing after conflict and they really resonated with me. \
             I'd love to hear what a good weekend looks like for you.",
            opening
        )
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_starts_in_growth_mode() {
        let (app, _) = test_app().await;
        let (token, _) = register(&app, "Ana@Example.com", "Ana").await;

        let (status, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["user_status"], "needs-growth");
        assert_eq!(me["assessment_passed"], false);
        assert_eq!(me["email"], "ana@example.com");

        // Same email, different case
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "ana@example.COM", "password": "a-long-password", "display_name": "Ana" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login() {
        let (app, _) = test_app().await;
        register(&app, "ben@example.com", "Ben").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ben@example.com", "password": "a-long-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ben@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_assessment_pass_and_retake_cooldown() {
        let (app, _) = test_app().await;
        let (token, _) = register(&app, "cara@example.com", "Cara").await;

        let (status, body) = submit_all(&app, &token, "a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["percentage"], 100);
        assert_eq!(body["user_status"], "active");

        let (_, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(me["user_status"], "active");
        assert_eq!(me["alignment_score"], 100);

        let (status, body) = submit_all(&app, &token, "a").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["retake_eligible_at"].is_string());

        let (_, status_body) = call(&app, Method::GET, "/api/assessment/status", Some(&token), None).await;
        assert_eq!(status_body["can_retake"], false);
    }

    #[tokio::test]
    async fn test_simultaneous_submissions_record_one_attempt() {
        let (app, db) = test_app().await;
        let (token, id) = register(&app, "cleo@example.com", "Cleo").await;

        let ((first, _), (second, _)) = tokio::join!(
            submit_all(&app, &token, "a"),
            submit_all(&app, &token, "a"),
        );
        let mut statuses = [first, second];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);

        let (attempts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM assessment_attempts WHERE user_id = ?")
            .bind(&id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_assessment_rejects_bad_submissions() {
        let (app, _) = test_app().await;
        let (token, _) = register(&app, "dev@example.com", "Dev").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/assessment/submit",
            Some(&token),
            Some(json!({ "responses": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/assessment/submit",
            Some(&token),
            Some(json!({ "responses": [{ "question_id": "er-1", "option_id": "a" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // A rejected submission does not start the cooldown
        let (_, status_body) = call(&app, Method::GET, "/api/assessment/status", Some(&token), None).await;
        assert_eq!(status_body["can_retake"], true);
    }

    #[tokio::test]
    async fn test_growth_mode_placement() {
        let (app, _) = test_app().await;
        let (token, _) = register(&app, "eli@example.com", "Eli").await;

        let (status, body) = submit_all(&app, &token, "b").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["passed"], false);
        assert_eq!(body["user_status"], "needs-growth");

        let (status, growth) = call(&app, Method::GET, "/api/assessment/growth", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!growth["growth_plan"].as_array().unwrap().is_empty());

        // Growth Mode members can't browse
        let (status, _) = call(&app, Method::GET, "/api/profiles", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_conversation_and_photo_consent_flow() {
        let (app, _) = test_app().await;
        let (alice, _) = passed_member(&app, "alice@example.com", "Alice").await;
        let (bob, bob_id) = passed_member(&app, "bob@example.com", "Bob").await;
        let (carol, _) = passed_member(&app, "carol@example.com", "Carol").await;

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/profile",
            Some(&bob),
            Some(json!({ "photo_url": "https://cdn.example.com/bob.jpg", "bio": "Gardener." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, profiles) = call(&app, Method::GET, "/api/profiles", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let bob_card = profiles
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == bob_id.as_str())
            .unwrap()
            .clone();
        assert!(bob_card["photo_url"].is_null());

        // Short interest is rejected
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&alice),
            Some(json!({ "recipient_id": bob_id, "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, conversation) = call(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&alice),
            Some(json!({ "recipient_id": bob_id, "message": long_message("Hi Bob!") })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(conversation["status"], "pending_response");
        let conversation_id = conversation["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&alice),
            Some(json!({ "recipient_id": bob_id, "message": long_message("Hello again!") })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Consent is not available before both have written
        let consent_uri = format!("/api/conversations/{}/consent", conversation_id);
        let (status, _) = call(&app, Method::POST, &consent_uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/conversations/{}/messages", conversation_id),
            Some(&bob),
            Some(json!({ "message": long_message("Hi Alice!") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "both_messaged");

        let (_, body) = call(&app, Method::POST, &consent_uri, Some(&alice), None).await;
        assert_eq!(body["status"], "awaiting_consent");
        assert_eq!(body["photos_unlocked"], false);

        let (_, body) = call(&app, Method::POST, &consent_uri, Some(&bob), None).await;
        assert_eq!(body["status"], "photos_unlocked");
        assert_eq!(body["photos_unlocked"], true);

        let bob_uri = format!("/api/profiles/{}", bob_id);
        let (_, profile) = call(&app, Method::GET, &bob_uri, Some(&alice), None).await;
        assert_eq!(profile["photo_url"], "https://cdn.example.com/bob.jpg");

        // Outsiders see neither the conversation nor the photo
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/conversations/{}", conversation_id),
            Some(&carol),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, profile) = call(&app, Method::GET, &bob_uri, Some(&carol), None).await;
        assert!(profile["photo_url"].is_null());

        let (status, body) = call(&app, Method::DELETE, &consent_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["photos_unlocked"], false);
        let (_, profile) = call(&app, Method::GET, &bob_uri, Some(&alice), None).await;
        assert!(profile["photo_url"].is_null());

        let (_, inbox) = call(&app, Method::GET, "/api/conversations", Some(&alice), None).await;
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["other_display_name"], "Bob");
        assert_eq!(inbox[0]["you_consented"], true);
        assert_eq!(inbox[0]["they_consented"], false);
    }

    #[tokio::test]
    async fn test_growth_mode_cannot_express_interest() {
        let (app, _) = test_app().await;
        let (_, bob_id) = passed_member(&app, "bob@example.com", "Bob").await;
        let (newbie, _) = register(&app, "new@example.com", "Newbie").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/conversations",
            Some(&newbie),
            Some(json!({ "recipient_id": bob_id, "message": long_message("Hi!") })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_moderation_suspend_and_remove() {
        let (app, _) = test_app().await;
        let (admin, admin_id) = register(&app, ADMIN_EMAIL, "Admin").await;
        let (alice, alice_id) = passed_member(&app, "alice@example.com", "Alice").await;
        let (bob, bob_id) = passed_member(&app, "bob@example.com", "Bob").await;

        // Members can't reach the admin API
        let (status, _) = call(&app, Method::GET, "/api/admin/stats", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/admin/users/{}/moderate", admin_id),
            Some(&admin),
            Some(json!({ "action": "warn", "reason": "testing" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/admin/users/{}/moderate", alice_id),
            Some(&admin),
            Some(json!({ "action": "warn", "reason": "Rude opener" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["warning_count"], 1);
        assert_eq!(body["user_status"], "active");

        let (_, body) = call(
            &app,
            Method::POST,
            &format!("/api/admin/users/{}/moderate", alice_id),
            Some(&admin),
            Some(json!({ "action": "suspend", "reason": "Repeated harassment" })),
        )
        .await;
        assert_eq!(body["user_status"], "suspended");
        assert!(body["suspension_end_date"].is_string());

        let (status, _) = call(&app, Method::GET, "/api/profiles", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = submit_all(&app, &alice, "a").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("suspended"));

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/admin/users/{}/moderate", bob_id),
            Some(&admin),
            Some(json!({ "action": "remove", "reason": "Fake profile" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user_status"].is_null());

        let (status, _) = call(&app, Method::GET, "/api/auth/me", Some(&bob), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "BOB@example.com", "password": "a-long-password", "display_name": "Bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, history) = call(
            &app,
            Method::GET,
            &format!("/api/admin/users/{}/moderation", alice_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(history.as_array().unwrap().len(), 2);

        let (_, stats) = call(&app, Method::GET, "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(stats["suspended_users"], 1);
    }

    #[tokio::test]
    async fn test_elapsed_suspension_drops_to_growth_mode() {
        let (app, db) = test_app().await;
        let (token, id) = passed_member(&app, "dana@example.com", "Dana").await;

        let past = chrono::Utc::now() - chrono::Duration::days(1);
        sqlx::query("UPDATE users SET user_status = 'suspended', suspension_end_date = ? WHERE id = ?")
            .bind(past.to_rfc3339())
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        let (_, me) = call(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(me["user_status"], "needs-growth");
        assert!(me["suspension_end_date"].is_null());
    }

    #[tokio::test]
    async fn test_reports_and_support_queue() {
        let (app, _) = test_app().await;
        let (admin, _) = register(&app, ADMIN_EMAIL, "Admin").await;
        let (alice, alice_id) = register(&app, "alice@example.com", "Alice").await;
        let (bob, bob_id) = register(&app, "bob@example.com", "Bob").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/reports",
            Some(&alice),
            Some(json!({ "reported_user_id": alice_id, "reason": "spam", "details": "Reporting myself for testing" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, report) = call(
            &app,
            Method::POST,
            "/api/reports",
            Some(&alice),
            Some(json!({ "reported_user_id": bob_id, "reason": "harassment", "details": "Kept messaging after I said no." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let report_uri = format!("/api/admin/reports/{}", report["id"].as_str().unwrap());

        let (_, pending) = call(&app, Method::GET, "/api/admin/reports?status=pending", Some(&admin), None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            Method::PUT,
            &report_uri,
            Some(&admin),
            Some(json!({ "status": "resolved", "admin_notes": "Warned the member" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "resolved");

        let (status, _) = call(
            &app,
            Method::PUT,
            &report_uri,
            Some(&admin),
            Some(json!({ "status": "dismissed" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, ticket) = call(
            &app,
            Method::POST,
            "/api/support",
            Some(&bob),
            Some(json!({ "subject": "Billing", "message": "I was charged twice this month." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ticket["status"], "unread");
        let ticket_uri = format!("/api/admin/support/{}", ticket["id"].as_str().unwrap());

        let (_, body) = call(
            &app,
            Method::PUT,
            &ticket_uri,
            Some(&admin),
            Some(json!({ "status": "resolved", "admin_response": "Refunded." })),
        )
        .await;
        assert_eq!(body["status"], "resolved");

        let (status, _) = call(
            &app,
            Method::PUT,
            &ticket_uri,
            Some(&admin),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, mine) = call(&app, Method::GET, "/api/support", Some(&bob), None).await;
        assert_eq!(mine[0]["admin_response"], "Refunded.");
    }

    #[tokio::test]
    async fn test_blog_publishing() {
        let (app, _) = test_app().await;
        let (admin, _) = register(&app, ADMIN_EMAIL, "Admin").await;

        let (status, post) = call(
            &app,
            Method::POST,
            "/api/admin/blog",
            Some(&admin),
            Some(json!({ "title": "Why We Ask About Repair", "content": "Conflict happens.", "tags": ["repair"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(post["slug"], "why-we-ask-about-repair");
        let post_uri = format!("/api/admin/blog/{}", post["id"].as_str().unwrap());

        let (status, _) = call(&app, Method::GET, "/api/blog/why-we-ask-about-repair", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, post) = call(&app, Method::PUT, &post_uri, Some(&admin), Some(json!({ "published": true }))).await;
        assert!(post["published_at"].is_string());

        let (status, public) = call(&app, Method::GET, "/api/blog/why-we-ask-about-repair", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(public["tags"][0], "repair");

        let (status, _) = call(&app, Method::DELETE, &post_uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, posts) = call(&app, Method::GET, "/api/blog", None, None).await;
        assert!(posts.as_array().unwrap().is_empty());
    }
}
