//! REST transport tests against a mock API
//!
//! Run with: cargo test -p integration-tests --test http_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use integration_tests::{fixtures::*, http_client, http_config, MockServer, TOKEN};
use parking_lot::Mutex;
use serde_json::{json, Value};
use wharf_core::{CommandOptionType, Embed, MessageFlags, Snowflake};
use wharf_http::{
    AttachmentFile, CommandOption, CreateCommand, CreateMessage, CreateRole, Http, HttpError,
};

fn respond(status: StatusCode, headers: &[(&'static str, &'static str)], body: Value) -> Response {
    let mut response = (status, Json(body)).into_response();
    for (name, value) in headers {
        response
            .headers_mut()
            .insert(*name, HeaderValue::from_static(value));
    }
    response
}

type Reply = fn() -> Response;

/// Route that answers with `script[n]` on the n-th call and the last entry after that
fn scripted(calls: Arc<AtomicUsize>, script: Vec<Reply>) -> axum::routing::MethodRouter {
    get(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let reply = script[n.min(script.len() - 1)];
        async move { reply() }
    })
}

fn me() -> Response {
    Json(user(BOT_ID, "wharf")).into_response()
}

fn globally_limited() -> Response {
    respond(
        StatusCode::TOO_MANY_REQUESTS,
        &[("via", "1.1 google"), ("x-ratelimit-global", "true")],
        json!({"message": "You are being rate limited.", "retry_after": 0.3, "global": true}),
    )
}

fn long_global_limit() -> Response {
    respond(
        StatusCode::TOO_MANY_REQUESTS,
        &[("via", "1.1 google"), ("x-ratelimit-global", "true")],
        json!({"message": "You are being rate limited.", "retry_after": 0.8, "global": true}),
    )
}

fn route_limited() -> Response {
    respond(
        StatusCode::TOO_MANY_REQUESTS,
        &[("via", "1.1 google"), ("x-ratelimit-scope", "user")],
        json!({"message": "You are being rate limited.", "retry_after": 0.2, "global": false}),
    )
}

/// Passed through the proxy but carries no scope, so not from the API limiter
fn unscoped_limited() -> Response {
    respond(
        StatusCode::TOO_MANY_REQUESTS,
        &[("via", "1.1 google")],
        json!({"message": "You are being rate limited.", "retry_after": 5.0}),
    )
}

fn edge_limited() -> Response {
    respond(
        StatusCode::TOO_MANY_REQUESTS,
        &[("retry-after", "60")],
        json!({"message": "banned"}),
    )
}

fn bad_gateway() -> Response {
    StatusCode::BAD_GATEWAY.into_response()
}

fn server_error() -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

// ============================================================================
// Rate limits
// ============================================================================

#[tokio::test]
async fn test_global_rate_limit_blocks_then_succeeds() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![globally_limited as Reply, me]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let started = Instant::now();
    let user = http.get_current_user().await.unwrap();

    assert_eq!(user.id, Snowflake::new(BOT_ID));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_edge_rate_limit_is_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![edge_limited as Reply]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let err = http.get_current_user().await.unwrap_err();

    assert!(matches!(
        err,
        HttpError::EdgeRateLimited { retry_after: Some(d) } if d == Duration::from_secs(60)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unscoped_rate_limit_is_edge() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![unscoped_limited as Reply, me]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let err = http.get_current_user().await.unwrap_err();

    assert!(matches!(
        err,
        HttpError::EdgeRateLimited { retry_after: Some(d) } if d == Duration::from_secs(5)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!http.ratelimiter().global().is_locked());
}

#[tokio::test]
async fn test_route_scoped_rate_limit_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![route_limited as Reply, me]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let started = Instant::now();
    http.get_current_user().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(!http.ratelimiter().global().is_locked());
}

#[tokio::test]
async fn test_global_lock_holds_requests_already_queued_on_a_bucket() {
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let seen = arrivals.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/guilds/:guild_id/channels",
            get(move || {
                seen.lock().push(Instant::now());
                async {
                    respond(
                        StatusCode::OK,
                        &[
                            ("x-ratelimit-limit", "1"),
                            ("x-ratelimit-remaining", "0"),
                            ("x-ratelimit-reset-after", "0.4"),
                        ],
                        channels(),
                    )
                }
            }),
        )
        .route(
            "/users/@me",
            scripted(calls.clone(), vec![long_global_limit as Reply, me]),
        );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();
    let guild = Snowflake::new(GUILD_ID);

    let started = Instant::now();
    http.get_guild_channels(guild).await.unwrap();

    // Parks on the drained bucket until ~0.4s
    let queued = {
        let http = http.clone();
        tokio::spawn(async move { http.get_guild_channels(guild).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Locks the global gate until ~0.85s
    http.get_current_user().await.unwrap();
    queued.await.unwrap().unwrap();

    let arrivals = arrivals.lock().clone();
    assert_eq!(arrivals.len(), 2);
    assert!(arrivals[1] - started >= Duration::from_millis(700));
}

#[tokio::test]
async fn test_drained_bucket_delays_only_its_route() {
    let app = Router::new()
        .route(
            "/guilds/:guild_id/channels",
            get(|| async {
                respond(
                    StatusCode::OK,
                    &[
                        ("x-ratelimit-limit", "1"),
                        ("x-ratelimit-remaining", "0"),
                        ("x-ratelimit-reset-after", "0.5"),
                    ],
                    channels(),
                )
            }),
        )
        .route("/users/@me", get(|| async { me() }));
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();
    let guild = Snowflake::new(GUILD_ID);

    http.get_guild_channels(guild).await.unwrap();

    let started = Instant::now();
    http.get_current_user().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(300));

    let started = Instant::now();
    let channels = http.get_guild_channels(guild).await.unwrap();
    assert_eq!(channels.len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_routes_sharing_a_bucket_hash_merge() {
    let app = Router::new()
        .route(
            "/guilds/:guild_id/channels",
            get(|| async {
                respond(StatusCode::OK, &[("x-ratelimit-bucket", "abcd1234")], channels())
            }),
        )
        .route(
            "/guilds/:guild_id/roles",
            get(|| async {
                respond(StatusCode::OK, &[("x-ratelimit-bucket", "abcd1234")], roles())
            }),
        );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();
    let guild = Snowflake::new(GUILD_ID);

    http.get_guild_channels(guild).await.unwrap();
    http.get_guild_roles(guild).await.unwrap();

    assert_eq!(http.ratelimiter().bucket_count(), 1);
}

// ============================================================================
// Retries and errors
// ============================================================================

#[tokio::test]
async fn test_transient_server_errors_are_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![bad_gateway as Reply, bad_gateway, me]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let user = http.get_current_user().await.unwrap();

    assert_eq!(user.username, "wharf");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![server_error as Reply]),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let err = http.get_current_user().await.unwrap_err();

    match err {
        HttpError::RateLimitExhausted {
            route,
            attempts,
            status,
        } => {
            assert_eq!(route, "GET:/users/@me");
            assert_eq!(attempts, 3);
            assert_eq!(status, 500);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_no_backoff_after_final_attempt() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/users/@me",
        scripted(calls.clone(), vec![bad_gateway as Reply]),
    );
    let server = MockServer::start(app).await.unwrap();
    let config = http_config(&server.base_url())
        .with_max_attempts(2)
        .with_backoff(Duration::from_millis(300), Duration::ZERO);
    let http = Http::new(TOKEN, config).unwrap();

    let started = Instant::now();
    let err = http.get_current_user().await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(err.status(), Some(502));
    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < Duration::from_millis(550));
}

#[tokio::test]
async fn test_validation_errors_are_flattened() {
    let app = Router::new().route(
        "/guilds/:guild_id/roles",
        post(|| async {
            respond(
                StatusCode::BAD_REQUEST,
                &[],
                json!({
                    "code": 50035,
                    "message": "Invalid Form Body",
                    "errors": {"name": {"_errors": [{"code": "BASE_TYPE_MAX_LENGTH", "message": "Must be 100 or fewer in length."}]}}
                }),
            )
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let role = CreateRole {
        name: Some("x".repeat(200)),
        ..Default::default()
    };
    let err = http
        .create_role(Snowflake::new(GUILD_ID), &role, None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.to_string(),
        "400 (error code: 50035): Invalid Form Body\nIn name: Must be 100 or fewer in length."
    );
}

#[tokio::test]
async fn test_not_found() {
    let server = MockServer::start(guild_api(String::new())).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let err = http.get_guild_roles(Snowflake::new(1)).await.unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Request shape
// ============================================================================

#[tokio::test]
async fn test_requests_carry_bot_authorization() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/users/@me",
        get(move |headers: HeaderMap| {
            *captured.lock() = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            async { me() }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    http.get_current_user().await.unwrap();

    assert_eq!(seen.lock().as_deref(), Some("Bot test-token"));
}

#[tokio::test]
async fn test_message_with_file_is_multipart() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/channels/:channel_id/messages",
        post(move |headers: HeaderMap, body: Bytes| {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            *captured.lock() = Some((content_type, String::from_utf8_lossy(&body).into_owned()));
            async {
                Json(json!({
                    "id": "1",
                    "channel_id": GENERAL_ID.to_string(),
                    "author": user(BOT_ID, "wharf"),
                    "content": "report",
                    "attachments": [{"id": "2", "filename": "report.txt", "size": 5, "url": "https://cdn.example/report.txt"}]
                }))
            }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let message = http
        .send_message(
            Snowflake::new(GENERAL_ID),
            CreateMessage::new("report").file(AttachmentFile::new("report.txt", b"hello".to_vec())),
        )
        .await
        .unwrap();
    assert_eq!(message.attachments.len(), 1);

    let (content_type, body) = seen.lock().clone().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(body.contains(r#"name="payload_json""#));
    assert!(body.contains(r#"filename="report.txt""#));
    assert!(body.contains(r#""filename":"report.txt""#));
    assert!(body.contains("hello"));
}

#[tokio::test]
async fn test_message_embeds_are_sent_as_json() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/channels/:channel_id/messages",
        post(move |Json(body): Json<Value>| {
            *captured.lock() = Some(body);
            async {
                Json(json!({
                    "id": "1",
                    "channel_id": GENERAL_ID.to_string(),
                    "author": user(BOT_ID, "wharf"),
                    "content": "",
                    "embeds": [{"title": "Deploy", "color": 5763719}]
                }))
            }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let embed = Embed::new()
        .title("Deploy")
        .color(0x57F287)
        .field("env", "prod", true);
    let message = http
        .send_message(
            Snowflake::new(GENERAL_ID),
            CreateMessage::default().embed(embed),
        )
        .await
        .unwrap();
    assert_eq!(message.embeds[0].title.as_deref(), Some("Deploy"));

    assert_eq!(
        seen.lock().clone().unwrap(),
        json!({
            "embeds": [{
                "title": "Deploy",
                "color": 0x57F287,
                "fields": [{"name": "env", "value": "prod", "inline": true}]
            }]
        })
    );
}

// ============================================================================
// Audit log reasons
// ============================================================================

fn audit_reason(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-audit-log-reason")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_ban_reason_is_percent_encoded() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/guilds/:guild_id/bans/:user_id",
        put(move |headers: HeaderMap, Json(body): Json<Value>| {
            *captured.lock() = Some((audit_reason(&headers), body));
            async { StatusCode::NO_CONTENT }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    http.ban_member(
        Snowflake::new(GUILD_ID),
        Snowflake::new(BOB_ID),
        3600,
        Some("Spam: 3 links/min, café"),
    )
    .await
    .unwrap();

    let (reason, body) = seen.lock().clone().unwrap();
    assert_eq!(reason.as_deref(), Some("Spam%3A 3 links/min%2C caf%C3%A9"));
    assert_eq!(body, json!({"delete_message_seconds": 3600}));
}

#[tokio::test]
async fn test_role_reason_header_only_when_given() {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let captured = reasons.clone();
    let app = Router::new().route(
        "/guilds/:guild_id/roles",
        post(move |headers: HeaderMap| {
            captured.lock().push(audit_reason(&headers));
            async {
                Json(json!({"id": MOD_ROLE_ID.to_string(), "name": "mods", "permissions": "0"}))
            }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();
    let guild = Snowflake::new(GUILD_ID);
    let role = CreateRole {
        name: Some("mods".into()),
        ..Default::default()
    };

    let created = http
        .create_role(guild, &role, Some("new moderators"))
        .await
        .unwrap();
    assert_eq!(created.guild_id, guild);
    http.create_role(guild, &role, None).await.unwrap();

    assert_eq!(
        *reasons.lock(),
        vec![Some("new moderators".to_string()), None]
    );
}

// ============================================================================
// Application commands and interactions
// ============================================================================

fn command(id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "application_id": BOT_ID.to_string(),
        "name": name,
        "description": "test command",
        "type": 1
    })
}

#[tokio::test]
async fn test_app_commands_use_the_bot_application() {
    let me_calls = Arc::new(AtomicUsize::new(0));
    let registered = Arc::new(Mutex::new(None));
    let deleted = Arc::new(Mutex::new(None));
    let (seen_register, seen_delete) = (registered.clone(), deleted.clone());

    let app = Router::new()
        .route("/users/@me", scripted(me_calls.clone(), vec![me as Reply]))
        .route(
            "/applications/:application_id/commands",
            get(|Path(application_id): Path<u64>| async move {
                if application_id != BOT_ID {
                    return StatusCode::NOT_FOUND.into_response();
                }
                Json(json!([command(300, "ping"), command(301, "ban")])).into_response()
            })
            .post(move |Path(application_id): Path<u64>, Json(body): Json<Value>| {
                *seen_register.lock() = Some((application_id, body));
                async { Json(command(302, "ban")) }
            }),
        )
        .route(
            "/applications/:application_id/commands/:command_id",
            delete(move |Path(ids): Path<(u64, u64)>| {
                *seen_delete.lock() = Some(ids);
                async { StatusCode::NO_CONTENT }
            }),
        );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let create = CreateCommand::new("ban", "Ban a member")
        .option(CommandOption::new(CommandOptionType::User, "user", "Who").required());
    let created = http.register_app_command(&create).await.unwrap();
    assert_eq!(created.id, Snowflake::new(302));

    let commands = http.get_app_commands().await.unwrap();
    let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["ping", "ban"]);

    http.delete_app_command(Snowflake::new(300)).await.unwrap();

    let (application_id, body) = registered.lock().clone().unwrap();
    assert_eq!(application_id, BOT_ID);
    assert_eq!(body["name"], "ban");
    assert_eq!(body["type"], 1);
    assert_eq!(body["options"][0]["type"], 6);
    assert_eq!(body["options"][0]["required"], true);
    assert_eq!(*deleted.lock(), Some((BOT_ID, 300)));

    // The application id is looked up once
    assert_eq!(me_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interaction_response_wraps_message() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/interactions/:interaction_id/:interaction_token/callback",
        post(
            move |Path((id, token)): Path<(u64, String)>, Json(body): Json<Value>| {
                *captured.lock() = Some((id, token, body));
                async { StatusCode::NO_CONTENT }
            },
        ),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let reply = CreateMessage::new("pong")
        .embed(Embed::new().description("42ms"))
        .flags(MessageFlags::EPHEMERAL);
    http.interaction_respond(Snowflake::new(900), "tok/en", reply)
        .await
        .unwrap();

    let (id, token, body) = seen.lock().clone().unwrap();
    assert_eq!(id, 900);
    assert_eq!(token, "tok/en");
    assert_eq!(
        body,
        json!({
            "type": 4,
            "data": {
                "content": "pong",
                "embeds": [{"description": "42ms"}],
                "flags": 64
            }
        })
    );
}

#[tokio::test]
async fn test_interaction_response_with_file_is_multipart() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let app = Router::new().route(
        "/interactions/:interaction_id/:interaction_token/callback",
        post(move |headers: HeaderMap, body: Bytes| {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            *captured.lock() = Some((content_type, String::from_utf8_lossy(&body).into_owned()));
            async { StatusCode::NO_CONTENT }
        }),
    );
    let server = MockServer::start(app).await.unwrap();
    let http = http_client(&server.base_url()).unwrap();

    let reply = CreateMessage::new("chart").file(AttachmentFile::new("chart.png", b"PNG".to_vec()));
    http.interaction_respond(Snowflake::new(900), "tok", reply)
        .await
        .unwrap();

    let (content_type, body) = seen.lock().clone().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(body.contains(r#""type":4"#));
    assert!(body.contains(r#""filename":"chart.png""#));
    assert!(body.contains("PNG"));
}
