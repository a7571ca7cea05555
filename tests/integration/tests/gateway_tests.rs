//! Gateway session tests against a scripted mock gateway
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;

use integration_tests::{client_config, eventually, fixtures::*, MockGateway, MockServer, STEP_TIMEOUT};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wharf::cache::InMemoryCache;
use wharf::gateway::{ConnectionState, GatewayError};
use wharf::{Client, ClientError, GatewayHandle, HandlerError, Snowflake};

/// Nothing listens here; tests that never touch REST point the client at it
const NO_API: &str = "http://127.0.0.1:9";

struct Running {
    handle: GatewayHandle,
    cache: Arc<InMemoryCache>,
    task: JoinHandle<Result<(), ClientError>>,
}

impl Running {
    fn start(mut client: Client) -> Self {
        let handle = client.handle();
        let cache = Arc::clone(client.cache());
        let task = tokio::spawn(async move { client.start().await });
        Self {
            handle,
            cache,
            task,
        }
    }

    async fn finished(self) -> Result<(), ClientError> {
        tokio::time::timeout(STEP_TIMEOUT, self.task)
            .await
            .expect("client did not stop")
            .expect("client task panicked")
    }
}

fn plain_client(gateway: &MockGateway) -> Client {
    Client::new(client_config(NO_API, &gateway.url(), false)).unwrap()
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_and_ready() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    assert!(conn.query.contains("v=10"));
    assert!(conn.query.contains("encoding=json"));
    assert!(!conn.is_compressed());

    conn.hello(45_000).await.unwrap();
    let identify = conn.recv_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], "test-token");
    assert!(identify["d"]["intents"].is_u64());
    assert!(identify["d"]["properties"]["os"].is_string());

    conn.dispatch(1, "READY", ready("session-1", &gateway.url()))
        .await
        .unwrap();

    let handle = running.handle.clone();
    eventually("ready", || handle.state() == ConnectionState::Ready)
        .await
        .unwrap();
    let session = running.handle.session();
    assert_eq!(session.session_id.as_deref(), Some("session-1"));
    assert_eq!(session.sequence, Some(1));

    running.handle.close().await.unwrap();
    assert_eq!(conn.closed().await.unwrap(), Some(1000));
    running.finished().await.unwrap();
}

#[tokio::test]
async fn test_fatal_close_code_stops_the_client() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(45_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.close(4004, "Authentication failed").await.unwrap();

    let err = running.finished().await.unwrap_err();
    let ClientError::Gateway(gateway_err) = &err else {
        panic!("unexpected error: {err}");
    };
    assert!(matches!(
        gateway_err,
        GatewayError::ConnectionClosed { code: Some(4004), .. }
    ));
    assert!(gateway_err.is_fatal());
    assert!(!err.is_retryable());
}

// ============================================================================
// Heartbeats
// ============================================================================

#[tokio::test]
async fn test_heartbeat_carries_last_sequence() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(100).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(7, "READY", ready("session-hb", &gateway.url()))
        .await
        .unwrap();

    // Beats sent before READY was read carry null
    loop {
        let beat = conn.recv_op(1).await.unwrap();
        if beat["d"] == 7 {
            break;
        }
        assert!(beat["d"].is_null());
    }

    conn.op(11, Value::Null).await.unwrap();
    let handle = running.handle.clone();
    eventually("latency", || handle.latency().is_some())
        .await
        .unwrap();

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}

#[tokio::test]
async fn test_server_heartbeat_request_is_answered() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(60_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(3, "READY", ready("session-req", &gateway.url()))
        .await
        .unwrap();
    conn.op(1, Value::Null).await.unwrap();

    let beat = conn.recv_op(1).await.unwrap();
    assert_eq!(beat["d"], 3);

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test]
async fn test_reconnect_request_resumes_session() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(45_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(1, "READY", ready("session-r", &gateway.url()))
        .await
        .unwrap();
    conn.dispatch(2, "TYPING_START", json!({"channel_id": GENERAL_ID.to_string()}))
        .await
        .unwrap();
    conn.op(7, Value::Null).await.unwrap();

    assert_eq!(conn.closed().await.unwrap(), Some(4000));

    let mut conn = gateway.accept().await.unwrap();
    assert!(conn.query.contains("v=10"));
    conn.hello(45_000).await.unwrap();

    let resume = conn.recv_op(6).await.unwrap();
    assert_eq!(resume["d"]["token"], "test-token");
    assert_eq!(resume["d"]["session_id"], "session-r");
    assert_eq!(resume["d"]["seq"], 2);

    conn.dispatch(3, "RESUMED", json!({})).await.unwrap();
    let handle = running.handle.clone();
    eventually("resumed", || handle.state() == ConnectionState::Ready)
        .await
        .unwrap();
    assert_eq!(running.handle.session().sequence, Some(3));

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}

#[tokio::test]
async fn test_invalid_session_identifies_again() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = Running::start(plain_client(&gateway));

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(45_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(1, "READY", ready("session-dead", &gateway.url()))
        .await
        .unwrap();
    conn.op(9, json!(false)).await.unwrap();

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(45_000).await.unwrap();
    let identify = conn.recv_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], "test-token");
    assert!(running.handle.session().session_id.is_none());

    conn.dispatch(1, "READY", ready("session-new", &gateway.url()))
        .await
        .unwrap();
    let handle = running.handle.clone();
    eventually("new session", || {
        handle.session().session_id.as_deref() == Some("session-new")
    })
    .await
    .unwrap();

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}

// ============================================================================
// Cache lifecycle
// ============================================================================

#[tokio::test]
async fn test_guild_lifecycle_over_compressed_stream() {
    let mut gateway = MockGateway::start().await.unwrap();
    let api = MockServer::start(guild_api(gateway.url())).await.unwrap();

    let mut config = client_config(&api.base_url(), &gateway.url(), true);
    config.gateway.url = None;
    let client = Client::new(config).unwrap();

    let (removed_tx, mut removed) = mpsc::unbounded_channel();
    client.subscribe("GUILD_MEMBER_REMOVE", move |event| {
        let removed_tx = removed_tx.clone();
        async move {
            let user_id = event.raw["user"]["id"].as_str().unwrap_or_default().to_string();
            removed_tx.send(user_id)?;
            Ok::<_, HandlerError>(())
        }
    });
    let (guilds_tx, mut guilds) = mpsc::unbounded_channel();
    client.subscribe("guild_create", move |event| {
        let guilds_tx = guilds_tx.clone();
        async move {
            if let Some(guild) = event.guild() {
                guilds_tx.send(guild.name.clone())?;
            }
            Ok::<_, HandlerError>(())
        }
    });
    let running = Running::start(client);

    let mut conn = gateway.accept().await.unwrap();
    assert!(conn.is_compressed());
    conn.hello(45_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(1, "READY", ready("session-g", &gateway.url()))
        .await
        .unwrap();
    conn.dispatch(2, "GUILD_CREATE", guild_create()).await.unwrap();

    let name = tokio::time::timeout(STEP_TIMEOUT, guilds.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "Wharf Test");

    let guild_id = Snowflake::new(GUILD_ID);
    let cache = Arc::clone(&running.cache);
    eventually("backfill", || {
        cache.guild_members(guild_id).is_ok_and(|m| m.len() == 2)
            && cache.guild_channels(guild_id).is_ok_and(|c| c.len() == 2)
            && cache.guild_roles(guild_id).is_ok_and(|r| r.len() == 2)
    })
    .await
    .unwrap();
    assert!(cache
        .member(guild_id, Snowflake::new(ALICE_ID))
        .is_some_and(|m| m.has_role(Snowflake::new(MOD_ROLE_ID))));
    assert!(cache
        .channel(Snowflake::new(VOICE_ID))
        .is_some_and(|c| c.is_voice()));

    conn.dispatch(
        3,
        "GUILD_MEMBER_REMOVE",
        json!({"guild_id": GUILD_ID.to_string(), "user": user(BOB_ID, "bob")}),
    )
    .await
    .unwrap();

    let user_id = tokio::time::timeout(STEP_TIMEOUT, removed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user_id, BOB_ID.to_string());
    assert!(cache.member(guild_id, Snowflake::new(BOB_ID)).is_none());
    assert!(cache.member(guild_id, Snowflake::new(ALICE_ID)).is_some());

    conn.dispatch(4, "GUILD_DELETE", json!({"id": GUILD_ID.to_string(), "unavailable": true}))
        .await
        .unwrap();
    eventually("guild removed", || cache.guild(guild_id).is_none())
        .await
        .unwrap();
    assert!(cache.channel(Snowflake::new(GENERAL_ID)).is_none());

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}

#[tokio::test]
async fn test_interaction_create_reaches_handlers_typed() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = plain_client(&gateway);

    let (commands_tx, mut commands) = mpsc::unbounded_channel();
    client.subscribe("INTERACTION_CREATE", move |event| {
        let commands_tx = commands_tx.clone();
        async move {
            if let Some(interaction) = event.interaction() {
                let name = interaction.command_name().unwrap_or_default().to_string();
                let user = interaction.user().map(|u| u.id);
                commands_tx.send((name, user, interaction.option("days").cloned()))?;
            }
            Ok::<_, HandlerError>(())
        }
    });
    let running = Running::start(client);

    let mut conn = gateway.accept().await.unwrap();
    conn.hello(45_000).await.unwrap();
    conn.recv_op(2).await.unwrap();
    conn.dispatch(1, "READY", ready("session-i", &gateway.url()))
        .await
        .unwrap();
    conn.dispatch(
        2,
        "INTERACTION_CREATE",
        json!({
            "id": "900",
            "application_id": BOT_ID.to_string(),
            "type": 2,
            "token": "tok",
            "guild_id": GUILD_ID.to_string(),
            "channel_id": GENERAL_ID.to_string(),
            "member": {"user": user(ALICE_ID, "alice"), "roles": []},
            "data": {"id": "300", "name": "prune", "options": [{"name": "days", "type": 4, "value": 7}]}
        }),
    )
    .await
    .unwrap();

    let (name, user_id, days) = tokio::time::timeout(STEP_TIMEOUT, commands.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "prune");
    assert_eq!(user_id, Some(Snowflake::new(ALICE_ID)));
    assert_eq!(days, Some(json!(7)));

    running.handle.close().await.unwrap();
    running.finished().await.unwrap();
}
