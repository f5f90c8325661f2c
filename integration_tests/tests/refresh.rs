mod common;

use std::time::{Duration, Instant};

use city_core::{
    completion_channel, dispatch_channel, run_request_pump, ClientError, Completion,
    CompletionOutcome, DashboardConfig, ProjectionPhase, Session, StateClient, StateQuery,
};
use city_proto::{group_troops, TroopCategory};
use common::{wood_state, FakeGameServer, Scripted, CITY_ID};
use tokio::sync::mpsc::UnboundedReceiver;

fn city_config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.set_city_id(Some(CITY_ID.to_string()));
    config
}

async fn next_completion(completions: &mut UnboundedReceiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(5), completions.recv())
        .await
        .expect("completion arrived in time")
        .expect("pump still running")
}

#[tokio::test]
async fn fetch_state_by_city_decodes_fixture() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    let client = server.client();

    let decoded = client
        .fetch_state(&StateQuery::City(CITY_ID.to_string()))
        .await?;

    assert_eq!(decoded.payload.city_id.as_deref(), Some(CITY_ID));
    assert_eq!(decoded.payload.resources().unwrap()["wood"], 100.0);
    assert_eq!(decoded.payload.buildings().len(), 3);
    let groups = group_troops(decoded.payload.troops());
    assert_eq!(groups.get(TroopCategory::Archers).len(), 1);
    assert!(groups.unrecognized.is_empty());
    assert_eq!(decoded.raw["tick"], 1200);

    let recorded = server.recorded();
    assert_eq!(recorded.state_queries.len(), 1);
    assert_eq!(
        recorded.state_queries[0].get("cityId").map(String::as_str),
        Some(CITY_ID)
    );
    Ok(())
}

#[tokio::test]
async fn fetch_state_by_player_sends_player_id() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    server
        .client()
        .fetch_state(&StateQuery::Player("player one".to_string()))
        .await?;

    let recorded = server.recorded();
    assert_eq!(
        recorded.state_queries[0].get("playerId").map(String::as_str),
        Some("player one")
    );
    assert!(!recorded.state_queries[0].contains_key("cityId"));
    Ok(())
}

#[tokio::test]
async fn server_error_is_surfaced_and_snapshot_kept() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    server.push(Scripted::ok(wood_state(100.0, 2.0)));
    server.push(Scripted::status(500, "db down"));

    let (dispatch_tx, dispatch_rx) = dispatch_channel();
    let (completion_tx, mut completion_rx) = completion_channel();
    let pump = tokio::spawn(run_request_pump(server.client(), dispatch_rx, completion_tx));

    let mut session = Session::new(&city_config());
    dispatch_tx.send(session.begin_refresh()?)?;
    let t0 = Instant::now();
    let outcome = session.complete(next_completion(&mut completion_rx).await, t0);
    assert_eq!(outcome, CompletionOutcome::Applied { rebased: true });

    dispatch_tx.send(session.begin_refresh()?)?;
    let completion = next_completion(&mut completion_rx).await;
    match &completion.result {
        Err(ClientError::Api { status, body, .. }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "db down");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    let outcome = session.complete(completion, t0 + Duration::from_secs(1));
    assert_eq!(outcome, CompletionOutcome::Failed);

    let message = session.last_error().unwrap_or_default().to_string();
    assert!(message.contains("500"), "{message}");
    assert!(message.contains("db down"), "{message}");
    let snapshot = session.snapshot_store().get_snapshot().unwrap();
    assert_eq!(snapshot.resources["wood"], 100.0);
    assert_eq!(snapshot.captured_at, t0);
    assert_eq!(session.projection_phase(), ProjectionPhase::Projecting);

    drop(dispatch_tx);
    pump.await?;
    Ok(())
}

#[tokio::test]
async fn slow_older_response_does_not_overwrite_newer_state() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    server.push(Scripted::ok(wood_state(10.0, 0.0)).delayed(Duration::from_millis(300)));
    server.push(Scripted::ok(wood_state(500.0, 0.0)));

    let (dispatch_tx, dispatch_rx) = dispatch_channel();
    let (completion_tx, mut completion_rx) = completion_channel();
    let pump = tokio::spawn(run_request_pump(server.client(), dispatch_rx, completion_tx));

    let mut session = Session::new(&city_config());
    let slow = session.begin_refresh()?;
    let slow_seq = slow.seq;
    dispatch_tx.send(slow)?;
    server.wait_for_requests(1).await;
    dispatch_tx.send(session.begin_refresh()?)?;
    assert_eq!(session.in_flight(), 2);

    let first = next_completion(&mut completion_rx).await;
    assert_ne!(first.seq, slow_seq);
    assert_eq!(
        session.complete(first, Instant::now()),
        CompletionOutcome::Applied { rebased: true }
    );

    let second = next_completion(&mut completion_rx).await;
    assert_eq!(second.seq, slow_seq);
    assert_eq!(
        session.complete(second, Instant::now()),
        CompletionOutcome::Superseded
    );

    assert_eq!(session.displayed_resources().unwrap()["wood"], 500);
    assert!(!session.is_busy());

    drop(dispatch_tx);
    pump.await?;
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = StateClient::new(&format!("http://{addr}"))?;
    let err = client
        .fetch_state(&StateQuery::City(CITY_ID.to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "{err:?}");
    assert!(err.status().is_none());
    Ok(())
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    server.push(Scripted::ok("<html>oops</html>"));

    let err = server
        .client()
        .fetch_state(&StateQuery::City(CITY_ID.to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)), "{err:?}");
    Ok(())
}
