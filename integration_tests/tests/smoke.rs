mod common;

use city_core::config::resolve_dashboard_config;
use city_core::{DashboardConfig, Session, StateClient};
use common::{FakeGameServer, CITY_ID};

#[test]
fn builtin_config_builds_a_client() {
    let config = DashboardConfig::builtin();
    let client = StateClient::from_config(&config).expect("builtin base url is valid");
    assert_eq!(client.base_url().as_str(), "http://localhost:3000/");
}

#[test]
fn config_file_and_base_url_override_layer() {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("dashboard_config.json");
    let (config, metadata) = resolve_dashboard_config(Some(&path), Some("http://game.test/api/"));

    assert_eq!(metadata.path(), Some(&path));
    assert!(metadata.base_url_from_env());
    assert_eq!(config.api_base_url(), "http://game.test/api");
    assert_eq!(config.city_id(), Some(CITY_ID));
    assert_eq!(config.refresh_interval().as_secs(), 15);
}

#[tokio::test]
async fn session_refresh_against_fake_server() -> anyhow::Result<()> {
    let server = FakeGameServer::start().await?;
    let mut config = DashboardConfig::default();
    config.set_api_base_url(server.base_url());
    config.set_city_id(Some(CITY_ID.to_string()));

    let client = StateClient::from_config(&config)?;
    let mut session = Session::new(&config);
    let dispatch = session.begin_refresh()?;
    let result = city_core::pump::execute(&client, &dispatch.call).await;
    session.complete(
        city_core::Completion {
            seq: dispatch.seq,
            call: dispatch.call,
            result,
        },
        std::time::Instant::now(),
    );

    assert!(session.last_error().is_none());
    assert!(session.raw_state().is_some());
    assert_eq!(session.displayed_resources().unwrap()["food"], 250);
    Ok(())
}
