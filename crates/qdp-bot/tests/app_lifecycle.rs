//! Application lifecycle against the simulator gateway.

use std::sync::Arc;
use std::time::Duration;

use qdp_bot::{AppConfig, AppError, Application};
use qdp_trader::{CollectingSink, SinkRecord};

fn config(flow_dir: &std::path::Path, gateway: &str) -> AppConfig {
    let mut config = AppConfig::from_toml(&format!(
        r#"
        query_interval_secs = 0
        ready_timeout_secs = 2

        [trader]
        front = "tcp://sim:30005"
        broker = "9999"
        user = "AB1234567"
        pass = "secret"
        gateway = "{gateway}"

        [[contracts]]
        code = "IF2403"
        exchange = "CFFEX"
        vol_scale = 300

        [sim]
        session_id = 8
        trading_day = "20240315"

        [[sim.instruments]]
        code = "IF2403"
        exchange = "CFFEX"
        num = 11
        volume_multiple = 300
        "#
    ))
    .unwrap();
    config.trader.flow_dir = flow_dir.to_path_buf();
    config
}

#[tokio::test(start_paused = true)]
async fn test_start_poll_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(CollectingSink::new());
    let app = Application::with_sink(config(dir.path(), "sim"), sink.clone()).unwrap();

    app.start().await.unwrap();
    assert_eq!(app.session().session_id(), 8);

    app.poll();
    for _ in 0..1_000 {
        if sink.records().iter().any(|r| matches!(r, SinkRecord::Trades(_))) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let records = sink.records();
    assert!(records.iter().any(|r| matches!(r, SinkRecord::Accounts(a) if a.len() == 1)));
    assert!(records.iter().any(|r| matches!(r, SinkRecord::Positions(p) if p.is_empty())));
    assert!(records.iter().any(|r| matches!(r, SinkRecord::Trades(t) if t.is_empty())));

    app.shutdown().await;
    assert!(!app.session().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_times_out() {
    let dir = tempfile::tempdir().unwrap();
    // The recording gateway never answers the login.
    let app = Application::with_sink(config(dir.path(), "recording"), Arc::new(CollectingSink::new()))
        .unwrap();

    match app.start().await {
        Err(AppError::NotReady(timeout)) => assert_eq!(timeout, Duration::from_secs(2)),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_unknown_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let result = Application::with_sink(config(dir.path(), "ctp"), Arc::new(CollectingSink::new()));
    assert!(matches!(result, Err(AppError::Gateway(_))));
}
