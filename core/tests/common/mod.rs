#![allow(dead_code)]

use std::time::Duration;

use apiprobe_core::{RequestExecutor, StoreEndpoints, TracingSink};
use tokio::net::TcpListener;

/// Start the mock store on a random port and return its base URL.
pub async fn spawn_store(cart_settle: Duration) -> String {
    apiprobe_core::observe::init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with(
        listener,
        mock_server::Settings { cart_settle },
    ));
    format!("http://{addr}")
}

pub fn executor(base_url: &str) -> RequestExecutor {
    let config = apiprobe_core::ProbeConfig {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    RequestExecutor::from_config(&config).unwrap().with_sink(TracingSink)
}

pub async fn login(executor: &RequestExecutor, store: &StoreEndpoints) -> String {
    let response = executor
        .execute(&store.login(mock_server::DEMO_EMAIL, mock_server::DEMO_PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "login failed: {}", response.text());
    response.deserialize::<apiprobe_core::Session>().unwrap().token
}
