//! Swap quote endpoint over a real socket.

use alloy::primitives::Address;
use kernel_kit::{
    config::SwapConfig,
    swap::{SwapClient, serve},
};
use serde_json::json;
use tokio::net::TcpListener;

async fn spawn_server(api_key: Option<&str>) -> eyre::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let client = SwapClient::new(SwapConfig::default(), api_key.map(str::to_string));
    tokio::spawn(serve(listener, client));
    Ok(format!("http://{addr}"))
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_api_key() -> eyre::Result<()> {
    let url = spawn_server(None).await?;
    let wallet = Address::repeat_byte(0x11);

    let response = reqwest::get(format!("{url}/api/swap?wallet={wallet}")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<serde_json::Value>().await?, json!({ "error": "Missing API key" }));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_wallet() -> eyre::Result<()> {
    let url = spawn_server(Some("key")).await?;

    let response = reqwest::get(format!("{url}/api/swap?wallet=alice")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let response = reqwest::get(format!("{url}/health")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    Ok(())
}
