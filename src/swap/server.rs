//! HTTP endpoint proxying swap quotes.
//!
//! Serves `GET /api/swap?wallet=<address>` and answers with the aggregator's quote for that taker.

use super::SwapClient;
use crate::error::SwapError;
use alloy::primitives::Address;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Response, StatusCode, Uri,
    header::{CONTENT_TYPE, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// The quote route.
pub const SWAP_ROUTE: &str = "/api/swap";

/// Accepts connections on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, client: SwapClient) -> eyre::Result<()> {
    info!(addr = %listener.local_addr()?, "Started swap quote service");

    loop {
        let (tcp, remote) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "Failed to accept connection");
                continue;
            }
        };
        let io = TokioIo::new(tcp);
        let client = client.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let client = client.clone();
                async move {
                    let (parts, _) = req.into_parts();
                    Ok::<_, Infallible>(handle(&client, &parts.method, &parts.uri).await)
                }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote, %err, "Error serving connection");
            }
        });
    }
}

/// Answers a single request.
pub async fn handle(client: &SwapClient, method: &Method, uri: &Uri) -> Response<Full<Bytes>> {
    if uri.path() != SWAP_ROUTE {
        return json_response(StatusCode::NOT_FOUND, json!({ "error": "Not found" }));
    }
    if *method != Method::GET {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "Method not allowed" }),
        );
    }
    if !client.has_api_key() {
        return error_response(&SwapError::MissingApiKey);
    }

    let Some(wallet) = query_param(uri.query(), "wallet") else {
        return json_response(StatusCode::BAD_REQUEST, json!({ "error": "Missing wallet" }));
    };
    let Ok(wallet) = wallet.parse::<Address>() else {
        return json_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid wallet" }));
    };

    match client.quote_raw(wallet).await {
        Ok(quote) => json_response(StatusCode::OK, quote),
        Err(err) => {
            error!(%wallet, %err, "Failed to fetch swap quote");
            error_response(&err)
        }
    }
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn error_response(err: &SwapError) -> Response<Full<Bytes>> {
    let status = match err {
        SwapError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    json_response(status, json!({ "error": err.to_string() }))
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwapConfig;
    use http_body_util::BodyExt;

    async fn call(
        client: &SwapClient,
        method: Method,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = handle(client, &method, &uri.parse().unwrap()).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn client(api_key: Option<&str>) -> SwapClient {
        SwapClient::new(SwapConfig::default(), api_key.map(str::to_string))
    }

    #[tokio::test]
    async fn missing_api_key_is_500() {
        let wallet = Address::repeat_byte(1);
        let (status, body) =
            call(&client(None), Method::GET, &format!("/api/swap?wallet={wallet}")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Missing API key" }));
    }

    #[tokio::test]
    async fn bad_wallet_is_400() {
        let client = client(Some("key"));

        let (status, body) = call(&client, Method::GET, "/api/swap").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing wallet" }));

        let (status, body) = call(&client, Method::GET, "/api/swap?wallet=0x1234").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid wallet" }));
    }

    #[tokio::test]
    async fn unknown_route() {
        let (status, _) = call(&client(Some("key")), Method::GET, "/api/other").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&client(Some("key")), Method::POST, "/api/swap").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn query_param_parsing() {
        assert_eq!(query_param(Some("a=1&wallet=0xab"), "wallet").as_deref(), Some("0xab"));
        assert_eq!(query_param(Some("wallet="), "wallet"), None);
        assert_eq!(query_param(None, "wallet"), None);
    }
}
