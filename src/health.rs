//! Liveness endpoint

use crate::log_internal;
use anyhow::{anyhow, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

async fn alive() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn serve(listener: TcpListener, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    log_internal!("Health check listening on {}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| anyhow!("Health check server on {} failed: {}", addr, e))
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Could not bind health check to `{}`: {}", addr, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_ok() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, cancel.clone()));

        let client = reqwest::Client::new();
        for path in ["/", "/health"] {
            let response = client
                .get(format!("http://{}{}", addr, path))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(response.text().await.unwrap(), "OK");
        }

        cancel.cancel();
        server.await.unwrap().unwrap();
    }
}
