//! FormRelay smoke test - posts one test submission to a running server.
//!
//! ```text
//! BACKEND_URL=http://127.0.0.1:8000 formrelay-send
//! ```
//!
//! A 200 response only means the submission was queued; check the server
//! logs for `delivery_sent` or `delivery_failed`.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header::CONTENT_TYPE, Client};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Append the intake path to the backend URL, keeping any path prefix.
fn endpoint_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).context("BACKEND_URL is not a valid URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("BACKEND_URL cannot carry a path: {}", base))?
        .pop_if_empty()
        .extend(["api", "send-form"]);
    Ok(url)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let base = std::env::var("BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
    let url = endpoint_url(&base)?;

    let payload = json!({
        "data": {
            "source": "test-script",
            "name": "Test user",
            "phone": "+7 999 123-45-67",
            "comment": "This is a test submission to check email delivery.",
        }
    });

    info!(url = %url, "send_form_posting");

    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .post(url.clone())
        .header(CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(&payload)?)
        .send()
        .await
        .context("Request failed")?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;

    if status.is_success() {
        info!(status = status.as_u16(), body = %body, "send_form_accepted");
        Ok(())
    } else {
        error!(status = status.as_u16(), body = %body, "send_form_rejected");
        anyhow::bail!("server answered {}", status)
    }
}
