//! Protected request command.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use auth_session::{AuthError, HttpRequest, Method, SessionLifecycleController};
use serde_json::{json, Value};
use tracing::debug;

/// Send one request through the session, refreshing the token if needed.
pub async fn fetch(
    controller: &SessionLifecycleController,
    url: &str,
    method: Method,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let mut request = HttpRequest::new(method, url).with_header("Accept", "application/json");
    if let Some(data) = data {
        let body: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
        request = request.with_json(&body)?;
    }

    let response = match controller.fetcher().fetch_with_token_refresh(request).await {
        Ok(response) => response,
        Err(AuthError::SessionExpired) => {
            output::print_error("Session expired. Log in again with 'iam login'", format);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    debug!(status = response.status, bytes = response.body.len(), "Response received");

    let body = response.json::<Value>().ok();
    match format {
        OutputFormat::Text => {
            println!("HTTP {}", response.status);
            match &body {
                Some(body) => output::print_json(body),
                None if !response.body.is_empty() => println!("{}", response.text()),
                None => {}
            }
        }
        OutputFormat::Json => output::print_json(&json!({
            "status": response.status,
            "body": body.unwrap_or_else(|| Value::String(response.text())),
        })),
    }

    Ok(())
}
