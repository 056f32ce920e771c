//! Shared helpers for the Firebase REST surfaces.

use allowgate_core::{AppError, AppResult};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Appends `segments` to `base` and, when given, the `key` query parameter.
pub(crate) fn endpoint(base: &Url, segments: &[&str], api_key: Option<&str>) -> AppResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AppError::Configuration(format!("endpoint '{base}' cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);

    if let Some(api_key) = api_key {
        url.query_pairs_mut().append_pair("key", api_key);
    }

    Ok(url)
}

/// Extracts the backend message from a Google REST error body.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"))
}

/// Reads a failed response into its backend message.
pub(crate) async fn response_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    error_message(status, &body)
}
