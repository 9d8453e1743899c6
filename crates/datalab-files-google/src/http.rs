use datalab_files_core::FileManagerError;
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::token_manager::TokenSource;

/// Attach a bearer token, send, and map non-success statuses to errors.
///
/// `what` names the resource for `NotFound` messages.
pub(crate) async fn send_authorized(
    tokens: &dyn TokenSource,
    request: RequestBuilder,
    what: &str,
) -> Result<Response, FileManagerError> {
    let token = tokens.access_token().await?;
    let resp = request
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| FileManagerError::Http(e.to_string()))?;
    check_status(resp, what).await
}

pub(crate) async fn check_status(resp: Response, what: &str) -> Result<Response, FileManagerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(FileManagerError::NotFound(what.to_string())),
        StatusCode::UNAUTHORIZED => Err(FileManagerError::Auth(body)),
        _ => Err(FileManagerError::Upstream {
            status: status.as_u16(),
            body,
        }),
    }
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    resp: Response,
) -> Result<T, FileManagerError> {
    resp.json()
        .await
        .map_err(|e| FileManagerError::MalformedResponse(e.to_string()))
}
