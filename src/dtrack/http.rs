//! HTTP utilities for Dependency-Track REST API calls

use crate::sync::{Page, PageOptions};
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Maximum length of an error message shown to the user
const MAX_ERROR_MESSAGE_LENGTH: usize = 120;

/// Header carrying the API key
const API_KEY_HEADER: &str = "X-Api-Key";

/// Header carrying the total number of items of a paged listing
const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Non-success HTTP status returned by the server
#[derive(Debug, thiserror::Error)]
#[error("API request failed: {status}")]
pub struct ApiError {
    pub status: StatusCode,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// True if the error chain holds a 404 from the server
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_not_found)
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Decode a JSON body; an empty body decodes as `null`
fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).context("Failed to parse response JSON")
}

/// HTTP client wrapper for Dependency-Track API calls
#[derive(Clone)]
pub struct DtrackHttpClient {
    client: Client,
}

impl DtrackHttpClient {
    /// Create a new HTTP client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dtrackctl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a request and return headers and body of a successful response
    async fn execute(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
        api_key: &str,
    ) -> Result<(HeaderMap, String)> {
        tracing::debug!("{} {}", method, url);

        let response = request
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} {} - {} - {}", method, url, status, sanitize_for_log(&body));
            return Err(ApiError { status }.into());
        }

        Ok((headers, body))
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, url: &str, api_key: &str) -> Result<T> {
        let (_, body) = self
            .execute(self.client.get(url), "GET", url, api_key)
            .await?;
        decode(&body)
    }

    /// Make a GET request for one page of a listing
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        api_key: &str,
        page: PageOptions,
    ) -> Result<Page<T>> {
        let request = self.client.get(url).query(&[
            ("pageNumber", page.page_number),
            ("pageSize", page.page_size),
        ]);
        let (headers, body) = self.execute(request, "GET", url, api_key).await?;

        let total_count = headers
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        let items: Option<Vec<T>> = decode(&body)?;

        Ok(Page::new(items.unwrap_or_default(), total_count))
    }

    /// Make a PUT request with a JSON body (the API uses PUT to create)
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        api_key: &str,
        body: &B,
    ) -> Result<T> {
        let (_, body) = self
            .execute(self.client.put(url).json(body), "PUT", url, api_key)
            .await?;
        decode(&body)
    }

    /// Make a POST request, optionally with a JSON body (the API uses POST to update)
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        api_key: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let (_, body) = self.execute(request, "POST", url, api_key).await?;
        decode(&body)
    }

    /// Make a DELETE request, optionally with a JSON body
    pub async fn delete<B: Serialize + ?Sized>(
        &self,
        url: &str,
        api_key: &str,
        body: Option<&B>,
    ) -> Result<()> {
        let mut request = self.client.delete(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, "DELETE", url, api_key).await?;
        Ok(())
    }
}

/// Format a Dependency-Track API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(api) = error.downcast_ref::<ApiError>() {
        return match api.status.as_u16() {
            400 => "Invalid request. Check your parameters.".to_string(),
            401 => "Authentication failed. Check DEPENDENCYTRACK_API_KEY.".to_string(),
            403 => "Permission denied. The API key's team lacks the required permission.".to_string(),
            404 => "Resource not found.".to_string(),
            409 => "Resource conflict. The resource may already exist.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            500..=599 => "Dependency-Track temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    let error_str = format!("{:#}", error);

    // Truncate long error messages and remove potential sensitive data
    let mut chars = error_str.chars().filter(|c| c.is_ascii_graphic() || *c == ' ');
    let sanitized = chars.by_ref().take(MAX_ERROR_MESSAGE_LENGTH).collect::<String>();

    if chars.next().is_some() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_body() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(out.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_multibyte_does_not_panic() {
        let body = "é".repeat(300);
        let out = sanitize_for_log(&body);
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_decode_empty_body() {
        let value: serde_json::Value = decode("").unwrap();
        assert!(value.is_null());
        let unit: Option<Vec<u32>> = decode("  ").unwrap();
        assert!(unit.is_none());
    }

    #[test]
    fn test_format_api_error_by_status() {
        let err: anyhow::Error = ApiError {
            status: StatusCode::UNAUTHORIZED,
        }
        .into();
        assert!(format_api_error(&err).contains("DEPENDENCYTRACK_API_KEY"));

        let err = anyhow::Error::from(ApiError {
            status: StatusCode::NOT_FOUND,
        })
        .context("Failed to read team");
        assert!(is_not_found(&err));
        assert_eq!(format_api_error(&err), "Resource not found.");
    }

    #[test]
    fn test_format_other_error() {
        let err = anyhow::anyhow!("connection refused");
        assert_eq!(format_api_error(&err), "connection refused");
    }

    #[test]
    fn test_format_strips_non_ascii_without_ellipsis() {
        let err = anyhow::anyhow!("équipe introuvable");
        assert_eq!(format_api_error(&err), "quipe introuvable");

        let err = anyhow::anyhow!("{}", "y".repeat(200));
        let out = format_api_error(&err);
        assert_eq!(out, format!("{}...", "y".repeat(MAX_ERROR_MESSAGE_LENGTH)));
    }
}
