/// Extraction client: the only path to the external OCR / field-extraction service.
///
/// The service receives raw document bytes and answers with an `ExtractionResult`
/// (name/date guesses, a confidence score, warnings). Nothing here persists
/// anything; the caller feeds the result into `confirmDocument` once a human has
/// looked at it.
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::documents::reconcile::validate_extraction;
use crate::documents::{DocumentType, ExtractionResult};
use crate::errors::AppError;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const EXTRACT_PATH: &str = "/v1/extract";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extraction service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed extraction response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("extraction service returned an invalid result: {0}")]
    Invalid(String),

    #[error("extraction service unavailable after {retries} attempts")]
    Exhausted { retries: u32 },
}

impl From<ExtractionError> for AppError {
    fn from(e: ExtractionError) -> Self {
        AppError::Extraction(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

#[derive(Clone)]
pub struct ExtractionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ExtractionClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ExtractionError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            endpoint: extract_endpoint(base_url),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one document for extraction.
    /// Retries on 429 and 5xx with exponential backoff (1s, 2s).
    pub async fn extract(
        &self,
        document_type: DocumentType,
        content: Bytes,
    ) -> Result<ExtractionResult, AppError> {
        let mut last_error: Option<ExtractionError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "extraction call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .query(&[("document_type", document_type.as_str())])
                .header("content-type", "application/octet-stream")
                .body(content.clone());
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ExtractionError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "extraction service returned {body}");
                last_error = Some(ExtractionError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            let body = response.text().await.map_err(ExtractionError::Http)?;
            if !status.is_success() {
                return Err(ExtractionError::Api {
                    status: status.as_u16(),
                    message: service_message(&body),
                }
                .into());
            }

            let result = parse_result(&body)?;
            debug!(
                %document_type,
                confidence = result.confidence,
                warnings = result.warnings.len(),
                "extraction succeeded"
            );
            return Ok(result);
        }

        Err(last_error
            .unwrap_or(ExtractionError::Exhausted {
                retries: MAX_RETRIES,
            })
            .into())
    }
}

fn extract_endpoint(base_url: &str) -> String {
    format!("{}{EXTRACT_PATH}", base_url.trim_end_matches('/'))
}

fn service_message(body: &str) -> String {
    serde_json::from_str::<ServiceError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

/// Parses and sanity-checks a service response.
fn parse_result(body: &str) -> Result<ExtractionResult, AppError> {
    let result: ExtractionResult =
        serde_json::from_str(body).map_err(ExtractionError::Parse)?;
    validate_extraction(&result).map_err(|e| ExtractionError::Invalid(e.to_string()))?;
    Ok(result)
}
