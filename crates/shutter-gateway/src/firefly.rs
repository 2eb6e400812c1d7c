//! HTTP client for the FireFly ledger API.
//!
//! All calls are `POST {api_url}/namespaces/{ns}/apis/{api}/{query|invoke}/{method}`.
//! Queries use a short timeout; the submit call waits for confirmation
//! (`?confirm=true`) under a long one. A local timeout is reported as
//! [`GatewayError::TransportFailed`]; the submission may still land remotely.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shutter_core::{Address, CameraIdentity, PhotoDigest, ReplayCounter, SignedRecord};
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::ledger::{address_param, Ledger};
use crate::messages::{
    parse_authorization, parse_counter, parse_exists, ApiInput, AuthorizationState,
    CameraInfoInput, NonceInput, PhotoHashInput, RecordPhotoInput,
};

/// Connection settings for a FireFly API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireFlyConfig {
    pub api_url: String,
    pub namespace: String,
    pub api_name: String,
    pub query_timeout: Duration,
    pub submit_timeout: Duration,
}

impl Default for FireFlyConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000/api/v1".to_string(),
            namespace: "default".to_string(),
            api_name: "secCamv3".to_string(),
            query_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(120),
        }
    }
}

/// Ledger backed by a FireFly REST API.
pub struct FireFlyLedger {
    config: FireFlyConfig,
    client: reqwest::Client,
}

impl FireFlyLedger {
    pub fn new(config: FireFlyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Setup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FireFlyConfig {
        &self.config
    }

    fn url(&self, kind: &str, method: &str) -> String {
        format!(
            "{}/namespaces/{}/apis/{}/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.namespace,
            self.config.api_name,
            kind,
            method
        )
    }

    async fn post<T: Serialize + Sync>(
        &self,
        call: &'static str,
        url: String,
        body: &ApiInput<T>,
        timeout: Duration,
    ) -> Result<String> {
        debug!(call, %url, "ledger request");
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(call, timeout, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(call, timeout, e))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                call,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn query<T: Serialize + Sync>(
        &self,
        call: &'static str,
        input: T,
    ) -> Result<Value> {
        let text = self
            .post(call, self.url("query", call), &ApiInput::new(input), self.config.query_timeout)
            .await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::ResponseShape {
            call,
            reason: format!("invalid json: {e}"),
        })
    }
}

pub(crate) fn map_reqwest_error(call: &'static str, timeout: Duration, e: reqwest::Error) -> GatewayError {
    let reason = if e.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    };
    GatewayError::TransportFailed { call, reason }
}

#[async_trait]
impl Ledger for FireFlyLedger {
    async fn check_authorization(&self, camera: &CameraIdentity) -> Result<AuthorizationState> {
        let camera_id = camera.to_prefixed_hex();
        // Every failure is wrapped so callers can tell it from a clean
        // refusal; the boxed source keeps transport and shape apart.
        let failed = |source: GatewayError| GatewayError::AuthorizationQueryFailed {
            camera_id: camera_id.clone(),
            source: Box::new(source),
        };
        let body = self
            .query(
                "getCameraInfo",
                CameraInfoInput {
                    camera_id: camera_id.clone(),
                },
            )
            .await
            .map_err(failed)?;
        parse_authorization(&body).map_err(|e| {
            failed(GatewayError::ResponseShape {
                call: "getCameraInfo",
                reason: e.to_string(),
            })
        })
    }

    async fn is_notarized(&self, digest: &PhotoDigest) -> Result<bool> {
        let body = self
            .query(
                "verifyPhoto",
                PhotoHashInput {
                    photo_hash: digest.to_prefixed_hex(),
                },
            )
            .await?;
        parse_exists(&body).map_err(|e| GatewayError::ResponseShape {
            call: "verifyPhoto",
            reason: e.to_string(),
        })
    }

    async fn replay_counter(&self, submitter: &Address) -> Result<ReplayCounter> {
        let body = self
            .query(
                "getNonce",
                NonceInput {
                    address: address_param(submitter),
                },
            )
            .await?;
        parse_counter(&body).map_err(|e| GatewayError::ResponseShape {
            call: "getNonce",
            reason: e.to_string(),
        })
    }

    async fn submit(&self, record: &SignedRecord) -> Result<()> {
        let call = "recordPhotoWithSignature";
        let url = format!("{}?confirm=true", self.url("invoke", call));
        let body = ApiInput::new(RecordPhotoInput {
            photo_hash: record.digest.to_prefixed_hex(),
            location: record.location.clone(),
            metadata: record.metadata.clone(),
            signature: record.signature.to_hex(),
        });
        self.post(call, url, &body, self.config.submit_timeout).await?;
        Ok(())
    }
}
