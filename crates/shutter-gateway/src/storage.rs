//! Content-addressed storage for encrypted photos.
//!
//! The relay uploads the ciphertext exactly as the camera produced it, so
//! the stored object is useless without the device key and the IV recorded
//! in the evidence file.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::firefly::map_reqwest_error;

/// Where an uploaded object can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocator {
    /// Locator of the file itself.
    pub cid: String,
    /// Locator of the wrapping directory.
    pub dir_cid: String,
    /// File name used for the upload.
    pub name: String,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload `bytes` under `name`.
    async fn add(&self, name: &str, bytes: Vec<u8>) -> Result<StorageLocator>;
}

/// One line of an IPFS `add` response.
#[derive(Debug, Deserialize)]
struct AddLine {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash", default)]
    hash: String,
}

/// Parse the newline-delimited JSON returned by IPFS `add`.
///
/// The file locator is the entry whose name matches the upload; the
/// directory locator is the last entry. Each falls back to the other.
pub fn parse_add_response(body: &str, name: &str) -> std::result::Result<StorageLocator, String> {
    let mut file_cid = String::new();
    let mut dir_cid = String::new();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(entry) = serde_json::from_str::<AddLine>(line) else {
            continue;
        };
        if entry.hash.is_empty() {
            continue;
        }
        if entry.name == name {
            file_cid = entry.hash.clone();
        }
        dir_cid = entry.hash;
    }

    if file_cid.is_empty() {
        file_cid = dir_cid.clone();
    }
    if file_cid.is_empty() {
        return Err("add response carries no locator".to_string());
    }
    if dir_cid.is_empty() {
        dir_cid = file_cid.clone();
    }
    Ok(StorageLocator {
        cid: file_cid,
        dir_cid,
        name: name.to_string(),
    })
}

/// IPFS HTTP API client.
pub struct IpfsStore {
    add_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl IpfsStore {
    /// `add_url` is the full `/api/v0/add` URL including query options.
    pub fn new(add_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Setup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            add_url: add_url.into(),
            timeout,
            client,
        })
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn add(&self, name: &str, bytes: Vec<u8>) -> Result<StorageLocator> {
        let call = "ipfs add";
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.add_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(call, self.timeout, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(call, self.timeout, e))?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                call,
                status: status.as_u16(),
                body: text,
            });
        }

        let locator = parse_add_response(&text, name)
            .map_err(|reason| GatewayError::ResponseShape { call, reason })?;
        debug!(name, size, cid = %locator.cid, "uploaded");
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_and_directory() {
        let body = concat!(
            r#"{"Name":"photo-1.enc","Hash":"QmFile","Size":"100"}"#,
            "\n",
            r#"{"Name":"","Hash":"QmDir","Size":"150"}"#,
            "\n"
        );
        let loc = parse_add_response(body, "photo-1.enc").unwrap();
        assert_eq!(loc.cid, "QmFile");
        assert_eq!(loc.dir_cid, "QmDir");
        assert_eq!(loc.name, "photo-1.enc");
    }

    #[test]
    fn test_fallbacks() {
        let only_dir = r#"{"Name":"","Hash":"QmDir"}"#;
        let loc = parse_add_response(only_dir, "x.enc").unwrap();
        assert_eq!(loc.cid, "QmDir");
        assert_eq!(loc.dir_cid, "QmDir");

        let only_file = r#"{"Name":"x.enc","Hash":"QmFile"}"#;
        let loc = parse_add_response(only_file, "x.enc").unwrap();
        assert_eq!(loc.cid, "QmFile");
        assert_eq!(loc.dir_cid, "QmFile");
    }

    #[test]
    fn test_skips_garbage_and_rejects_empty() {
        let body = "not json\n{\"Name\":\"x.enc\",\"Hash\":\"QmFile\"}\n";
        assert_eq!(parse_add_response(body, "x.enc").unwrap().cid, "QmFile");
        assert!(parse_add_response("", "x.enc").is_err());
        assert!(parse_add_response(r#"{"Name":"x.enc","Hash":""}"#, "x.enc").is_err());
    }
}
