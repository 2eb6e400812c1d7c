//! Local evidence files.
//!
//! Two plain-text files per event, named by the event id:
//!
//! - `<id>.cid`: storage locators plus the camera identity and IV
//! - `<id>.sha256`: the photo digest as bare hex
//!
//! They are written before any ledger interaction and are never
//! deduplicated: a new event always gets new files.

use std::path::{Path, PathBuf};

use shutter_core::{CameraIdentity, PhotoDigest};
use tracing::{debug, warn};

use crate::error::Result;

/// What gets written for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceRecord {
    pub event_id: String,
    pub camera: CameraIdentity,
    pub digest: PhotoDigest,
    /// Locator of the uploaded ciphertext.
    pub cid: String,
    /// Locator of the wrapping directory.
    pub dir_cid: String,
    /// Uploaded file name.
    pub name: String,
    /// IV as hex, needed to decrypt the uploaded ciphertext later.
    pub iv_hex: String,
}

impl EvidenceRecord {
    /// Body of the `.cid` file.
    pub fn locator_text(&self) -> String {
        format!(
            "cid={}\ndir_cid={}\nname={}\ncam={}\niv={}\n",
            self.cid, self.dir_cid, self.name, self.camera, self.iv_hex
        )
    }

    /// Body of the `.sha256` file.
    pub fn digest_text(&self) -> String {
        format!("{}\n", self.digest.to_hex())
    }
}

/// Paths of the files written for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePaths {
    pub locator: PathBuf,
    pub digest: PathBuf,
}

/// Writes evidence files into a directory.
#[derive(Debug, Clone)]
pub struct EvidenceWriter {
    dir: PathBuf,
}

impl EvidenceWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths_for(&self, event_id: &str) -> EvidencePaths {
        EvidencePaths {
            locator: self.dir.join(format!("{event_id}.cid")),
            digest: self.dir.join(format!("{event_id}.sha256")),
        }
    }

    /// Write both files for an event.
    ///
    /// Either both files exist afterwards or neither was left by this call.
    pub async fn write(&self, record: &EvidenceRecord) -> Result<EvidencePaths> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let paths = self.paths_for(&record.event_id);
        tokio::fs::write(&paths.digest, record.digest_text()).await?;
        if let Err(e) = tokio::fs::write(&paths.locator, record.locator_text()).await {
            if let Err(cleanup) = tokio::fs::remove_file(&paths.digest).await {
                warn!(path = %paths.digest.display(), error = %cleanup, "could not remove partial evidence");
            }
            return Err(e.into());
        }
        debug!(event_id = %record.event_id, digest = %record.digest, "evidence written");
        Ok(paths)
    }

    /// Read back the digest recorded for an event.
    pub async fn read_digest(&self, event_id: &str) -> Result<PhotoDigest> {
        let text = tokio::fs::read_to_string(self.paths_for(event_id).digest).await?;
        Ok(PhotoDigest::from_hex(text.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> EvidenceRecord {
        EvidenceRecord {
            event_id: "photo-1-deadbeef".into(),
            camera: CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234"),
            digest: PhotoDigest::compute(b"hello"),
            cid: "QmFile".into(),
            dir_cid: "QmDir".into(),
            name: "photo-1-deadbeef.enc".into(),
            iv_hex: "00".repeat(16),
        }
    }

    #[tokio::test]
    async fn test_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(dir.path());
        let paths = writer.write(&record()).await.unwrap();

        let cid = std::fs::read_to_string(&paths.locator).unwrap();
        assert_eq!(
            cid,
            format!(
                "cid=QmFile\ndir_cid=QmDir\nname=photo-1-deadbeef.enc\ncam=0xeaf063dec3ca905e73c6cf4b3d4804dd31a3a22dda1b2d5e251e2f9ef0565088\niv={}\n",
                "00".repeat(16)
            )
        );

        let sha = std::fs::read_to_string(&paths.digest).unwrap();
        assert_eq!(
            sha,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824\n"
        );
        assert_eq!(
            writer.read_digest("photo-1-deadbeef").await.unwrap(),
            PhotoDigest::compute(b"hello")
        );
    }

    #[tokio::test]
    async fn test_same_digest_new_event_gets_new_files() {
        let dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(dir.path());
        let mut second = record();
        second.event_id = "photo-2-cafebabe".into();

        let a = writer.write(&record()).await.unwrap();
        let b = writer.write(&second).await.unwrap();
        assert_ne!(a.digest, b.digest);
        assert!(a.digest.exists() && b.digest.exists());
    }

    #[tokio::test]
    async fn test_failed_locator_write_leaves_no_digest() {
        let dir = TempDir::new().unwrap();
        let writer = EvidenceWriter::new(dir.path());
        let paths = writer.paths_for(&record().event_id);
        // A directory in the locator's place makes the second write fail.
        std::fs::create_dir(&paths.locator).unwrap();

        assert!(writer.write(&record()).await.is_err());
        assert!(!paths.digest.exists());
        assert!(paths.locator.is_dir());
    }
}
