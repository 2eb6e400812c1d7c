//! The relay pipeline.
//!
//! One inbound capture event goes through:
//!
//! 1. decode and validate
//! 2. derive the camera identity
//! 3. load the camera's key (unknown identity is a hard stop)
//! 4. ask the ledger whether the camera is authorized
//! 5. check the key controls the wallet the ledger declares
//! 6. decrypt and hash the photo
//! 7. upload the ciphertext and write local evidence
//! 8. notarize
//!
//! Steps 1 to 6 have no side effects, so any rejection there leaves nothing
//! behind. Evidence is written before the ledger is touched and therefore
//! exists whatever the notarization outcome.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use shutter_core::{
    address_matches, decrypt_and_digest, Address, CameraIdentity, CaptureEvent, PayloadKey,
    PhotoDigest, PhotoMetadata,
};
use shutter_gateway::{
    ContentStore, FireFlyLedger, IpfsStore, Ledger, StorageLocator,
};
use shutter_store::{EvidencePaths, EvidenceRecord, EvidenceWriter, JsonKeyStore, KeyStore};
use tracing::{debug, error, field, info, warn, Instrument, Span};

use crate::config::RelayConfig;
use crate::error::{ErrorClass, RelayError, Result};
use crate::notary::{Notary, NotaryOutcome, NotaryRequest};

/// Log target for security rejections.
pub const SECURITY_TARGET: &str = "shutter::security";

/// Settings for constructing a [`Relay`].
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Key shared with the cameras for the photo payload.
    pub payload_key: PayloadKey,
    /// The relay's own on-chain caller.
    pub submitter: Address,
    /// Where evidence files are written.
    pub evidence_dir: PathBuf,
    /// Topic events arrive on, recorded in the metadata.
    pub topic: String,
    /// Hold a lock across counter fetch and submit.
    pub serialize_submissions: bool,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            payload_key: config.payload_key()?,
            submitter: config.submitter()?,
            evidence_dir: config.evidence.dir.clone(),
            topic: config.broker.events_topic.clone(),
            serialize_submissions: config.relay.serialize_submissions,
        })
    }
}

/// Everything produced for an event that reached notarization.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub camera: CameraIdentity,
    pub digest: PhotoDigest,
    pub locator: StorageLocator,
    pub evidence: EvidencePaths,
    /// Metadata string bound into the signature.
    pub metadata: String,
    pub outcome: NotaryOutcome,
}

/// The relay.
///
/// Generic over its three external seams so tests can run it against
/// in-memory implementations.
pub struct Relay<K: KeyStore, L: Ledger, C: ContentStore> {
    keys: Arc<K>,
    ledger: Arc<L>,
    storage: Arc<C>,
    evidence: EvidenceWriter,
    payload_key: PayloadKey,
    topic: String,
    notary: Notary<L>,
}

/// Relay wired to the production clients.
pub type HttpRelay = Relay<JsonKeyStore, FireFlyLedger, IpfsStore>;

impl HttpRelay {
    /// Build a relay from configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let keys = JsonKeyStore::open(config.keys.path.clone(), config.master_key()?);
        let ledger = FireFlyLedger::new(config.firefly())?;
        let storage = IpfsStore::new(config.storage.add_url.clone(), config.storage.timeout())?;
        Ok(Relay::new(
            Arc::new(keys),
            Arc::new(ledger),
            Arc::new(storage),
            RelaySettings::from_config(config)?,
        ))
    }
}

impl<K: KeyStore, L: Ledger, C: ContentStore> Relay<K, L, C> {
    pub fn new(keys: Arc<K>, ledger: Arc<L>, storage: Arc<C>, settings: RelaySettings) -> Self {
        let notary = Notary::new(ledger.clone(), settings.submitter)
            .with_serialized_submissions(settings.serialize_submissions);
        Self {
            keys,
            ledger,
            storage,
            evidence: EvidenceWriter::new(settings.evidence_dir),
            payload_key: settings.payload_key,
            topic: settings.topic,
            notary,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn keys(&self) -> &Arc<K> {
        &self.keys
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn evidence(&self) -> &EvidenceWriter {
        &self.evidence
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event processing
    // ─────────────────────────────────────────────────────────────────────────

    /// Process one raw event payload.
    pub async fn process(&self, payload: &[u8]) -> Result<ProcessedEvent> {
        let event_id = new_event_id();
        let span = tracing::info_span!(
            "event",
            event_id = %event_id,
            camera_id = field::Empty,
            digest = field::Empty,
        );
        self.process_event(event_id, payload).instrument(span).await
    }

    /// Process one event and log the result.
    ///
    /// Security rejections are logged on [`SECURITY_TARGET`], everything
    /// else on the default target.
    pub async fn handle(&self, payload: &[u8]) -> Option<ProcessedEvent> {
        match self.process(payload).await {
            Ok(processed) => Some(processed),
            Err(e) => {
                log_rejection(&e);
                None
            }
        }
    }

    async fn process_event(&self, event_id: String, payload: &[u8]) -> Result<ProcessedEvent> {
        let event = CaptureEvent::decode(payload)?;
        let camera = event.identity();
        Span::current().record("camera_id", field::display(&camera));
        info!(cam = %event.cam, camera_id = %camera, location = %event.location, "capture event received");

        let key = self.keys.load(&camera).await?;

        let auth = self.ledger.check_authorization(&camera).await?;
        if !auth.authorized {
            return Err(RelayError::Unauthorized {
                camera_id: camera.to_prefixed_hex(),
            });
        }

        let derived = key.signer.address();
        let declared = auth
            .wallet
            .as_deref()
            .filter(|w| !w.is_empty())
            .or(Some(key.declared_address.as_str()).filter(|w| !w.is_empty()));
        match declared {
            Some(expected) if !address_matches(expected, &derived) => {
                return Err(RelayError::WalletMismatch {
                    camera_id: camera.to_prefixed_hex(),
                    expected: expected.to_string(),
                    derived: derived.to_checksum(None),
                });
            }
            Some(_) => debug!(camera_id = %camera, wallet = %derived, "wallet verified"),
            None => warn!(
                target: SECURITY_TARGET,
                camera_id = %camera,
                "no declared wallet to cross-check against"
            ),
        }

        let (plain, digest) = decrypt_and_digest(&self.payload_key, &event.iv, &event.cipher)?;
        Span::current().record("digest", field::display(&digest));
        info!(camera_id = %camera, digest = %digest, size = plain.len(), "payload decrypted");

        let name = format!("{event_id}.enc");
        let locator = self
            .storage
            .add(&name, event.cipher.clone())
            .await
            .map_err(|source| RelayError::External {
                camera_id: camera.to_prefixed_hex(),
                digest: digest.to_prefixed_hex(),
                source,
            })?;

        let evidence = self
            .evidence
            .write(&EvidenceRecord {
                event_id: event_id.clone(),
                camera,
                digest,
                cid: locator.cid.clone(),
                dir_cid: locator.dir_cid.clone(),
                name: locator.name.clone(),
                iv_hex: event.iv_hex(),
            })
            .await?;

        let metadata = PhotoMetadata {
            camera,
            topic: self.topic.clone(),
            event_id: event_id.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            size: plain.len(),
            digest,
            cid: locator.cid.clone(),
            dir_cid: locator.dir_cid.clone(),
        }
        .to_string();
        drop(plain);

        let outcome = self
            .notary
            .notarize(
                &key.signer,
                NotaryRequest {
                    camera,
                    digest,
                    location: &event.location,
                    metadata: &metadata,
                },
            )
            .await?;

        Ok(ProcessedEvent {
            event_id,
            camera,
            digest,
            locator,
            evidence,
            metadata,
            outcome,
        })
    }
}

/// Log a failed event according to its class.
pub fn log_rejection(error: &RelayError) {
    let class = error.class();
    match class {
        ErrorClass::Security => {
            warn!(target: SECURITY_TARGET, class = %class, error = %error, "event rejected")
        }
        ErrorClass::MalformedInput | ErrorClass::Integrity => {
            warn!(class = %class, error = %error, "event dropped")
        }
        ErrorClass::Transport | ErrorClass::Internal => {
            error!(class = %class, error = %error, "event failed")
        }
    }
}

/// New event id: `photo-<unix nanos>-<8 random hex>`.
pub fn new_event_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("photo-{nanos}-{}", &suffix[..8])
}
