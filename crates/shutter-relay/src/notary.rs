//! Notarization state machine.
//!
//! Per event: check whether the digest is already recorded, fetch the
//! submitter's replay counter, sign, submit. A failed submit is retried
//! exactly once, and only when the counter has moved since it was read;
//! anything else is terminal.
//!
//! The counter belongs to the ledger. Two events from this relay can read
//! the same value and race; the loser sees a rejection, re-reads, and
//! re-signs. With `serialize_submissions` on, a lock held from counter
//! fetch to submit confirmation removes that race locally.

use std::sync::Arc;

use shutter_core::{
    Address, CameraIdentity, CameraSigner, PhotoDigest, ReplayCounter, SignedRecordBuilder,
};
use shutter_gateway::{GatewayError, Ledger};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};

/// Terminal state of a successful notarization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotaryOutcome {
    /// The record was accepted.
    Notarized {
        counter: ReplayCounter,
        attempts: u32,
    },
    /// The digest was already on the ledger; nothing was submitted.
    AlreadyNotarized,
}

impl NotaryOutcome {
    pub fn is_notarized(&self) -> bool {
        matches!(self, Self::Notarized { .. })
    }
}

/// Fields bound into the signature besides the counter.
#[derive(Debug, Clone)]
pub struct NotaryRequest<'a> {
    /// Camera the record is signed for. Used in error reports.
    pub camera: CameraIdentity,
    pub digest: PhotoDigest,
    pub location: &'a str,
    pub metadata: &'a str,
}

/// Drives one record through check, sign, submit and the single retry.
pub struct Notary<L: Ledger> {
    ledger: Arc<L>,
    submitter: Address,
    submit_lock: Option<Arc<Mutex<()>>>,
}

impl<L: Ledger> Notary<L> {
    pub fn new(ledger: Arc<L>, submitter: Address) -> Self {
        Self {
            ledger,
            submitter,
            submit_lock: None,
        }
    }

    /// Serialize counter fetch and submit across concurrent events.
    pub fn with_serialized_submissions(mut self, enabled: bool) -> Self {
        self.submit_lock = enabled.then(|| Arc::new(Mutex::new(())));
        self
    }

    pub fn submitter(&self) -> Address {
        self.submitter
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Run the state machine for one record.
    ///
    /// # Errors
    /// - `External` if the duplicate check or the first counter fetch fails.
    /// - `NotarizationFailed` if submission fails and the retry does not
    ///   recover it.
    pub async fn notarize(
        &self,
        signer: &CameraSigner,
        request: NotaryRequest<'_>,
    ) -> Result<NotaryOutcome> {
        let digest = request.digest;
        let camera = request.camera;

        if self
            .ledger
            .is_notarized(&digest)
            .await
            .map_err(|e| external(&camera, &digest, e))?
        {
            info!(digest = %digest, "photo already notarized, skipping submit");
            return Ok(NotaryOutcome::AlreadyNotarized);
        }

        let _guard = match &self.submit_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let counter = self
            .ledger
            .replay_counter(&self.submitter)
            .await
            .map_err(|e| external(&camera, &digest, e))?;
        let record = SignedRecordBuilder::new(digest)
            .location(request.location)
            .metadata(request.metadata)
            .counter(counter)
            .sign(signer)?;
        debug!(digest = %digest, counter = %counter, "submitting signed record");

        let first = match self.ledger.submit(&record).await {
            Ok(()) => {
                info!(digest = %digest, counter = %counter, "photo notarized");
                return Ok(NotaryOutcome::Notarized {
                    counter,
                    attempts: 1,
                });
            }
            Err(e) => e,
        };
        warn!(digest = %digest, counter = %counter, error = %first, "submit failed, checking counter");

        let fresh = match self.ledger.replay_counter(&self.submitter).await {
            Ok(fresh) => fresh,
            Err(e) => {
                return Err(failed(
                    &camera,
                    &digest,
                    1,
                    format!("{first}; counter re-read failed: {e}"),
                ))
            }
        };
        if fresh == counter {
            return Err(failed(
                &camera,
                &digest,
                1,
                format!("{first}; counter unchanged at {counter}"),
            ));
        }

        let retry = record.resign(signer, fresh)?;
        info!(digest = %digest, old = %counter, new = %fresh, "retrying with fresh counter");
        match self.ledger.submit(&retry).await {
            Ok(()) => {
                info!(digest = %digest, counter = %fresh, "photo notarized on retry");
                Ok(NotaryOutcome::Notarized {
                    counter: fresh,
                    attempts: 2,
                })
            }
            Err(e) => Err(failed(&camera, &digest, 2, e.to_string())),
        }
    }
}

fn external(camera: &CameraIdentity, digest: &PhotoDigest, source: GatewayError) -> RelayError {
    RelayError::External {
        camera_id: camera.to_prefixed_hex(),
        digest: digest.to_prefixed_hex(),
        source,
    }
}

fn failed(camera: &CameraIdentity, digest: &PhotoDigest, attempts: u32, reason: String) -> RelayError {
    RelayError::NotarizationFailed {
        camera_id: camera.to_prefixed_hex(),
        digest: digest.to_prefixed_hex(),
        attempts,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_gateway::{LedgerCall, MemoryLedger, SubmitFault};

    fn relay() -> Address {
        Address::repeat_byte(0xba)
    }

    fn camera() -> CameraIdentity {
        CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234")
    }

    async fn setup(counter: u64) -> (Notary<MemoryLedger>, Arc<MemoryLedger>, CameraSigner) {
        let ledger = Arc::new(MemoryLedger::new(relay()));
        let signer = CameraSigner::random();
        ledger
            .register_camera(camera(), signer.address())
            .await;
        ledger.set_counter(relay(), counter).await;
        (Notary::new(ledger.clone(), relay()), ledger, signer)
    }

    fn request(digest: PhotoDigest) -> NotaryRequest<'static> {
        NotaryRequest {
            camera: camera(),
            digest,
            location: "Building A",
            metadata: "camera=test",
        }
    }

    #[tokio::test]
    async fn test_notarized_first_try() {
        let (notary, ledger, signer) = setup(3).await;
        let outcome = notary
            .notarize(&signer, request(PhotoDigest::compute(b"img")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NotaryOutcome::Notarized {
                counter: ReplayCounter(3),
                attempts: 1
            }
        );
        assert_eq!(ledger.submit_count().await, 1);
    }

    #[tokio::test]
    async fn test_already_notarized_never_submits() {
        let (notary, ledger, signer) = setup(0).await;
        let digest = PhotoDigest::compute(b"img");
        ledger.mark_notarized(digest).await;

        let outcome = notary.notarize(&signer, request(digest)).await.unwrap();
        assert_eq!(outcome, NotaryOutcome::AlreadyNotarized);
        assert_eq!(ledger.submit_count().await, 0);
        assert_eq!(ledger.calls().await, vec![LedgerCall::Exists(digest)]);
    }

    #[tokio::test]
    async fn test_duplicate_check_failure_names_camera_and_digest() {
        let (notary, ledger, signer) = setup(0).await;
        ledger.set_queries_down(true).await;
        let digest = PhotoDigest::compute(b"img");

        let err = notary.notarize(&signer, request(digest)).await.unwrap_err();
        match &err {
            RelayError::External {
                camera_id,
                digest: reported,
                source,
            } => {
                assert_eq!(camera_id, &camera().to_prefixed_hex());
                assert_eq!(reported, &digest.to_prefixed_hex());
                assert_eq!(source.call(), "verifyPhoto");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_counter_race_retries_once() {
        let (notary, ledger, signer) = setup(5).await;
        ledger.push_submit_fault(SubmitFault::CounterRace).await;

        let outcome = notary
            .notarize(&signer, request(PhotoDigest::compute(b"img")))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            NotaryOutcome::Notarized {
                counter: ReplayCounter(6),
                attempts: 2
            }
        );
        assert_eq!(ledger.submit_count().await, 2);
    }

    #[tokio::test]
    async fn test_unchanged_counter_is_not_retried() {
        let (notary, ledger, signer) = setup(5).await;
        ledger.push_submit_fault(SubmitFault::Transport).await;

        let err = notary
            .notarize(&signer, request(PhotoDigest::compute(b"img")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotarizationFailed { attempts: 1, .. }));
        assert_eq!(ledger.submit_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_failure_is_terminal() {
        let (notary, ledger, signer) = setup(5).await;
        ledger.push_submit_fault(SubmitFault::CounterRace).await;
        ledger.push_submit_fault(SubmitFault::Transport).await;

        let err = notary
            .notarize(&signer, request(PhotoDigest::compute(b"img")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotarizationFailed { attempts: 2, .. }));
        assert_eq!(ledger.submit_count().await, 2);
    }

    #[tokio::test]
    async fn test_serialized_submissions_avoid_races() {
        let (notary, ledger, signer) = setup(0).await;
        let notary = Arc::new(notary.with_serialized_submissions(true));
        let signer = Arc::new(signer);

        let mut handles = Vec::new();
        for i in 0..4u8 {
            let notary = notary.clone();
            let signer = signer.clone();
            handles.push(tokio::spawn(async move {
                notary
                    .notarize(&signer, request(PhotoDigest::compute(&[i])))
                    .await
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(matches!(outcome, NotaryOutcome::Notarized { attempts: 1, .. }));
        }
        assert_eq!(ledger.counter(&relay()).await, 4);
        assert_eq!(ledger.submit_count().await, 4);
    }
}
