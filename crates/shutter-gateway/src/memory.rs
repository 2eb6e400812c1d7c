//! In-memory ledger and content store for testing.
//!
//! [`MemoryLedger`] follows the contract's rules rather than just recording
//! calls: a submission is accepted only if the signature recovers, under the
//! ledger's own counter for the submitter, to the wallet of an authorized
//! camera. Faults can be scripted to exercise the relay's retry path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shutter_core::{
    address_matches, recover_record_signer, Address, CameraIdentity, PhotoDigest, ReplayCounter,
    SignedRecord,
};
use tokio::sync::RwLock;

use crate::error::{GatewayError, Result};
use crate::ledger::Ledger;
use crate::messages::AuthorizationState;
use crate::storage::{ContentStore, StorageLocator};

/// A call observed by the memory ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Authorization(CameraIdentity),
    Exists(PhotoDigest),
    Counter(Address),
    Submit {
        digest: PhotoDigest,
        counter: ReplayCounter,
    },
}

/// Scripted behaviour for the next submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitFault {
    /// Another submitter advances the counter first, invalidating the
    /// signature.
    CounterRace,
    /// The request fails before reaching the ledger.
    Transport,
}

#[derive(Default)]
struct LedgerState {
    cameras: HashMap<CameraIdentity, AuthorizationState>,
    notarized: HashSet<PhotoDigest>,
    accepted: Vec<SignedRecord>,
    counters: HashMap<Address, u64>,
    faults: VecDeque<SubmitFault>,
    authorization_down: bool,
    queries_down: bool,
    calls: Vec<LedgerCall>,
}

/// In-memory ledger.
pub struct MemoryLedger {
    submitter: Address,
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    /// Create a ledger where `submitter` is the relay's calling wallet.
    pub fn new(submitter: Address) -> Self {
        Self {
            submitter,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Register an authorized camera bound to `wallet`.
    pub async fn register_camera(&self, camera: CameraIdentity, wallet: Address) {
        self.set_camera_state(
            camera,
            AuthorizationState {
                authorized: true,
                wallet: Some(wallet.to_checksum(None)),
            },
        )
        .await;
    }

    pub async fn set_camera_state(&self, camera: CameraIdentity, state: AuthorizationState) {
        self.state.write().await.cameras.insert(camera, state);
    }

    pub async fn revoke_camera(&self, camera: &CameraIdentity) {
        if let Some(state) = self.state.write().await.cameras.get_mut(camera) {
            state.authorized = false;
        }
    }

    pub async fn set_counter(&self, address: Address, value: u64) {
        self.state.write().await.counters.insert(address, value);
    }

    pub async fn counter(&self, address: &Address) -> u64 {
        self.state.read().await.counters.get(address).copied().unwrap_or(0)
    }

    /// Mark a digest as already notarized by someone else.
    pub async fn mark_notarized(&self, digest: PhotoDigest) {
        self.state.write().await.notarized.insert(digest);
    }

    pub async fn push_submit_fault(&self, fault: SubmitFault) {
        self.state.write().await.faults.push_back(fault);
    }

    /// Make authorization queries fail as if the service were unreachable.
    pub async fn set_authorization_down(&self, down: bool) {
        self.state.write().await.authorization_down = down;
    }

    /// Make duplicate-check and counter queries time out.
    pub async fn set_queries_down(&self, down: bool) {
        self.state.write().await.queries_down = down;
    }

    pub async fn calls(&self) -> Vec<LedgerCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn submit_count(&self) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, LedgerCall::Submit { .. }))
            .count()
    }

    /// Records the ledger accepted, in order.
    pub async fn accepted(&self) -> Vec<SignedRecord> {
        self.state.read().await.accepted.clone()
    }
}

fn query_timeout(call: &'static str) -> GatewayError {
    GatewayError::TransportFailed {
        call,
        reason: "timed out after 30s".to_string(),
    }
}

fn rejected(reason: &str) -> GatewayError {
    GatewayError::Status {
        call: "recordPhotoWithSignature",
        status: 500,
        body: reason.to_string(),
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn check_authorization(&self, camera: &CameraIdentity) -> Result<AuthorizationState> {
        let mut state = self.state.write().await;
        state.calls.push(LedgerCall::Authorization(*camera));
        if state.authorization_down {
            return Err(GatewayError::AuthorizationQueryFailed {
                camera_id: camera.to_prefixed_hex(),
                source: Box::new(GatewayError::TransportFailed {
                    call: "getCameraInfo",
                    reason: "service unavailable".to_string(),
                }),
            });
        }
        Ok(state.cameras.get(camera).cloned().unwrap_or_default())
    }

    async fn is_notarized(&self, digest: &PhotoDigest) -> Result<bool> {
        let mut state = self.state.write().await;
        state.calls.push(LedgerCall::Exists(*digest));
        if state.queries_down {
            return Err(query_timeout("verifyPhoto"));
        }
        Ok(state.notarized.contains(digest))
    }

    async fn replay_counter(&self, submitter: &Address) -> Result<ReplayCounter> {
        let mut state = self.state.write().await;
        state.calls.push(LedgerCall::Counter(*submitter));
        if state.queries_down {
            return Err(query_timeout("getNonce"));
        }
        Ok(ReplayCounter(state.counters.get(submitter).copied().unwrap_or(0)))
    }

    async fn submit(&self, record: &SignedRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(LedgerCall::Submit {
            digest: record.digest,
            counter: record.counter,
        });

        match state.faults.pop_front() {
            Some(SubmitFault::Transport) => {
                return Err(GatewayError::TransportFailed {
                    call: "recordPhotoWithSignature",
                    reason: "connection reset".to_string(),
                });
            }
            Some(SubmitFault::CounterRace) => {
                *state.counters.entry(self.submitter).or_insert(0) += 1;
            }
            None => {}
        }

        if state.notarized.contains(&record.digest) {
            return Err(rejected("photo already recorded"));
        }

        let counter = ReplayCounter(state.counters.get(&self.submitter).copied().unwrap_or(0));
        let signer = recover_record_signer(
            &record.digest,
            &record.location,
            &record.metadata,
            counter,
            &record.signature,
        )
        .map_err(|e| rejected(&e.to_string()))?;

        let authorized = state.cameras.values().any(|c| {
            c.authorized
                && c.wallet
                    .as_deref()
                    .is_some_and(|w| address_matches(w, &signer))
        });
        if !authorized {
            return Err(rejected("invalid signature"));
        }

        state.notarized.insert(record.digest);
        state.accepted.push(record.clone());
        *state.counters.entry(self.submitter).or_insert(0) += 1;
        Ok(())
    }
}

/// In-memory content store.
#[derive(Default)]
pub struct MemoryContentStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    down: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub async fn get(&self, cid: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(cid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn add(&self, name: &str, bytes: Vec<u8>) -> Result<StorageLocator> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::TransportFailed {
                call: "ipfs add",
                reason: "connection refused".to_string(),
            });
        }
        let file_hash = hex::encode(Sha256::digest(&bytes));
        let mut dir = Sha256::new();
        dir.update(name.as_bytes());
        dir.update(file_hash.as_bytes());
        let locator = StorageLocator {
            cid: format!("mem{}", &file_hash[..40]),
            dir_cid: format!("memdir{}", &hex::encode(dir.finalize())[..40]),
            name: name.to_string(),
        };
        self.objects.write().await.insert(locator.cid.clone(), bytes);
        Ok(locator)
    }
}
