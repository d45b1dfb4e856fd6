//! In-process certificate store backed by OpenSSL.
//!
//! Holds identities loaded from PKCS#12 bundles or PEM files and answers the
//! same primitive calls as the Windows store. It can present its keys as
//! either key family, including the legacy API's little-endian signature
//! output and store-owned key handles, so both signing paths run on any
//! host. Every handle it issues is tracked; [`SoftwareBackend::live_handles`]
//! and [`SoftwareBackend::stale_releases`] expose the ledger.

mod identity;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use openssl::pkey::{PKey, Private};

pub use identity::SoftwareIdentity;

use identity::{algorithm_group, ecdsa_p1363_sign, is_rsa, rsa_pkcs1_sign};

use crate::adapters::backend::{AcquiredKey, BackendType, CertStoreBackend, NativeError};
use crate::adapters::handle::{HandleKind, HandleReleaser, RawHandle};
use crate::domain::constants::{DEFAULT_STORE_NAME, KEY_SPEC_NCRYPT};
use crate::domain::crypto::{CertificateDer, HashAlgorithm};
use crate::domain::types::{KeyFamily, LegacySpec};
use crate::infra::error::{SignStep, SigningError, SigningResult};
use crate::services::digest::compute_digest;

/// Key family the store reports for its private keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEmulation {
    Modern,
    Legacy(LegacySpec),
    /// Reports an arbitrary key spec.
    RawSpec(u32),
}

impl KeyEmulation {
    fn key_spec(self) -> u32 {
        match self {
            KeyEmulation::Modern => KEY_SPEC_NCRYPT,
            KeyEmulation::Legacy(spec) => KeyFamily::Legacy(spec).key_spec(),
            KeyEmulation::RawSpec(spec) => spec,
        }
    }

    fn handle_kind(self) -> HandleKind {
        if self.key_spec() == KEY_SPEC_NCRYPT {
            HandleKind::ModernKey
        } else {
            HandleKind::LegacyProvider
        }
    }
}

/// Which identity the picker returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    First,
    /// First identity whose display name contains the text.
    SubjectContains(String),
    /// The user dismisses the picker.
    Cancel,
}

#[derive(Debug, Clone)]
struct SoftwareOptions {
    store_name: String,
    key_emulation: KeyEmulation,
    caller_owns_keys: bool,
    selection: SelectionPolicy,
    fail_at: Option<SignStep>,
}

impl Default for SoftwareOptions {
    fn default() -> Self {
        Self {
            store_name: DEFAULT_STORE_NAME.to_string(),
            key_emulation: KeyEmulation::Modern,
            caller_owns_keys: true,
            selection: SelectionPolicy::First,
            fail_at: None,
        }
    }
}

#[derive(Debug)]
enum Object {
    Store,
    Certificate {
        identity: usize,
        store: RawHandle,
    },
    Key {
        identity: usize,
        kind: HandleKind,
        /// Set when the key is cached by the store rather than owned by the caller.
        owner_store: Option<RawHandle>,
    },
    Hash {
        identity: usize,
        algorithm: HashAlgorithm,
        data: Vec<u8>,
    },
}

impl Object {
    fn kind(&self) -> HandleKind {
        match self {
            Object::Store => HandleKind::Store,
            Object::Certificate { .. } => HandleKind::Certificate,
            Object::Key { kind, .. } => *kind,
            Object::Hash { .. } => HandleKind::LegacyHash,
        }
    }
}

#[derive(Debug, Default)]
struct HandleTable {
    next: usize,
    live: HashMap<RawHandle, Object>,
    stale_releases: usize,
}

impl HandleTable {
    fn insert(&mut self, object: Object) -> RawHandle {
        self.next += 1;
        let handle = RawHandle::new(self.next);
        self.live.insert(handle, object);
        handle
    }
}

struct SoftwareState {
    identities: Vec<SoftwareIdentity>,
    options: SoftwareOptions,
    table: Mutex<HandleTable>,
}

impl SoftwareState {
    fn table(&self) -> MutexGuard<'_, HandleTable> {
        // The table stays consistent across a panicking holder.
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fails_at(&self, step: SignStep) -> bool {
        self.options.fail_at == Some(step)
    }
}

impl HandleReleaser for SoftwareState {
    fn release(&self, kind: HandleKind, handle: RawHandle) {
        let mut table = self.table();
        match table.live.remove(&handle) {
            Some(object) if object.kind() == kind => {
                if kind == HandleKind::Store {
                    table.live.retain(|_, o| {
                        !matches!(o, Object::Key { owner_store: Some(s), .. } if *s == handle)
                    });
                }
            }
            Some(object) => {
                log::warn!(
                    "Handle {handle} released as {kind:?} but is {:?}",
                    object.kind()
                );
                table.stale_releases += 1;
            }
            None => {
                log::warn!("Release of unknown or already released {kind:?} handle {handle}");
                table.stale_releases += 1;
            }
        }
    }
}

/// Software certificate store.
#[derive(Clone)]
pub struct SoftwareBackend {
    state: Arc<SoftwareState>,
}

impl SoftwareBackend {
    #[must_use]
    pub fn new(identities: Vec<SoftwareIdentity>) -> Self {
        Self::with_options(identities, SoftwareOptions::default())
    }

    fn with_options(identities: Vec<SoftwareIdentity>, options: SoftwareOptions) -> Self {
        Self {
            state: Arc::new(SoftwareState {
                identities,
                options,
                table: Mutex::new(HandleTable::default()),
            }),
        }
    }

    /// Store holding the single identity of a PKCS#12 file.
    pub fn from_pkcs12_file(path: &Path, password: &str) -> SigningResult<Self> {
        Ok(Self::new(vec![SoftwareIdentity::from_pkcs12_file(
            path, password,
        )?]))
    }

    fn rebuild(self, edit: impl FnOnce(&mut SoftwareOptions)) -> Self {
        let mut options = self.state.options.clone();
        edit(&mut options);
        Self::with_options(self.state.identities.clone(), options)
    }

    /// Name under which the store can be opened (default `"MY"`).
    #[must_use]
    pub fn with_store_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.rebuild(|o| o.store_name = name)
    }

    #[must_use]
    pub fn with_key_emulation(self, emulation: KeyEmulation) -> Self {
        self.rebuild(|o| o.key_emulation = emulation)
    }

    /// Whether acquired keys are handed to the caller (`true`) or stay
    /// cached by the store (`false`).
    #[must_use]
    pub fn with_caller_owned_keys(self, caller_owns: bool) -> Self {
        self.rebuild(|o| o.caller_owns_keys = caller_owns)
    }

    #[must_use]
    pub fn with_selection(self, policy: SelectionPolicy) -> Self {
        self.rebuild(|o| o.selection = policy)
    }

    /// Make the primitive behind `step` fail, to exercise error paths.
    #[must_use]
    pub fn with_failure_at(self, step: SignStep) -> Self {
        self.rebuild(|o| o.fail_at = Some(step))
    }

    /// Number of handles issued and not yet released.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.state.table().live.len()
    }

    #[must_use]
    pub fn live_handles_of(&self, kind: HandleKind) -> usize {
        self.state
            .table()
            .live
            .values()
            .filter(|o| o.kind() == kind)
            .count()
    }

    /// Releases of handles that were unknown, already released or of the
    /// wrong kind.
    #[must_use]
    pub fn stale_releases(&self) -> usize {
        self.state.table().stale_releases
    }

    fn identity(&self, index: usize) -> &SoftwareIdentity {
        &self.state.identities[index]
    }

    fn display_name_of(identity: &SoftwareIdentity) -> String {
        CertificateDer::from_der(identity.cert_der().to_vec())
            .subject_common_name()
            .or_else(|| identity.friendly_name().map(str::to_string))
            .unwrap_or_default()
    }

    fn certificate_identity(&self, cert: RawHandle) -> Result<(usize, RawHandle), NativeError> {
        match self.state.table().live.get(&cert) {
            Some(Object::Certificate { identity, store }) => Ok((*identity, *store)),
            _ => Err(NativeError::new("certificate context", "invalid handle")),
        }
    }

    fn key_identity(&self, key: RawHandle, kind: HandleKind) -> Result<usize, NativeError> {
        match self.state.table().live.get(&key) {
            Some(Object::Key {
                identity, kind: k, ..
            }) if *k == kind => Ok(*identity),
            _ => Err(NativeError::new("key handle", "NTE_INVALID_HANDLE")),
        }
    }

    fn private_key(&self, identity: usize) -> Result<&PKey<Private>, NativeError> {
        self.identity(identity)
            .key()
            .ok_or_else(|| NativeError::new("private key", "NTE_NO_KEY"))
    }

    fn step_failure(&self, step: SignStep, api: &'static str) -> Result<(), NativeError> {
        if self.state.fails_at(step) {
            return Err(NativeError::new(api, "injected failure"));
        }
        Ok(())
    }
}

fn check_buffer(api: &'static str, out: &Option<&mut [u8]>, needed: usize) -> Result<(), NativeError> {
    match out {
        Some(buf) if buf.len() < needed => Err(NativeError::new(api, "NTE_BUFFER_TOO_SMALL")),
        _ => Ok(()),
    }
}

impl CertStoreBackend for SoftwareBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }

    fn releaser(&self) -> Arc<dyn HandleReleaser> {
        self.state.clone()
    }

    fn open_store(&self, store_name: &str) -> Result<RawHandle, NativeError> {
        if !store_name.eq_ignore_ascii_case(&self.state.options.store_name) {
            return Err(NativeError::new(
                "CertOpenStore",
                format!("store '{store_name}' not found"),
            ));
        }
        Ok(self.state.table().insert(Object::Store))
    }

    fn select_certificate(&self, store: RawHandle) -> Result<Option<RawHandle>, NativeError> {
        if !matches!(self.state.table().live.get(&store), Some(Object::Store)) {
            return Err(NativeError::new(
                "CryptUIDlgSelectCertificateFromStore",
                "invalid store handle",
            ));
        }
        let chosen = match &self.state.options.selection {
            SelectionPolicy::Cancel => None,
            SelectionPolicy::First => (!self.state.identities.is_empty()).then_some(0),
            SelectionPolicy::SubjectContains(text) => self
                .state
                .identities
                .iter()
                .position(|id| Self::display_name_of(id).contains(text.as_str())),
        };
        Ok(chosen.map(|identity| {
            self.state
                .table()
                .insert(Object::Certificate { identity, store })
        }))
    }

    fn certificate_der(&self, cert: RawHandle) -> Result<Vec<u8>, NativeError> {
        let (identity, _) = self.certificate_identity(cert)?;
        Ok(self.identity(identity).cert_der().to_vec())
    }

    fn display_name(&self, cert: RawHandle) -> Result<String, NativeError> {
        let (identity, _) = self.certificate_identity(cert)?;
        Ok(Self::display_name_of(self.identity(identity)))
    }

    fn acquire_private_key(&self, cert: RawHandle) -> Result<AcquiredKey, NativeError> {
        const API: &str = "CryptAcquireCertificatePrivateKey";
        let (identity, store) = self.certificate_identity(cert)?;
        if !self.identity(identity).has_private_key() {
            return Err(NativeError::new(API, "CRYPT_E_NO_KEY_PROPERTY"));
        }
        let emulation = self.state.options.key_emulation;
        let kind = emulation.handle_kind();
        let caller_owns = self.state.options.caller_owns_keys;

        let mut table = self.state.table();
        let handle = if caller_owns {
            table.insert(Object::Key {
                identity,
                kind,
                owner_store: None,
            })
        } else {
            let cached = table.live.iter().find_map(|(h, o)| match o {
                Object::Key {
                    identity: i,
                    owner_store: Some(s),
                    ..
                } if *i == identity && *s == store => Some(*h),
                _ => None,
            });
            match cached {
                Some(h) => h,
                None => table.insert(Object::Key {
                    identity,
                    kind,
                    owner_store: Some(store),
                }),
            }
        };
        Ok(AcquiredKey {
            handle,
            key_spec: emulation.key_spec(),
            caller_owns,
        })
    }

    fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> SigningResult<Vec<u8>> {
        for step in [
            SignStep::OpenAlgorithmProvider,
            SignStep::QueryObjectLength,
            SignStep::QueryHashLength,
            SignStep::CreateHash,
            SignStep::HashData,
            SignStep::FinishHash,
        ] {
            if self.state.fails_at(step) {
                return Err(SigningError::at(step, "injected failure"));
            }
        }
        Ok(compute_digest(data, algorithm).as_slice().to_vec())
    }

    fn key_algorithm_group(&self, key: RawHandle) -> Result<String, NativeError> {
        const API: &str = "NCryptGetProperty";
        let identity = self.key_identity(key, HandleKind::ModernKey)?;
        self.step_failure(SignStep::QueryAlgorithmGroup, API)?;
        Ok(algorithm_group(self.private_key(identity)?).to_string())
    }

    fn modern_sign_hash(
        &self,
        key: RawHandle,
        padding: Option<HashAlgorithm>,
        digest: &[u8],
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError> {
        const API: &str = "NCryptSignHash";
        let identity = self.key_identity(key, HandleKind::ModernKey)?;
        let step = if signature.is_none() {
            SignStep::QuerySignatureLength
        } else {
            SignStep::SignHash
        };
        self.step_failure(step, API)?;
        let pkey = self.private_key(identity)?;

        if is_rsa(pkey) {
            let algorithm =
                padding.ok_or_else(|| NativeError::new(API, "NTE_INVALID_PARAMETER"))?;
            check_buffer(API, &signature, pkey.size())?;
            rsa_pkcs1_sign(pkey, algorithm, digest, signature)
                .map_err(|e| NativeError::new(API, e.to_string()))
        } else {
            let needed = ecdsa_p1363_sign(pkey, digest, None)
                .map_err(|e| NativeError::new(API, e.to_string()))?;
            check_buffer(API, &signature, needed)?;
            ecdsa_p1363_sign(pkey, digest, signature)
                .map_err(|e| NativeError::new(API, e.to_string()))
        }
    }

    fn legacy_create_hash(
        &self,
        provider: RawHandle,
        algorithm: HashAlgorithm,
    ) -> Result<RawHandle, NativeError> {
        let identity = self.key_identity(provider, HandleKind::LegacyProvider)?;
        self.step_failure(SignStep::CreateHash, "CryptCreateHash")?;
        Ok(self.state.table().insert(Object::Hash {
            identity,
            algorithm,
            data: Vec::new(),
        }))
    }

    fn legacy_hash_data(&self, hash: RawHandle, data: &[u8]) -> Result<(), NativeError> {
        const API: &str = "CryptHashData";
        self.step_failure(SignStep::HashData, API)?;
        match self.state.table().live.get_mut(&hash) {
            Some(Object::Hash { data: buffer, .. }) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            _ => Err(NativeError::new(API, "NTE_BAD_HASH")),
        }
    }

    fn legacy_sign_hash(
        &self,
        hash: RawHandle,
        _key_spec: u32,
        signature: Option<&mut [u8]>,
    ) -> Result<usize, NativeError> {
        const API: &str = "CryptSignHashW";
        let (identity, algorithm, data) = match self.state.table().live.get(&hash) {
            Some(Object::Hash {
                identity,
                algorithm,
                data,
            }) => (*identity, *algorithm, data.clone()),
            _ => return Err(NativeError::new(API, "NTE_BAD_HASH")),
        };
        let step = if signature.is_none() {
            SignStep::QuerySignatureLength
        } else {
            SignStep::SignHash
        };
        self.step_failure(step, API)?;
        let pkey = self.private_key(identity)?;
        if !is_rsa(pkey) {
            return Err(NativeError::new(API, "NTE_BAD_KEY"));
        }
        let Some(out) = signature else {
            return Ok(pkey.size());
        };
        if out.len() < pkey.size() {
            return Err(NativeError::new(API, "NTE_BUFFER_TOO_SMALL"));
        }

        let digest = compute_digest(&data, algorithm);
        let written = rsa_pkcs1_sign(pkey, algorithm, digest.as_slice(), Some(&mut *out))
            .map_err(|e| NativeError::new(API, e.to_string()))?;
        // CryptoAPI emits little-endian
        out[..written].reverse();
        Ok(written)
    }
}
