//! Service layer: selection, key resolution, signing and the operation
//! surface built on top of a [`CertStoreBackend`](crate::adapters::backend::CertStoreBackend).

pub mod digest;
pub mod key_resolver;
pub mod operations;
pub mod selector;
pub mod session;
pub mod signer;

pub use digest::{compute_digest, compute_digest_named};
pub use key_resolver::{acquire_key, KeyHandle};
pub use operations::{
    CertificateOperations, MethodCall, MethodResponse, OperationOptions, ResponseValue,
    SignDataArguments,
};
pub use selector::{export_selected, open_store, select_certificate, subject_name};
pub use selector::{ExportedIdentity, Identity};
pub use session::SigningSession;
pub use signer::{platform_digest, sign};
