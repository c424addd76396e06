//! Session secrets, meeting key grants and store lifecycle.
//!
//! This crate ties the crypto and storage layers together:
//!
//! - [`SessionKeyCache`] holds each logged-in principal's unwrapped
//!   long-term secret for the life of the session, behind a pluggable
//!   backend.
//! - [`MeetingKeyRegistry`] wraps a meeting's data key once per authorized
//!   principal and unwraps it again using the caller's cached secret.
//! - [`MeetingStoreRegistry`] owns the table of live store handles:
//!   single-flight open, lazy creation, deletion, and startup
//!   reconciliation against the physical volume.
//!
//! All services here are explicitly constructed and injected — there are
//! no ambient singletons. Construct them once at startup and hand clones
//! (or `Arc`s) to request handlers.

mod catalog;
mod error;
mod grants;
mod registry;
mod session;

pub use catalog::{Catalog, MemoryCatalog};
pub use error::{VaultError, VaultResult};
pub use grants::MeetingKeyRegistry;
pub use registry::{MeetingStoreRegistry, ReconcileReport, SkippedStore};
pub use session::{MemorySecretCache, SecretCacheBackend, SessionKeyCache};
