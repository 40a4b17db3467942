//! # Collection Store
//!
//! An in-process ordered collection that publishes an immutable snapshot to
//! its subscribers on every change, plus a remote-backed variant whose
//! mutations are acknowledged by a backend before anyone sees them.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: immutable, versioned views of the collection
//! - **Subscriptions**: scoped handles receiving every later snapshot in order
//! - **Bindings**: presentation-side state replaced wholesale on each delivery
//! - **Backends**: in-memory, single-file or REST storage behind a `RemoteStore`
//!
//! ## Example
//!
//! ```ignore
//! use collection_store::{Binding, CollectionStore, Post};
//!
//! let store = CollectionStore::new();
//! let mut view = Binding::attach(&store);
//!
//! store.add(Post::new("First post", "Hello"));
//! view.sync();
//! assert_eq!(view.current().len(), 1);
//!
//! // Releasing twice is fine; dropping releases too
//! view.release();
//! assert_eq!(store.subscription_count(), 0);
//! ```

pub mod binding;
pub mod error;
pub mod remote;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use binding::Binding;
pub use error::{Result, StoreError};
pub use remote::{
    CollectionBackend, FileBackend, FileBackendConfig, HttpBackend, HttpBackendConfig,
    MemoryBackend, RemoteStore,
};
pub use store::{CollectionStore, StoreConfig};
pub use subscriptions::{
    CollectionEvent, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
pub use types::*;
