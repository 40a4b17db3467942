//! Broadcast channel for live collection updates.
//!
//! Every successful mutation of a store produces one snapshot, delivered
//! to every registered subscriber in emission order. Subscriptions:
//! - start with the next mutation (no replay of the current state)
//! - have bounded buffers with slow-subscriber dropping
//! - are released by dropping or explicitly releasing the handle
//!
//! # Example
//!
//! ```ignore
//! let store = CollectionStore::<Post>::new();
//! let initial = store.list();
//! let handle = store.subscribe();
//!
//! loop {
//!     match handle.recv() {
//!         Ok(CollectionEvent::Snapshot(snapshot)) => render(&snapshot),
//!         Ok(CollectionEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    CollectionEvent, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};
