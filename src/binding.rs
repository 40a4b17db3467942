//! Presentation binding: keeps a render state in step with a store.

use crate::store::CollectionStore;
use crate::subscriptions::{CollectionEvent, SubscriptionHandle};
use crate::types::{Record, Snapshot};
use std::time::Duration;

type RenderFn<R> = Box<dyn FnMut(&Snapshot<R>) + Send>;

/// A presentation unit's view of a [`CollectionStore`].
///
/// Attaching subscribes exactly once and reads the current snapshot. Every
/// delivered snapshot replaces the render state wholesale. The subscription
/// is released on [`release`](Binding::release) or on drop, whichever comes
/// first.
pub struct Binding<R> {
    state: Snapshot<R>,
    handle: SubscriptionHandle<R>,
    on_update: Option<RenderFn<R>>,
    attached: bool,
}

impl<R: Record> Binding<R> {
    /// Subscribe and read the initial snapshot.
    pub fn attach(store: &CollectionStore<R>) -> Self {
        let (state, handle) = store.subscribe_current();
        Self {
            state,
            handle,
            on_update: None,
            attached: true,
        }
    }

    /// Install a render callback, run for every applied snapshot.
    pub fn on_update<F>(mut self, render: F) -> Self
    where
        F: FnMut(&Snapshot<R>) + Send + 'static,
    {
        self.on_update = Some(Box::new(render));
        self
    }

    /// Current render state.
    pub fn current(&self) -> &Snapshot<R> {
        &self.state
    }

    /// Whether the binding still receives updates.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Apply every pending delivery without blocking. Returns how many
    /// snapshots were applied.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        while self.attached {
            match self.handle.try_recv() {
                Ok(Some(event)) => {
                    if self.apply(event) {
                        applied += 1;
                    }
                }
                Ok(None) => break,
                Err(_) => self.detach(),
            }
        }
        applied
    }

    /// Block until the next delivery or the timeout. Returns true if a
    /// snapshot was applied.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if !self.attached {
            return false;
        }
        match self.handle.recv_timeout(timeout) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => false,
            Err(_) => {
                self.detach();
                false
            }
        }
    }

    /// Release the subscription. Calling it again is a no-op.
    pub fn release(&mut self) {
        self.detach();
    }

    fn apply(&mut self, event: CollectionEvent<R>) -> bool {
        match event {
            CollectionEvent::Snapshot(snapshot) => {
                self.state = snapshot;
                if let Some(render) = self.on_update.as_mut() {
                    render(&self.state);
                }
                true
            }
            CollectionEvent::Dropped { reason } => {
                tracing::warn!(subscription = self.handle.id.0, ?reason, "binding detached");
                self.detach();
                false
            }
        }
    }

    fn detach(&mut self) {
        self.attached = false;
        self.handle.release();
    }
}
