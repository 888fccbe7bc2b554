//! The seam between a compiled plan and whatever owns the actual item
//! storage at evaluation time.
//!
//! `tilework-engine`'s `Context` (C7) is the real implementation, but
//! `tilework-script` can't depend on `tilework-engine` (the dependency runs
//! the other way — `tilework-engine` depends on `tilework-script` to get a
//! `CompiledPlan`). [`ItemStore`] is the trait that breaks the cycle: this
//! crate only needs to read and write tagged items by id, not anything else
//! a processing context does.

use std::time::Duration;

use tilework_core::error::Result;
use tilework_pool::{CancellationToken, WorkerPool};

use crate::item::{Item, Literal};

/// Whatever a compiled plan's leaf handlers need to read and write items
/// against during evaluation.
pub trait ItemStore: Send + Sync {
    /// Loads the item stored under `id`, or `Item::Invalid` if nothing has
    /// been stored there yet.
    fn load(&self, id: u32) -> Item;

    /// Stores `item` under `id` together with how long it took to produce,
    /// and marks `id` as the most recently stored item.
    fn store(&self, id: u32, item: Item, duration: Duration);

    /// Reads a global parameter set before evaluation (e.g. `cutoff_x`).
    fn parameter(&self, key: &str) -> Option<Literal>;
}

/// A leaf's compiled behavior: read its predecessors' items from the store,
/// run the kernel, write the result back under its own id.
pub type Handler =
    Box<dyn Fn(u32, &dyn ItemStore, &WorkerPool, &CancellationToken) -> Result<()> + Send + Sync>;
