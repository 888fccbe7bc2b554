//! Per-evaluation item store, grounded on
//! `original_source/.../processing_context.cpp`.
//!
//! One `Context` is created per call to [`crate::processor::ImageProcessor`]'s
//! `evaluate*` methods and lives only for that evaluation: concurrent leaves
//! of the same plan always write distinct ids (the plan compiler guarantees
//! this), so the map only needs safe concurrent *insertion*, not anything
//! fancier. spec.md §5 calls either a lock-free map or a coarse lock
//! correct here; this uses a single `Mutex<HashMap>` rather than reaching
//! for `dashmap` — seeding one more dependency for a lock that's never
//! actually contended (writes are to disjoint keys, so critical sections
//! are microseconds) isn't worth it. See `DESIGN.md`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tilework_script::prelude::{Item, ItemStore, Literal};

struct Entry {
    item: Item,
    duration: Duration,
}

/// Per-evaluation state: items by id, their durations, and a read-only
/// parameter set (e.g. `cutoff_x`/`cutoff_y`) threaded in from
/// [`crate::processor::ImageProcessor`].
pub struct Context {
    id: u64,
    entries: Mutex<HashMap<u32, Entry>>,
    last_stored: Mutex<Option<u32>>,
    parameters: HashMap<String, Literal>,
}

impl Context {
    /// Creates an empty context for evaluation `id`, carrying `parameters`
    /// (a snapshot of the image processor's global parameter set).
    pub fn new(id: u64, parameters: HashMap<String, Literal>) -> Self {
        Self {
            id,
            entries: Mutex::new(HashMap::new()),
            last_stored: Mutex::new(None),
            parameters,
        }
    }

    /// This context's evaluation id (matches the owning `ImageProcessor` call).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Seeds `id` with an externally supplied value (e.g. the caller's input
    /// image) before the plan runs, with zero duration since nothing was computed.
    pub fn seed(&self, id: u32, item: Item) {
        self.store(id, item, Duration::ZERO);
    }

    /// The most recently stored item, or `Item::Invalid` if nothing has been
    /// stored yet.
    pub fn load_last(&self) -> Item {
        let last = *self.last_stored.lock().unwrap();
        match last {
            Some(id) => self.load(id),
            None => Item::Invalid,
        }
    }

    /// How long the item stored under `id` took to produce, if present.
    pub fn duration_of(&self, id: u32) -> Option<Duration> {
        self.entries.lock().unwrap().get(&id).map(|e| e.duration)
    }
}

impl ItemStore for Context {
    fn load(&self, id: u32) -> Item {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .map(|e| e.item.clone())
            .unwrap_or(Item::Invalid)
    }

    fn store(&self, id: u32, item: Item, duration: Duration) {
        self.entries.lock().unwrap().insert(id, Entry { item, duration });
        *self.last_stored.lock().unwrap() = Some(id);
    }

    fn parameter(&self, key: &str) -> Option<Literal> {
        self.parameters.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_of_unseen_id_is_invalid() {
        let ctx = Context::new(1, HashMap::new());
        assert!(matches!(ctx.load(42), Item::Invalid));
    }

    #[test]
    fn store_updates_last_stored() {
        let ctx = Context::new(1, HashMap::new());
        ctx.store(0, Item::Int(1), Duration::from_millis(1));
        ctx.store(1, Item::Int(2), Duration::from_millis(2));
        assert_eq!(ctx.load_last().as_int().unwrap(), 2);
    }

    #[test]
    fn parameters_are_readable_by_key() {
        let mut params = HashMap::new();
        params.insert("cutoff_x".to_string(), Literal::Int(256));
        let ctx = Context::new(1, params);
        assert_eq!(ctx.parameter("cutoff_x"), Some(Literal::Int(256)));
        assert_eq!(ctx.parameter("missing"), None);
    }
}
