//! Per-stage reorder + bounded buffer, grounded on
//! `original_source/.../videoproc/stage_data_handler.cpp`.
//!
//! The original stores four callbacks (`trigger_new_data`,
//! `get_deliver_amount`, `deliver_data`, `buffer_full`) and invokes them as
//! side effects inside `try_flush`/`add`. Stored closures that call back
//! into the owning stage's other fields need `Rc<RefCell<_>>` wiring in
//! Rust for no real benefit here, since every call into this type already
//! happens on the stage's own (synchronous) turn — so this port turns the
//! callbacks into explicit return values instead: [`FlushOutcome`] tells the
//! caller what signals *would* have fired, and the caller (a concrete stage
//! in [`crate::stages`]) decides what to do with them. The admission,
//! reorder, and credit-capping logic itself is a direct port of
//! `try_process_input`/`flush_output`/`try_flush`, including the upstream
//! "trigger new data" call being skipped whenever `in_data` is empty — the
//! original disables that call with a `// TODO temporary disabled!` comment
//! and this port preserves that behavior rather than silently "fixing" it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Anything a [`StageDataHandler`] can restore delivery order for.
pub trait Numbered {
    /// This item's position in the stream.
    fn number(&self) -> u64;
}

/// What a [`StageDataHandler::add`]/[`StageDataHandler::try_flush`] call
/// would have triggered in the original's callback-based design.
#[derive(Debug)]
pub struct FlushOutcome<T> {
    /// `true` if the original would have called `trigger_new_data_callback`
    /// — the output buffer emptied out and downstream still has credit.
    pub trigger_new_data: bool,
    /// The batch to hand to `deliver_data_callback`, if any.
    pub delivered: Option<Vec<T>>,
}

/// `true` if `add`/`add_many` pushed past `max_stored_entries` — an
/// overflow warning, never a reason to reject the item (§9 Open Question:
/// buffer-full is informational only).
#[derive(Debug)]
pub struct AddOutcome<T> {
    /// Whether admitting this item exceeded the configured capacity.
    pub buffer_full: bool,
    /// The resulting flush attempt, exactly as `try_flush` would report it.
    pub flush: FlushOutcome<T>,
}

/// Bounded reorder buffer: accepts items in any order, delivers them
/// downstream in strictly increasing [`Numbered::number`] order, capped by
/// the credit the caller passes to each flush attempt.
pub struct StageDataHandler<T> {
    name: String,
    max_stored_entries: usize,
    in_data: BinaryHeap<Reverse<Entry<T>>>,
    out_data: Vec<T>,
    next_expected: u64,
}

struct Entry<T>(T);

impl<T: Numbered> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.number() == other.0.number()
    }
}
impl<T: Numbered> Eq for Entry<T> {}
impl<T: Numbered> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: Numbered> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.number().cmp(&other.0.number())
    }
}

impl<T: Numbered> StageDataHandler<T> {
    /// Builds an empty handler named `name` (used only for diagnostics),
    /// admitting up to `max_stored_entries` in-flight items before warning.
    pub fn new(name: impl Into<String>, max_stored_entries: usize) -> Self {
        Self {
            name: name.into(),
            max_stored_entries,
            in_data: BinaryHeap::new(),
            out_data: Vec::with_capacity(max_stored_entries),
            next_expected: 0,
        }
    }

    /// This handler's diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admits one item, then attempts delivery against `credit`.
    pub fn add(&mut self, item: T, credit: usize) -> AddOutcome<T> {
        let buffer_full = self.in_data.len() > self.max_stored_entries;
        self.in_data.push(Reverse(Entry(item)));
        AddOutcome {
            buffer_full,
            flush: self.try_flush(credit),
        }
    }

    /// Admits a batch of items, then attempts delivery against `credit`.
    pub fn add_many(&mut self, items: Vec<T>, credit: usize) -> AddOutcome<T> {
        let buffer_full = self.in_data.len() + items.len() > self.max_stored_entries;
        for item in items {
            self.in_data.push(Reverse(Entry(item)));
        }
        AddOutcome {
            buffer_full,
            flush: self.try_flush(credit),
        }
    }

    fn try_process_input(&mut self) {
        loop {
            match self.in_data.peek() {
                Some(Reverse(entry)) if entry.0.number() == self.next_expected => {
                    let Reverse(Entry(item)) = self.in_data.pop().expect("just peeked");
                    self.out_data.push(item);
                    self.next_expected += 1;
                }
                _ => break,
            }
        }
    }

    fn flush_output(&mut self, credit: usize) -> Option<Vec<T>> {
        if credit >= self.out_data.len() {
            if self.out_data.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.out_data))
            }
        } else if credit > 0 {
            Some(self.out_data.drain(..credit).collect())
        } else {
            None
        }
    }

    /// Re-runs the reorder/deliver step without admitting new data —
    /// used when only the downstream credit changed.
    pub fn try_flush(&mut self, credit: usize) -> FlushOutcome<T> {
        let mut trigger_new_data = false;
        if !self.in_data.is_empty() {
            self.try_process_input();
            if credit == 0 {
                return FlushOutcome {
                    trigger_new_data: false,
                    delivered: None,
                };
            }
            if self.out_data.is_empty() {
                trigger_new_data = true;
            }
        }
        let delivered = self.flush_output(credit);
        FlushOutcome {
            trigger_new_data,
            delivered,
        }
    }

    /// `true` if no items are currently held in the input heap.
    pub fn empty(&self) -> bool {
        self.in_data.is_empty()
    }

    /// `true` if the input heap has reached `max_stored_entries`.
    pub fn full(&self) -> bool {
        self.in_data.len() >= self.max_stored_entries
    }

    /// Remaining input capacity before the next `add` would overflow.
    pub fn free(&self) -> usize {
        if self.out_data.len() > 2 * self.max_stored_entries {
            0
        } else {
            self.max_stored_entries.saturating_sub(self.in_data.len())
        }
    }
}
