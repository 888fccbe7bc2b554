//! The generic pipeline stage interface, grounded on
//! `original_source/.../videoproc/any_stage.hpp` and `stage_parameters.hpp`.
//!
//! The original erases four stage implementations (source, frame processor,
//! inter-frame processor, sink) behind Boost.TypeErasure's `any_stage` so
//! `pipelines::file_to_file` can hold them uniformly. A plain trait object
//! (`Box<dyn Stage>`) gives the identical "any type implementing these six
//! methods" polymorphism with none of the macro machinery — this is exactly
//! the kind of "Rust has a simpler native tool for what C++ needed a library
//! for" substitution this port favors throughout.

use std::collections::HashMap;
use std::time::Instant;

use tilework_core::error::Result;
use tilework_script::prelude::Literal;

use crate::packet::Packet;

/// A timestamped progress report for one context, grounded on
/// `update_indicator.hpp`.
#[derive(Debug, Clone)]
pub struct UpdateIndicator {
    context: String,
    processed: i64,
    failed: i64,
    timestamp: Instant,
}

impl UpdateIndicator {
    /// Builds an indicator stamped with `timestamp` (the caller's `Instant::now()`).
    pub fn new(context: impl Into<String>, processed: i64, failed: i64, timestamp: Instant) -> Self {
        Self {
            context: context.into(),
            processed,
            failed,
            timestamp,
        }
    }

    /// The diagnostic context name this update belongs to.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Items processed so far.
    pub fn processed(&self) -> i64 {
        self.processed
    }

    /// Items that failed so far.
    pub fn failed(&self) -> i64 {
        self.failed
    }

    /// When this update was produced.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// The callback bundle carried between adjacent stages (spec.md §4.10):
/// wiring one stage's `deliver`/`next` into the next/previous stage's
/// `process`/`next` is what [`crate::pipeline::Pipeline::build`] does.
pub struct StageCallbacks {
    /// `init` has finished; the stage is ready for `start`.
    pub initialized: Box<dyn FnMut(u64)>,
    /// Forward stage parameters (frame rate, resolution, frame count) downstream.
    pub parameters: Box<dyn FnMut(u64, HashMap<String, Literal>)>,
    /// Hand a packet to the next stage's `process`.
    pub deliver: Box<dyn FnMut(u64, Packet)>,
    /// Ask the previous stage for `credit` more items via its `next`.
    pub next: Box<dyn FnMut(u64, usize)>,
    /// Propagate end-of-stream forward.
    pub finished: Box<dyn FnMut(u64)>,
    /// Report a fatal per-context failure.
    pub failed: Box<dyn FnMut(u64, String)>,
    /// Report a progress update.
    pub update: Box<dyn FnMut(u64, UpdateIndicator)>,
}

/// A pipeline stage: source, frame processor, inter-frame processor, or
/// sink, all implementing the same six-method lifecycle (spec.md §4.10).
pub trait Stage {
    /// Allocates per-context state and wires `callbacks`; calls
    /// `callbacks.initialized` once ready.
    fn init(&mut self, context_id: u64, params: HashMap<String, Literal>, callbacks: StageCallbacks) -> Result<()>;

    /// Forwards stage-specific parameters from upstream.
    fn params(&mut self, context_id: u64, params: HashMap<String, Literal>) -> Result<()>;

    /// Begins processing for `context_id`.
    fn start(&mut self, context_id: u64) -> Result<()>;

    /// Accepts a packet from upstream (a no-op for a source stage).
    fn process(&mut self, context_id: u64, packet: Packet) -> Result<()>;

    /// The downstream stage can now accept `credit` more items.
    fn next(&mut self, context_id: u64, credit: usize) -> Result<()>;

    /// Upstream end-of-stream signal.
    fn finish(&mut self, context_id: u64) -> Result<()>;
}
