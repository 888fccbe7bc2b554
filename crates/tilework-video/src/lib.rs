//! Scripted video pipeline: frames, packets, per-stage reorder buffers, and
//! the four-stage ring that runs a compiled expression over every frame of
//! a stream (spec.md §4.8–§4.12).
//!
//! Grounded throughout on `original_source/.../libcvpg/videoproc/`, with the
//! same substitutions documented module-by-module: `Box<dyn Stage>` in place
//! of Boost.TypeErasure's `any_stage`, a plain `match`-based FSM in place of
//! Boost.MSM, and explicit return values in place of
//! [`stage_data_handler::StageDataHandler`]'s stored callbacks. See
//! `DESIGN.md` for the full grounding ledger.

pub mod frame;
pub mod fsm;
pub mod io;
pub mod packet;
pub mod pipeline;
pub mod png_sequence;
pub mod stage;
pub mod stage_data_handler;
pub mod stages;

/// Re-exports of this crate's public surface.
pub mod prelude {
    pub use crate::frame::Frame;
    pub use crate::fsm::{StageEvent, StageFsm, StageState};
    pub use crate::io::{FrameSink, FrameSource, SourceFrame};
    pub use crate::packet::Packet;
    pub use crate::pipeline::Pipeline;
    pub use crate::png_sequence::{PngSequenceSink, PngSequenceSource};
    pub use crate::stage::{Stage, StageCallbacks, UpdateIndicator};
    pub use crate::stage_data_handler::{AddOutcome, FlushOutcome, Numbered, StageDataHandler};
    pub use crate::stages::{FrameProcessorStage, InterFrameProcessorStage, SinkStage, SourceStage};
}
