//! Concrete [`crate::stage::Stage`] implementations: one per pipeline role
//! (spec.md §4.10).

pub mod frame_processor;
pub mod interframe;
pub mod sink;
pub mod source;

pub use frame_processor::FrameProcessorStage;
pub use interframe::InterFrameProcessorStage;
pub use sink::SinkStage;
pub use source::SourceStage;
