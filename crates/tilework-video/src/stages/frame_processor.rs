//! Per-frame processor stage, grounded on
//! `original_source/.../videoproc/processors/frame.hpp`.
//!
//! Runs a single-input compiled script against each data frame's image via
//! [`ImageProcessor::evaluate_convert_if`] — the "convert back to the
//! caller's image kind" variant, since a video frame's channel count must
//! stay stable across the stream regardless of what the script's last
//! expression produced. Flush frames pass straight through without ever
//! reaching the script engine.

use std::collections::HashMap;
use std::sync::Arc;

use tilework_core::error::{Error, Result};
use tilework_engine::prelude::ImageProcessor;
use tilework_pool::CancellationToken;
use tilework_script::prelude::Literal;

use crate::frame::Frame;
use crate::fsm::{StageFsm, StageState};
use crate::packet::Packet;
use crate::stage::{Stage, StageCallbacks};
use crate::stage_data_handler::StageDataHandler;

/// Applies a single-input script to every data frame in a packet.
pub struct FrameProcessorStage {
    name: String,
    processor: Arc<ImageProcessor>,
    compile_id: u64,
    max_frames_per_packet: usize,
    fsm: StageFsm,
    callbacks: Option<StageCallbacks>,
    handler: StageDataHandler<Frame>,
    packet_counter: u64,
    downstream_credit: usize,
    cancel: CancellationToken,
}

impl FrameProcessorStage {
    /// Builds a frame processor running the script identified by
    /// `compile_id` on `processor`'s worker pool.
    pub fn new(
        name: impl Into<String>,
        processor: Arc<ImageProcessor>,
        compile_id: u64,
        buffered_frames: usize,
        max_frames_per_packet: usize,
        cancel: CancellationToken,
    ) -> Self {
        let name = name.into();
        Self {
            fsm: StageFsm::new(name.clone()),
            handler: StageDataHandler::new(name.clone(), buffered_frames),
            name,
            processor,
            compile_id,
            max_frames_per_packet: max_frames_per_packet.max(1),
            callbacks: None,
            packet_counter: 0,
            downstream_credit: 0,
            cancel,
        }
    }

    fn callbacks_mut(&mut self) -> Result<&mut StageCallbacks> {
        self.callbacks
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("stage '{}': used before init", self.name)))
    }

    fn run_script(&self, frame: Frame) -> Result<Frame> {
        if frame.is_flush() {
            return Ok(frame);
        }
        let number = frame.number();
        let image = frame
            .into_image()
            .ok_or_else(|| Error::Internal(format!("stage '{}': data frame with no image", self.name)))?;
        let item = self.processor.evaluate_convert_if(self.compile_id, image, &self.cancel)?;
        let out_image = item.as_image()?.clone();
        Ok(Frame::new(number, out_image))
    }

    fn admit(&mut self, context_id: u64, packet: Packet) -> Result<()> {
        let mut processed = Vec::with_capacity(packet.frames().len());
        for frame in packet.into_frames() {
            processed.push(self.run_script(frame)?);
        }
        let outcome = self.handler.add_many(processed, self.downstream_credit);
        if outcome.buffer_full {
            tracing::warn!(stage = %self.name, "input buffer exceeded configured capacity");
        }
        if let Some(batch) = outcome.flush.delivered {
            self.deliver_batches(context_id, batch)?;
        }
        if outcome.flush.trigger_new_data {
            (self.callbacks_mut()?.next)(context_id, self.handler.free());
        }
        Ok(())
    }

    fn deliver_batches(&mut self, context_id: u64, frames: Vec<Frame>) -> Result<()> {
        for chunk in frames.chunks(self.max_frames_per_packet) {
            let mut packet = Packet::new(self.packet_counter);
            self.packet_counter += 1;
            for frame in chunk {
                packet.add_frame(frame.clone());
            }
            (self.callbacks_mut()?.deliver)(context_id, packet);
        }
        Ok(())
    }
}

impl Stage for FrameProcessorStage {
    fn init(&mut self, context_id: u64, _params: HashMap<String, Literal>, callbacks: StageCallbacks) -> Result<()> {
        self.callbacks = Some(callbacks);
        self.fsm.process(crate::fsm::StageEvent::InitializeDone)?;
        (self.callbacks_mut()?.initialized)(context_id);
        Ok(())
    }

    fn params(&mut self, context_id: u64, params: HashMap<String, Literal>) -> Result<()> {
        (self.callbacks_mut()?.parameters)(context_id, params);
        Ok(())
    }

    fn start(&mut self, _context_id: u64) -> Result<()> {
        if self.fsm.state() != StageState::WaitingForData {
            return Err(Error::Internal(format!("stage '{}': start before init", self.name)));
        }
        Ok(())
    }

    fn process(&mut self, context_id: u64, packet: Packet) -> Result<()> {
        if self.fsm.state() != StageState::WaitingForData {
            return Err(Error::Internal(format!("stage '{}': process before init", self.name)));
        }
        self.fsm.run_processing(|| Ok(()))?;
        self.admit(context_id, packet)
    }

    fn next(&mut self, context_id: u64, credit: usize) -> Result<()> {
        self.downstream_credit = credit;
        let outcome = self.handler.try_flush(credit);
        if let Some(batch) = outcome.delivered {
            self.deliver_batches(context_id, batch)?;
        }
        if outcome.trigger_new_data {
            (self.callbacks_mut()?.next)(context_id, self.handler.free());
        }
        Ok(())
    }

    fn finish(&mut self, context_id: u64) -> Result<()> {
        (self.callbacks_mut()?.finished)(context_id);
        Ok(())
    }
}
