//! Inter-frame processor stage, grounded on
//! `original_source/.../videoproc/processors/interframe.hpp`.
//!
//! Unlike [`crate::stages::frame_processor::FrameProcessorStage`], this
//! stage's script needs two consecutive frames (e.g. `diff(prev, cur)`), so
//! it must hold back one frame as "previous" before it can emit anything.
//! The very first data frame in a stream has no predecessor — the original
//! handles this by carrying the first frame through unscripted; this port
//! does the same rather than inventing a synthetic predecessor image.

use std::collections::HashMap;
use std::sync::Arc;

use tilework_core::error::{Error, Result};
use tilework_core::image::Image;
use tilework_engine::prelude::ImageProcessor;
use tilework_pool::CancellationToken;
use tilework_script::prelude::Literal;

use crate::frame::Frame;
use crate::fsm::{StageFsm, StageState};
use crate::packet::Packet;
use crate::stage::{Stage, StageCallbacks};
use crate::stage_data_handler::StageDataHandler;

/// Applies a two-input script between each data frame and the one before it.
pub struct InterFrameProcessorStage {
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
    previous: Option<Image>,
}

impl InterFrameProcessorStage {
    /// Builds an inter-frame processor running the two-input script
    /// identified by `compile_id`.
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
            previous: None,
        }
    }

    fn callbacks_mut(&mut self) -> Result<&mut StageCallbacks> {
        self.callbacks
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("stage '{}': used before init", self.name)))
    }

    fn run_script(&mut self, frame: Frame) -> Result<Frame> {
        if frame.is_flush() {
            self.previous = None;
            return Ok(frame);
        }
        let number = frame.number();
        let image = frame
            .into_image()
            .ok_or_else(|| Error::Internal(format!("stage '{}': data frame with no image", self.name)))?;

        let out_image = match self.previous.take() {
            Some(prev) => {
                let item = self
                    .processor
                    .evaluate_two(self.compile_id, prev, image.clone(), &self.cancel)?;
                item.as_image()?.clone()
            }
            None => image.clone(),
        };
        self.previous = Some(image);
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

impl Stage for InterFrameProcessorStage {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_pool::WorkerPool;

    fn noop_callbacks() -> StageCallbacks {
        StageCallbacks {
            initialized: Box::new(|_| {}),
            parameters: Box::new(|_, _| {}),
            deliver: Box::new(|_, _| {}),
            next: Box::new(|_, _| {}),
            finished: Box::new(|_| {}),
            failed: Box::new(|_, _| {}),
            update: Box::new(|_, _| {}),
        }
    }

    #[test]
    fn first_frame_passes_through_unscripted() {
        let processor = Arc::new(ImageProcessor::new(WorkerPool::new(1).unwrap()));
        let compile_id = processor
            .compile(r#"var a = input("gray", 8); var b = input("gray", 8); var d = diff(a, b)"#)
            .unwrap();
        let mut stage = InterFrameProcessorStage::new(
            "interframe",
            processor,
            compile_id,
            4,
            4,
            CancellationToken::new(),
        );
        let delivered = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let delivered_clone = delivered.clone();
        let mut callbacks = noop_callbacks();
        callbacks.deliver = Box::new(move |_, packet| delivered_clone.borrow_mut().push(packet));
        stage.init(1, HashMap::new(), callbacks).unwrap();
        stage.start(1).unwrap();
        stage.next(1, 4).unwrap();

        let mut packet = Packet::new(0);
        packet.add_frame(Frame::new(0, Image::new(2, 2, 1).unwrap()));
        stage.process(1, packet).unwrap();

        let packets = delivered.borrow();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].frames()[0].number(), 0);
    }

    #[test]
    fn flush_resets_the_previous_frame() {
        let processor = Arc::new(ImageProcessor::new(WorkerPool::new(1).unwrap()));
        let compile_id = processor
            .compile(r#"var a = input("gray", 8); var b = input("gray", 8); var d = diff(a, b)"#)
            .unwrap();
        let mut stage = InterFrameProcessorStage::new(
            "interframe",
            processor,
            compile_id,
            4,
            4,
            CancellationToken::new(),
        );
        stage.init(1, HashMap::new(), noop_callbacks()).unwrap();
        stage.start(1).unwrap();
        stage.next(1, 16).unwrap();

        let mut p0 = Packet::new(0);
        p0.add_frame(Frame::new(0, Image::new(2, 2, 1).unwrap()));
        stage.process(1, p0).unwrap();
        assert!(stage.previous.is_some());

        let mut p1 = Packet::new(1);
        p1.add_frame(Frame::flush(1));
        stage.process(1, p1).unwrap();
        assert!(stage.previous.is_none());
    }
}
