//! Source stage, grounded on `original_source/.../videoproc/sources/file.hpp`.
//!
//! Decodes frames one at a time via a [`FrameSource`], paces them through a
//! [`StageDataHandler`] against downstream credit, and groups delivered
//! frames into packets of up to `max_frames_per_packet`. Since a
//! [`FrameSource`] already yields frames in order, the reorder buffer never
//! actually has to hold anything back here — it's kept anyway so pacing and
//! credit-capping logic isn't duplicated, and so a future out-of-order
//! source (e.g. a threaded decoder) can reuse this stage unchanged.

use std::collections::HashMap;

use tilework_core::error::{Error, Result};
use tilework_script::prelude::Literal;

use crate::frame::Frame;
use crate::fsm::{StageFsm, StageState};
use crate::io::{FrameSource, SourceFrame};
use crate::packet::Packet;
use crate::stage::{Stage, StageCallbacks};
use crate::stage_data_handler::StageDataHandler;

/// Reads frames from a [`FrameSource`] and delivers them downstream as packets.
pub struct SourceStage<S> {
    name: String,
    source: S,
    max_frames_per_packet: usize,
    fsm: StageFsm,
    callbacks: Option<StageCallbacks>,
    handler: Option<StageDataHandler<Frame>>,
    frame_counter: u64,
    packet_counter: u64,
    downstream_credit: usize,
}

impl<S: FrameSource> SourceStage<S> {
    /// Builds a source stage reading from `source`, buffering up to
    /// `buffered_frames` in-flight frames and packaging deliveries into
    /// batches of at most `max_frames_per_packet`.
    pub fn new(name: impl Into<String>, source: S, buffered_frames: usize, max_frames_per_packet: usize) -> Self {
        let name = name.into();
        Self {
            fsm: StageFsm::new(name.clone()),
            handler: Some(StageDataHandler::new(name.clone(), buffered_frames)),
            name,
            source,
            max_frames_per_packet: max_frames_per_packet.max(1),
            callbacks: None,
            frame_counter: 0,
            packet_counter: 0,
            downstream_credit: 0,
        }
    }

    fn callbacks_mut(&mut self) -> Result<&mut StageCallbacks> {
        self.callbacks
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("stage '{}': used before init", self.name)))
    }

    fn pump(&mut self, context_id: u64) -> Result<()> {
        loop {
            let handler = self
                .handler
                .as_mut()
                .ok_or_else(|| Error::Internal(format!("stage '{}': missing data handler", self.name)))?;
            if handler.full() {
                break;
            }
            let next = self.source.read()?;
            let frame = match next {
                SourceFrame::Data(image) => {
                    let f = Frame::new(self.frame_counter, image);
                    self.frame_counter += 1;
                    f
                }
                SourceFrame::Flush => {
                    let f = Frame::flush(self.frame_counter);
                    self.frame_counter += 1;
                    f
                }
            };
            let is_flush = frame.is_flush();
            let outcome = handler.add(frame, self.downstream_credit);
            if let Some(batch) = outcome.flush.delivered {
                self.deliver_batches(context_id, batch)?;
            }
            if outcome.buffer_full {
                tracing::warn!(stage = %self.name, "input buffer exceeded configured capacity");
            }
            if is_flush {
                break;
            }
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

impl<S: FrameSource> Stage for SourceStage<S> {
    fn init(&mut self, context_id: u64, _params: HashMap<String, Literal>, callbacks: StageCallbacks) -> Result<()> {
        self.callbacks = Some(callbacks);
        self.fsm.process(crate::fsm::StageEvent::InitializeDone)?;
        (self.callbacks_mut()?.initialized)(context_id);
        Ok(())
    }

    fn params(&mut self, _context_id: u64, _params: HashMap<String, Literal>) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, context_id: u64) -> Result<()> {
        if self.fsm.state() != StageState::WaitingForData {
            return Err(Error::Internal(format!("stage '{}': start before init", self.name)));
        }
        // Reading only happens once downstream credit arrives via `next`;
        // `start` just marks the stage ready to receive it.
        let _ = context_id;
        Ok(())
    }

    fn process(&mut self, _context_id: u64, _packet: Packet) -> Result<()> {
        Err(Error::Internal(format!(
            "stage '{}': a source stage never receives upstream packets",
            self.name
        )))
    }

    fn next(&mut self, context_id: u64, credit: usize) -> Result<()> {
        if self.fsm.state() != StageState::WaitingForData {
            return Err(Error::Internal(format!("stage '{}': next before init", self.name)));
        }
        self.downstream_credit = credit;
        let name = self.name.clone();
        self.fsm
            .run_processing(|| Ok(()))
            .map_err(|_| Error::Internal(format!("stage '{name}': fsm transition failed")))?;
        self.pump(context_id)
    }

    fn finish(&mut self, context_id: u64) -> Result<()> {
        (self.callbacks_mut()?.finished)(context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    struct FixedSource {
        remaining: Vec<Image>,
    }

    impl FrameSource for FixedSource {
        fn read(&mut self) -> Result<SourceFrame> {
            if self.remaining.is_empty() {
                Ok(SourceFrame::Flush)
            } else {
                Ok(SourceFrame::Data(self.remaining.remove(0)))
            }
        }
    }

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
    fn delivers_batches_up_to_packet_size() {
        let images = vec![
            Image::new(1, 1, 1).unwrap(),
            Image::new(1, 1, 1).unwrap(),
            Image::new(1, 1, 1).unwrap(),
        ];
        let delivered = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let delivered_clone = delivered.clone();

        let mut stage = SourceStage::new("source", FixedSource { remaining: images }, 16, 2);
        let mut callbacks = noop_callbacks();
        callbacks.deliver = Box::new(move |_, packet| delivered_clone.borrow_mut().push(packet));
        stage.init(1, HashMap::new(), callbacks).unwrap();
        stage.next(1, 16).unwrap();
        stage.start(1).unwrap();

        let packets = delivered.borrow();
        assert!(!packets.is_empty());
        let total_frames: usize = packets.iter().map(|p| p.frames().len()).sum();
        assert_eq!(total_frames, 4); // 3 data frames + 1 flush frame
    }

    #[test]
    fn process_on_a_source_is_rejected() {
        let mut stage = SourceStage::new("source", FixedSource { remaining: vec![] }, 16, 2);
        stage.init(1, HashMap::new(), noop_callbacks()).unwrap();
        let err = stage.process(1, Packet::new(0)).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
