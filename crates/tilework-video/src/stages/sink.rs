//! Terminal sink stage, grounded on `original_source/.../videoproc/sinks/file.hpp`.
//!
//! The sink is the one stage with no downstream `next`/`deliver` to wire —
//! it's the end of the ring. It advertises its own write-buffer capacity as
//! credit the moment it starts, and keeps re-advertising it as frames are
//! written and the buffer drains, which is what keeps the whole pipeline
//! moving (every other stage's credit ultimately derives from this one).
//!
//! Frames arrive already in order (every upstream stage's own
//! [`crate::stage_data_handler::StageDataHandler`] guarantees that), so the
//! sink writes them straight through without a reorder buffer of its own.

use std::collections::HashMap;

use tilework_core::error::{Error, Result};
use tilework_script::prelude::Literal;

use crate::fsm::{StageFsm, StageState};
use crate::io::FrameSink;
use crate::packet::Packet;
use crate::stage::{Stage, StageCallbacks};

/// Writes every data frame it receives to a [`FrameSink`], in arrival order.
pub struct SinkStage<K> {
    name: String,
    sink: K,
    max_write_buffer: usize,
    fsm: StageFsm,
    callbacks: Option<StageCallbacks>,
    in_flight: usize,
}

impl<K: FrameSink> SinkStage<K> {
    /// Builds a sink stage writing to `sink`, advertising up to
    /// `max_write_buffer` units of credit at a time.
    pub fn new(name: impl Into<String>, sink: K, max_write_buffer: usize) -> Self {
        let name = name.into();
        Self {
            fsm: StageFsm::new(name.clone()),
            name,
            sink,
            max_write_buffer: max_write_buffer.max(1),
            callbacks: None,
            in_flight: 0,
        }
    }

    fn callbacks_mut(&mut self) -> Result<&mut StageCallbacks> {
        self.callbacks
            .as_mut()
            .ok_or_else(|| Error::Internal(format!("stage '{}': used before init", self.name)))
    }

    fn advertise_credit(&mut self, context_id: u64) -> Result<()> {
        let credit = self.max_write_buffer.saturating_sub(self.in_flight);
        (self.callbacks_mut()?.next)(context_id, credit);
        Ok(())
    }
}

impl<K: FrameSink> Stage for SinkStage<K> {
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
        self.advertise_credit(context_id)
    }

    fn process(&mut self, context_id: u64, packet: Packet) -> Result<()> {
        if self.fsm.state() != StageState::WaitingForData {
            return Err(Error::Internal(format!("stage '{}': process before init", self.name)));
        }
        let name = self.name.clone();
        let sink = &mut self.sink;
        let mut saw_flush = false;
        let write_result = self.fsm.run_processing(|| {
            for frame in packet.frames() {
                if frame.is_flush() {
                    saw_flush = true;
                    continue;
                }
                let image = frame
                    .image()
                    .ok_or_else(|| Error::Internal(format!("stage '{name}': data frame with no image")))?;
                sink.write(image)?;
            }
            Ok(())
        });
        write_result?;

        self.in_flight = self.in_flight.saturating_sub(packet.frames().len());
        if saw_flush {
            self.sink.finish()?;
            (self.callbacks_mut()?.finished)(context_id);
        } else {
            self.advertise_credit(context_id)?;
        }
        Ok(())
    }

    fn next(&mut self, _context_id: u64, _credit: usize) -> Result<()> {
        Err(Error::Internal(format!(
            "stage '{}': a sink stage has no upstream credit request to honor",
            self.name
        )))
    }

    fn finish(&mut self, context_id: u64) -> Result<()> {
        self.sink.finish()?;
        (self.callbacks_mut()?.finished)(context_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilework_core::image::Image;

    use crate::frame::Frame;

    struct RecordingSink {
        written: Vec<Image>,
        finished: bool,
    }

    impl FrameSink for RecordingSink {
        fn write(&mut self, image: &Image) -> Result<()> {
            self.written.push(image.clone());
            Ok(())
        }
        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
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
    fn writes_frames_in_arrival_order_and_finishes_on_flush() {
        let sink = RecordingSink {
            written: Vec::new(),
            finished: false,
        };
        let mut stage = SinkStage::new("sink", sink, 4);
        let finished = std::rc::Rc::new(std::cell::RefCell::new(false));
        let finished_clone = finished.clone();
        let mut callbacks = noop_callbacks();
        callbacks.finished = Box::new(move |_| *finished_clone.borrow_mut() = true);
        stage.init(1, HashMap::new(), callbacks).unwrap();
        stage.start(1).unwrap();

        let mut p0 = Packet::new(0);
        p0.add_frame(Frame::new(0, Image::new(1, 1, 1).unwrap()));
        p0.add_frame(Frame::new(1, Image::new(1, 1, 1).unwrap()));
        stage.process(1, p0).unwrap();
        assert_eq!(stage.sink.written.len(), 2);
        assert!(!*finished.borrow());

        let mut p1 = Packet::new(1);
        p1.add_frame(Frame::flush(2));
        stage.process(1, p1).unwrap();
        assert!(stage.sink.finished);
        assert!(*finished.borrow());
    }

    #[test]
    fn next_on_a_sink_is_rejected() {
        let sink = RecordingSink {
            written: Vec::new(),
            finished: false,
        };
        let mut stage = SinkStage::new("sink", sink, 4);
        stage.init(1, HashMap::new(), noop_callbacks()).unwrap();
        let err = stage.next(1, 4).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
