//! Wires four stages into the ring topology described in spec.md §4.11,
//! grounded on `original_source/.../videoproc/pipelines/file_to_file.hpp`.
//!
//! The original builds this wiring once per servant scheduler, each stage
//! living on its own Boost.Asynchronous thread and talking to its neighbors
//! through posted callbacks. This port keeps every stage a plain
//! synchronous object on one thread — there's no `Send` bound to satisfy
//! and no thread pool to stand up for four cooperating state machines that
//! only ever run one at a time anyway (see the module doc on
//! [`crate::stage`] and `DESIGN.md` for the full rationale); the
//! CPU-heavy work inside a frame still goes through the real multi-threaded
//! [`tilework_pool::WorkerPool`] via `ImageProcessor`.
//!
//! `deliver` hands a packet to the next stage's `process`; `next` asks the
//! previous stage for more credit; `finished` propagates forward; `init`
//! runs on all four stages before `start` runs on any, and `start` itself
//! runs in reverse — sink, inter-frame, frame, source — so that by the time
//! the source's `start` returns, every downstream stage has already
//! advertised how much it's willing to accept.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use tilework_core::error::Result;
use tilework_script::prelude::Literal;

use crate::stage::{Stage, StageCallbacks, UpdateIndicator};

type SharedStage = Rc<RefCell<Box<dyn Stage>>>;

/// A built four-stage pipeline, ready to `run`.
pub struct Pipeline {
    source: SharedStage,
    frame: SharedStage,
    interframe: SharedStage,
    sink: SharedStage,
}

impl Pipeline {
    /// Wires `source -> frame -> interframe -> sink` into a ring and calls
    /// `init` on all four. `on_failed`/`on_update` receive any per-context
    /// failure/progress report any stage raises; `on_finished` fires once
    /// the sink has flushed and reported end-of-stream.
    pub fn build(
        context_id: u64,
        params: HashMap<String, Literal>,
        source: Box<dyn Stage>,
        frame: Box<dyn Stage>,
        interframe: Box<dyn Stage>,
        sink: Box<dyn Stage>,
        mut on_finished: impl FnMut(u64) + 'static,
        mut on_failed: impl FnMut(u64, String) + 'static,
        mut on_update: impl FnMut(u64, UpdateIndicator) + 'static,
    ) -> Result<Self> {
        let source: SharedStage = Rc::new(RefCell::new(source));
        let frame: SharedStage = Rc::new(RefCell::new(frame));
        let interframe: SharedStage = Rc::new(RefCell::new(interframe));
        let sink: SharedStage = Rc::new(RefCell::new(sink));

        let on_failed: Rc<RefCell<dyn FnMut(u64, String)>> =
            Rc::new(RefCell::new(move |ctx, msg| on_failed(ctx, msg)));
        let on_update: Rc<RefCell<dyn FnMut(u64, UpdateIndicator)>> =
            Rc::new(RefCell::new(move |ctx, u| on_update(ctx, u)));
        let on_finished: Rc<RefCell<dyn FnMut(u64)>> = Rc::new(RefCell::new(move |ctx| on_finished(ctx)));

        source.borrow_mut().init(
            context_id,
            params.clone(),
            forwarding_callbacks(frame.clone(), None, &on_failed, &on_update),
        )?;
        frame.borrow_mut().init(
            context_id,
            params.clone(),
            forwarding_callbacks(interframe.clone(), Some(source.clone()), &on_failed, &on_update),
        )?;
        interframe.borrow_mut().init(
            context_id,
            params.clone(),
            forwarding_callbacks(sink.clone(), Some(frame.clone()), &on_failed, &on_update),
        )?;
        sink.borrow_mut().init(
            context_id,
            params,
            terminal_callbacks(interframe.clone(), on_finished, &on_failed, &on_update),
        )?;

        Ok(Self {
            source,
            frame,
            interframe,
            sink,
        })
    }

    /// Starts every stage, reverse of wiring order (sink first), so credit
    /// propagates all the way to the source before any packet is produced.
    pub fn start(&self, context_id: u64) -> Result<()> {
        self.sink.borrow_mut().start(context_id)?;
        self.interframe.borrow_mut().start(context_id)?;
        self.frame.borrow_mut().start(context_id)?;
        self.source.borrow_mut().start(context_id)?;
        Ok(())
    }
}

fn forwarding_callbacks(
    downstream: SharedStage,
    upstream: Option<SharedStage>,
    on_failed: &Rc<RefCell<dyn FnMut(u64, String)>>,
    on_update: &Rc<RefCell<dyn FnMut(u64, UpdateIndicator)>>,
) -> StageCallbacks {
    let deliver_target = downstream.clone();
    let params_target = downstream.clone();
    let finish_target = downstream;
    let next_target = upstream;
    let failed_cb = on_failed.clone();
    let update_cb = on_update.clone();

    StageCallbacks {
        initialized: Box::new(|_| {}),
        parameters: Box::new(move |ctx, params| {
            let _ = params_target.borrow_mut().params(ctx, params);
        }),
        deliver: Box::new(move |ctx, packet| {
            let _ = deliver_target.borrow_mut().process(ctx, packet);
        }),
        next: Box::new(move |ctx, credit| {
            if let Some(upstream) = &next_target {
                let _ = upstream.borrow_mut().next(ctx, credit);
            }
        }),
        finished: Box::new(move |ctx| {
            let _ = finish_target.borrow_mut().finish(ctx);
        }),
        failed: Box::new(move |ctx, msg| failed_cb.borrow_mut()(ctx, msg)),
        update: Box::new(move |ctx, update| update_cb.borrow_mut()(ctx, update)),
    }
}

fn terminal_callbacks(
    upstream: SharedStage,
    on_finished: Rc<RefCell<dyn FnMut(u64)>>,
    on_failed: &Rc<RefCell<dyn FnMut(u64, String)>>,
    on_update: &Rc<RefCell<dyn FnMut(u64, UpdateIndicator)>>,
) -> StageCallbacks {
    let next_target = upstream;
    let failed_cb = on_failed.clone();
    let update_cb = on_update.clone();

    StageCallbacks {
        initialized: Box::new(|_| {}),
        parameters: Box::new(|_, _| {}),
        deliver: Box::new(|_, _| {}),
        next: Box::new(move |ctx, credit| {
            let _ = next_target.borrow_mut().next(ctx, credit);
        }),
        finished: Box::new(move |ctx| on_finished.borrow_mut()(ctx)),
        failed: Box::new(move |ctx, msg| failed_cb.borrow_mut()(ctx, msg)),
        update: Box::new(move |ctx, update| update_cb.borrow_mut()(ctx, update)),
    }
}

/// Builds an [`UpdateIndicator`] stamped with the current time — the call
/// site every stage's `callbacks.update` invocation goes through.
pub fn now_update(context: impl Into<String>, processed: i64, failed: i64) -> UpdateIndicator {
    UpdateIndicator::new(context, processed, failed, Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    use tilework_core::image::Image;
    use tilework_engine::prelude::ImageProcessor;
    use tilework_pool::{CancellationToken, WorkerPool};

    use crate::io::{FrameSink, FrameSource, SourceFrame};
    use crate::stages::{FrameProcessorStage, InterFrameProcessorStage, SinkStage, SourceStage};

    struct VecSource {
        images: Vec<Image>,
    }
    impl FrameSource for VecSource {
        fn read(&mut self) -> Result<SourceFrame> {
            if self.images.is_empty() {
                Ok(SourceFrame::Flush)
            } else {
                Ok(SourceFrame::Data(self.images.remove(0)))
            }
        }
    }

    struct VecSink {
        written: StdRc<RefCell<Vec<Image>>>,
    }
    impl FrameSink for VecSink {
        fn write(&mut self, image: &Image) -> Result<()> {
            self.written.borrow_mut().push(image.clone());
            Ok(())
        }
        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn a_ring_of_four_stages_drains_to_the_sink() {
        let processor = std::sync::Arc::new(ImageProcessor::new(WorkerPool::new(1).unwrap()));
        let frame_compile = processor
            .compile(r#"var g = input("gray", 8); var t = otsu_threshold(histogram(g))"#)
            .unwrap();
        let interframe_compile = processor
            .compile(r#"var a = input("gray", 8); var b = input("gray", 8); var d = diff(a, b)"#)
            .unwrap();

        let images = vec![Image::new(2, 2, 1).unwrap(), Image::new(2, 2, 1).unwrap()];
        let written = StdRc::new(RefCell::new(Vec::new()));

        let source = Box::new(SourceStage::new("source", VecSource { images }, 8, 2));
        let frame = Box::new(FrameProcessorStage::new(
            "frame",
            processor.clone(),
            frame_compile,
            8,
            2,
            CancellationToken::new(),
        ));
        let interframe = Box::new(InterFrameProcessorStage::new(
            "interframe",
            processor,
            interframe_compile,
            8,
            2,
            CancellationToken::new(),
        ));
        let sink = Box::new(SinkStage::new(
            "sink",
            VecSink {
                written: written.clone(),
            },
            8,
        ));

        let finished = Rc::new(Cell::new(false));
        let finished_clone = finished.clone();

        let pipeline = Pipeline::build(
            1,
            HashMap::new(),
            source,
            frame,
            interframe,
            sink,
            move |_ctx| finished_clone.set(true),
            |_ctx, _msg| {},
            |_ctx, _update| {},
        )
        .unwrap();
        pipeline.start(1).unwrap();

        assert_eq!(written.borrow().len(), 2);
        assert!(finished.get());
    }
}
