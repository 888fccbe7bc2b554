//! Facade owning the algorithm registry and the compiled-plan cache,
//! grounded on `original_source/.../image_processor.cpp`: compile once per
//! distinct script, evaluate many times against fresh per-call contexts.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use tilework_core::error::{Error, Result};
use tilework_core::image::Image;
use tilework_pool::{CancellationToken, WorkerPool};
use tilework_script::prelude::{AlgorithmRegistry, CompiledPlan, Item, ItemKind, Literal};

use crate::context::Context;

/// Orchestrates script compilation and evaluation against a shared worker pool.
pub struct ImageProcessor {
    registry: AlgorithmRegistry,
    pool: WorkerPool,
    cache: Mutex<HashMap<u64, Arc<CompiledPlan>>>,
    parameters: Mutex<HashMap<String, Literal>>,
}

impl ImageProcessor {
    /// Builds a processor backed by `pool`, with the built-in algorithm registry.
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            registry: AlgorithmRegistry::with_builtins(),
            pool,
            cache: Mutex::new(HashMap::new()),
            parameters: Mutex::new(HashMap::new()),
        }
    }

    /// Sets a global parameter (e.g. `cutoff_x`), visible to every
    /// evaluation's [`Context::parameter`] from this point on.
    pub fn add_parameter(&self, key: impl Into<String>, value: Literal) {
        self.parameters.lock().unwrap().insert(key.into(), value);
    }

    /// A snapshot of the current global parameter set.
    pub fn parameters(&self) -> HashMap<String, Literal> {
        self.parameters.lock().unwrap().clone()
    }

    /// Compiles `expression`, returning a `compile_id` that's stable for
    /// identical source strings (deduplicated by hash, not by re-parsing).
    ///
    /// A failing compile allocates nothing — the next call with the exact
    /// same source re-attempts parsing from scratch, matching S4's
    /// "compile fails, no `compile_id` allocated."
    pub fn compile(&self, expression: &str) -> Result<u64> {
        let compile_id = hash_source(expression);
        if self.cache.lock().unwrap().contains_key(&compile_id) {
            return Ok(compile_id);
        }
        let plan = CompiledPlan::compile(expression, &self.registry)?;
        self.cache.lock().unwrap().insert(compile_id, Arc::new(plan));
        Ok(compile_id)
    }

    fn plan_for(&self, compile_id: u64) -> Result<Arc<CompiledPlan>> {
        self.cache
            .lock()
            .unwrap()
            .get(&compile_id)
            .cloned()
            .ok_or_else(|| Error::invalid_parameter("image_processor", format!("unknown compile_id {compile_id}")))
    }

    /// Evaluates a single-input script against `image`, returning the item
    /// stored last.
    pub fn evaluate(&self, compile_id: u64, image: Image, cancel: &CancellationToken) -> Result<Item> {
        let plan = self.plan_for(compile_id)?;
        let input_ids = plan.input_ids();
        if input_ids.len() != 1 {
            return Err(Error::invalid_parameter(
                "image_processor",
                format!("evaluate expects a single-input script, found {}", input_ids.len()),
            ));
        }
        let ctx = Context::new(compile_id, self.parameters());
        ctx.seed(input_ids[0], image_item(image));
        plan.run(&ctx, &self.pool, cancel)?;
        Ok(ctx.load(plan.result_id()))
    }

    /// Evaluates a two-input script (e.g. `diff`, `mean`) against `image_a`/`image_b`.
    pub fn evaluate_two(
        &self,
        compile_id: u64,
        image_a: Image,
        image_b: Image,
        cancel: &CancellationToken,
    ) -> Result<Item> {
        let plan = self.plan_for(compile_id)?;
        let input_ids = plan.input_ids();
        if input_ids.len() != 2 {
            return Err(Error::invalid_parameter(
                "image_processor",
                format!("evaluate_two expects a two-input script, found {}", input_ids.len()),
            ));
        }
        let ctx = Context::new(compile_id, self.parameters());
        ctx.seed(input_ids[0], image_item(image_a));
        ctx.seed(input_ids[1], image_item(image_b));
        plan.run(&ctx, &self.pool, cancel)?;
        Ok(ctx.load(plan.result_id()))
    }

    /// Evaluates like [`Self::evaluate`], but if the result's image tag
    /// differs from `image`'s own tag, cheaply converts the result back to
    /// match — gray→rgb duplicates the channel pointer three times, rgb→gray
    /// applies the `use_red` strategy — so callers always get back the same
    /// kind of image they submitted.
    pub fn evaluate_convert_if(&self, compile_id: u64, image: Image, cancel: &CancellationToken) -> Result<Item> {
        let input_kind = if image.channel_count() == 3 {
            ItemKind::Rgb8
        } else {
            ItemKind::Gray8
        };
        let result = self.evaluate(compile_id, image, cancel)?;
        match (&result, input_kind) {
            (Item::Rgb8(img), ItemKind::Gray8) => Ok(Item::Gray8(reduce_to_gray(img)?)),
            (Item::Gray8(img), ItemKind::Rgb8) => Ok(Item::Rgb8(img.expand_gray_to_rgb()?)),
            _ => Ok(result),
        }
    }
}

fn image_item(image: Image) -> Item {
    if image.channel_count() == 3 {
        Item::Rgb8(image)
    } else {
        Item::Gray8(image)
    }
}

fn reduce_to_gray(rgb: &Image) -> Result<Image> {
    use tilework_core::image::Image as CoreImage;
    use tilework_kernels::prelude::{ConvertToGrayTask, GrayMode};
    use tilework_pool::CancellationToken;
    use tilework_tiling::prelude::{drive_image, TileBounds, TileDest, TileParams, TileSources};

    let mut out = CoreImage::new(rgb.width(), rgb.height(), 1)?;
    let dst = TileDest::from_image(&mut out);
    let sources = TileSources::single(rgb);
    let bounds = TileBounds::whole_image(rgb.width(), rgb.height());
    let params = TileParams::same_size(rgb.width(), rgb.height());
    let cancel = CancellationToken::new();
    drive_image(
        &ConvertToGrayTask { mode: GrayMode::UseRed },
        &sources,
        &dst,
        bounds,
        &params,
        &cancel,
    )?;
    Ok(out)
}

fn hash_source(expression: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    expression.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiling_identical_scripts_yields_the_same_id() {
        let processor = ImageProcessor::new(WorkerPool::new(2).unwrap());
        let a = processor.compile(r#"var g = input("gray", 8); var t = otsu_threshold(histogram(g))"#).unwrap();
        let b = processor.compile(r#"var g = input("gray", 8); var t = otsu_threshold(histogram(g))"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn compile_failure_allocates_nothing() {
        let processor = ImageProcessor::new(WorkerPool::new(2).unwrap());
        let err = processor
            .compile(r#"var rgb = input("rgb", 8); var g = convert_to_gray(rgb, "mauve")"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert!(processor.cache.lock().unwrap().is_empty());
    }

    #[test]
    fn evaluate_s1_otsu_on_uniform_image() {
        let processor = ImageProcessor::new(WorkerPool::new(2).unwrap());
        let compile_id = processor
            .compile(r#"var g = input("gray", 8); var t = otsu_threshold(histogram(g))"#)
            .unwrap();
        let mut image = Image::new(8, 8, 1).unwrap();
        image.channel_mut(0).iter_mut().for_each(|p| *p = 128);
        let cancel = CancellationToken::new();
        let result = processor.evaluate(compile_id, image, &cancel).unwrap();
        assert_eq!(result.as_int().unwrap(), 128);
    }

    #[test]
    fn evaluate_convert_if_restores_the_callers_image_kind() {
        let processor = ImageProcessor::new(WorkerPool::new(2).unwrap());
        let compile_id = processor
            .compile(r#"var rgb = input("rgb", 8); var g = convert_to_gray(rgb, "use_red")"#)
            .unwrap();
        let image = Image::new(2, 2, 3).unwrap();
        let cancel = CancellationToken::new();
        let result = processor.evaluate_convert_if(compile_id, image, &cancel).unwrap();
        assert_eq!(result.kind(), ItemKind::Rgb8);
    }
}
