//! Algorithm registry: each operation the script language knows about
//! registers one `AlgorithmSpec`, per spec.md §4.4's
//! `{name, category, result_types, parameter_set, on_parse, on_compile}`.

use std::collections::HashMap;
use std::time::Instant;

use tilework_core::error::{Error, Result};
use tilework_tiling::params::TileParams;
use tilework_kernels::prelude::*;

use crate::handler::{Handler, ItemStore};
use crate::item::{Arg, Item, ItemKind, Literal};

/// One operation's declared parameter slot.
pub struct ParamSpec {
    /// Parameter name, for diagnostics.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Item kinds (including literal kinds) this parameter accepts.
    pub admissible: Vec<ItemKind>,
}

/// A registered script operation.
pub struct AlgorithmSpec {
    /// Operation name as it appears in script source.
    pub name: &'static str,
    /// Coarse grouping, shown by `--filters`.
    pub category: &'static str,
    /// The `ItemKind` this operation produces.
    pub result_kind: ItemKind,
    /// Declared parameter slots (arity and admissible types).
    pub params: Vec<ParamSpec>,
    /// Extra semantic validation beyond arity/type checking (e.g. a mode
    /// string must be one of a fixed set). Called with the resolved args and
    /// the `ItemKind` each arg's source item (or literal) carries.
    pub validate: fn(&[Arg], &[ItemKind]) -> Result<()>,
    /// Builds this leaf's evaluation-time handler from its resolved args.
    pub compile: fn(Vec<Arg>) -> Handler,
}

/// All operations the parser knows how to call, built once.
pub struct AlgorithmRegistry {
    specs: HashMap<&'static str, AlgorithmSpec>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl AlgorithmRegistry {
    /// An empty registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Registers `spec`, replacing any existing entry with the same name.
    pub fn register(&mut self, spec: AlgorithmSpec) {
        self.specs.insert(spec.name, spec);
    }

    /// Looks up an operation by name.
    pub fn get(&self, name: &str) -> Result<&AlgorithmSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| Error::invalid_parameter("script", format!("unknown operation '{name}'")))
    }

    /// Iterates every registered operation, for `--filters`.
    pub fn iter(&self) -> impl Iterator<Item = &AlgorithmSpec> {
        self.specs.values()
    }

    /// A registry pre-populated with every kernel this workspace ships.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(input_spec());
        reg.register(convert_to_gray_spec());
        reg.register(convert_to_rgb_spec());
        reg.register(threshold_spec());
        reg.register(histogram_spec());
        reg.register(otsu_threshold_spec());
        reg.register(histogram_equalisation_spec());
        reg.register(diff_spec());
        reg.register(mean_spec());
        reg.register(multiply_add_spec());
        reg
    }
}

fn no_extra_validation(_args: &[Arg], _kinds: &[ItemKind]) -> Result<()> {
    Ok(())
}

fn literal_str(args: &[Arg], index: usize) -> Result<&str> {
    match &args[index] {
        Arg::Literal(Literal::String(s)) => Ok(s.as_str()),
        _ => Err(Error::invalid_parameter(
            "script",
            format!("argument {index} must be a string literal"),
        )),
    }
}

fn literal_int(args: &[Arg], index: usize) -> Result<i64> {
    match &args[index] {
        Arg::Literal(Literal::Int(v)) => Ok(*v),
        _ => Err(Error::invalid_parameter(
            "script",
            format!("argument {index} must be an integer literal"),
        )),
    }
}

fn with_cutoffs(mut params: TileParams, store: &dyn ItemStore) -> TileParams {
    if let Some(Literal::Int(x)) = store.parameter("cutoff_x") {
        if x > 0 {
            params.cutoff_x = x as u32;
        }
    }
    if let Some(Literal::Int(y)) = store.parameter("cutoff_y") {
        if y > 0 {
            params.cutoff_y = y as u32;
        }
    }
    params
}

fn sized_params(store: &dyn ItemStore, width: u32, height: u32) -> TileParams {
    with_cutoffs(TileParams::same_size(width, height), store)
}

fn input_spec() -> AlgorithmSpec {
    fn validate(args: &[Arg], _kinds: &[ItemKind]) -> Result<()> {
        let channel_kind = literal_str(args, 0)?;
        if channel_kind != "gray" && channel_kind != "rgb" {
            return Err(Error::invalid_parameter(
                "input.channel_kind",
                format!("unknown channel kind '{channel_kind}', expected 'gray' or 'rgb'"),
            ));
        }
        let bit_depth = literal_int(args, 1)?;
        if bit_depth != 8 {
            return Err(Error::invalid_parameter(
                "input.bit_depth",
                format!("unsupported bit depth {bit_depth}, only 8 is supported"),
            ));
        }
        Ok(())
    }

    fn compile(args: Vec<Arg>) -> Handler {
        let channel_kind = match &args[0] {
            Arg::Literal(Literal::String(s)) => s.clone(),
            _ => unreachable!("validated by AlgorithmSpec::validate"),
        };
        Box::new(move |id, store, _pool, cancel| {
            cancel.check()?;
            let item = store.load(id);
            let expected = if channel_kind == "gray" {
                ItemKind::Gray8
            } else {
                ItemKind::Rgb8
            };
            if item.kind() != expected {
                return Err(Error::invalid_parameter(
                    "input",
                    format!(
                        "expected the evaluator to seed item {id} as {expected}, found {}",
                        item.kind()
                    ),
                ));
            }
            // Already seeded by the image processor before plan execution; nothing to do.
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "input",
        category: "source",
        result_kind: ItemKind::Gray8, // overridden per-call by the seeded item's actual kind
        params: vec![
            ParamSpec {
                name: "channel_kind",
                description: "\"gray\" or \"rgb\"",
                admissible: vec![ItemKind::String],
            },
            ParamSpec {
                name: "bit_depth",
                description: "bits per channel, currently only 8",
                admissible: vec![ItemKind::Int],
            },
        ],
        validate,
        compile,
    }
}

fn convert_to_gray_spec() -> AlgorithmSpec {
    fn validate(args: &[Arg], kinds: &[ItemKind]) -> Result<()> {
        if kinds[0] != ItemKind::Rgb8 {
            return Err(Error::invalid_parameter(
                "convert_to_gray",
                format!("expected an rgb8 source, got {}", kinds[0]),
            ));
        }
        let mode = literal_str(args, 1)?;
        GrayMode::parse(mode)?;
        Ok(())
    }

    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!("validated: source is always a ref"),
        };
        let mode = match &args[1] {
            Arg::Literal(Literal::String(s)) => GrayMode::parse(s).expect("validated at parse time"),
            _ => unreachable!("validated by AlgorithmSpec::validate"),
        };
        Box::new(move |id, store, pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?.clone();
            let mut out = tilework_core::image::Image::new(src_image.width(), src_image.height(), 1)?;
            let dst = tilework_tiling::buffers::TileDest::from_image(&mut out);
            let sources = tilework_tiling::buffers::TileSources::single(&src_image);
            let bounds =
                tilework_tiling::params::TileBounds::whole_image(src_image.width(), src_image.height());
            let params = sized_params(store, src_image.width(), src_image.height());
            let _ = pool;
            tilework_tiling::engine::drive_image(
                &ConvertToGrayTask { mode },
                &sources,
                &dst,
                bounds,
                &params,
                cancel,
            )?;
            store.store(id, Item::Gray8(out), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "convert_to_gray",
        category: "conversion",
        result_kind: ItemKind::Gray8,
        params: vec![
            ParamSpec {
                name: "source",
                description: "rgb8 image",
                admissible: vec![ItemKind::Rgb8],
            },
            ParamSpec {
                name: "mode",
                description: "use_red|use_green|use_blue|average|luminance",
                admissible: vec![ItemKind::String],
            },
        ],
        validate,
        compile,
    }
}

fn convert_to_rgb_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!("validated: source is always a ref"),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?;
            let expanded = src_image.expand_gray_to_rgb()?;
            store.store(id, Item::Rgb8(expanded), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "convert_to_rgb",
        category: "conversion",
        result_kind: ItemKind::Rgb8,
        params: vec![ParamSpec {
            name: "source",
            description: "gray8 image",
            admissible: vec![ItemKind::Gray8],
        }],
        validate: no_extra_validation,
        compile,
    }
}

fn threshold_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!(),
        };
        let cutoff = match args[1] {
            Arg::Literal(Literal::Int(v)) => v as u8,
            _ => unreachable!("validated by AlgorithmSpec::validate"),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?.clone();
            let mut out = tilework_core::image::Image::new(src_image.width(), src_image.height(), 1)?;
            let dst = tilework_tiling::buffers::TileDest::from_image(&mut out);
            let sources = tilework_tiling::buffers::TileSources::single(&src_image);
            let bounds =
                tilework_tiling::params::TileBounds::whole_image(src_image.width(), src_image.height());
            let params = sized_params(store, src_image.width(), src_image.height());
            tilework_tiling::engine::drive_image(
                &ThresholdTask { cutoff },
                &sources,
                &dst,
                bounds,
                &params,
                cancel,
            )?;
            store.store(id, Item::Mask(out), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "threshold",
        category: "segmentation",
        result_kind: ItemKind::Mask,
        params: vec![
            ParamSpec {
                name: "source",
                description: "gray8 image",
                admissible: vec![ItemKind::Gray8],
            },
            ParamSpec {
                name: "cutoff",
                description: "inclusive lower bound, 0-255",
                admissible: vec![ItemKind::Int],
            },
        ],
        validate: no_extra_validation,
        compile,
    }
}

fn histogram_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!(),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?.clone();
            let sources = tilework_tiling::buffers::TileSources::single(&src_image);
            let bounds =
                tilework_tiling::params::TileBounds::whole_image(src_image.width(), src_image.height());
            let params = sized_params(store, src_image.width(), src_image.height());
            let hist = tilework_tiling::engine::drive_reduce(
                &HistogramTask,
                &sources,
                bounds,
                &params,
                cancel,
            )?;
            store.store(id, Item::Histogram(hist), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "histogram",
        category: "statistics",
        result_kind: ItemKind::Histogram,
        params: vec![ParamSpec {
            name: "source",
            description: "gray8 image",
            admissible: vec![ItemKind::Gray8],
        }],
        validate: no_extra_validation,
        compile,
    }
}

fn otsu_threshold_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!(),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let hist = src_item.as_histogram()?;
            let threshold = otsu_threshold(hist);
            store.store(id, Item::Int(threshold as i64), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "otsu_threshold",
        category: "statistics",
        result_kind: ItemKind::Int,
        params: vec![ParamSpec {
            name: "histogram",
            description: "256-bin gray-level histogram",
            admissible: vec![ItemKind::Histogram],
        }],
        validate: no_extra_validation,
        compile,
    }
}

fn histogram_equalisation_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!(),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?.clone();
            let params = sized_params(store, src_image.width(), src_image.height());
            let out = equalize(&src_image, &params, cancel)?;
            store.store(id, Item::Gray8(out), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "histogram_equalisation",
        category: "enhancement",
        result_kind: ItemKind::Gray8,
        params: vec![ParamSpec {
            name: "source",
            description: "gray8 image",
            admissible: vec![ItemKind::Gray8],
        }],
        validate: no_extra_validation,
        compile,
    }
}

fn two_source_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec {
            name: "a",
            description: "gray8 image",
            admissible: vec![ItemKind::Gray8],
        },
        ParamSpec {
            name: "b",
            description: "gray8 image",
            admissible: vec![ItemKind::Gray8],
        },
    ]
}

fn run_two_source(
    id: u32,
    name: &str,
    a_ref: u32,
    b_ref: u32,
    store: &dyn crate::handler::ItemStore,
    cancel: &tilework_pool::CancellationToken,
    task: &dyn tilework_tiling::task::ImageTileTask,
) -> Result<()> {
    let start = Instant::now();
    cancel.check()?;
    let a_item = store.load(a_ref);
    let b_item = store.load(b_ref);
    let a_image = a_item.as_image()?.clone();
    let b_image = b_item.as_image()?.clone();
    if a_image.width() != b_image.width() || a_image.height() != b_image.height() {
        return Err(Error::shape_mismatch(format!(
            "{name} requires equal-sized sources, got {}x{} vs {}x{}",
            a_image.width(),
            a_image.height(),
            b_image.width(),
            b_image.height()
        )));
    }
    let mut out = tilework_core::image::Image::new(a_image.width(), a_image.height(), 1)?;
    let dst = tilework_tiling::buffers::TileDest::from_image(&mut out);
    let sources = tilework_tiling::buffers::TileSources::pair(&a_image, &b_image);
    let bounds = tilework_tiling::params::TileBounds::whole_image(a_image.width(), a_image.height());
    let params = sized_params(store, a_image.width(), a_image.height());
    tilework_tiling::engine::drive_image(task, &sources, &dst, bounds, &params, cancel)?;
    store.store(id, Item::Gray8(out), start.elapsed());
    Ok(())
}

fn two_source_refs(args: &[Arg]) -> (u32, u32) {
    match (&args[0], &args[1]) {
        (Arg::Ref(a), Arg::Ref(b)) => (*a, *b),
        _ => unreachable!("validated: both sources are refs"),
    }
}

fn diff_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let (a_ref, b_ref) = two_source_refs(&args);
        Box::new(move |id, store, _pool, cancel| {
            run_two_source(id, "diff", a_ref, b_ref, store, cancel, &DiffTask)
        })
    }

    AlgorithmSpec {
        name: "diff",
        category: "arithmetic",
        result_kind: ItemKind::Gray8,
        params: two_source_params(),
        validate: no_extra_validation,
        compile,
    }
}

fn mean_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let (a_ref, b_ref) = two_source_refs(&args);
        Box::new(move |id, store, _pool, cancel| {
            run_two_source(id, "mean", a_ref, b_ref, store, cancel, &MeanTask)
        })
    }

    AlgorithmSpec {
        name: "mean",
        category: "arithmetic",
        result_kind: ItemKind::Gray8,
        params: two_source_params(),
        validate: no_extra_validation,
        compile,
    }
}

fn multiply_add_spec() -> AlgorithmSpec {
    fn compile(args: Vec<Arg>) -> Handler {
        let src_ref = match args[0] {
            Arg::Ref(id) => id,
            _ => unreachable!(),
        };
        let factor = match args[1] {
            Arg::Literal(Literal::Real(v)) => v,
            Arg::Literal(Literal::Int(v)) => v as f64,
            _ => unreachable!("validated by AlgorithmSpec::validate"),
        };
        let offset = match args[2] {
            Arg::Literal(Literal::Real(v)) => v,
            Arg::Literal(Literal::Int(v)) => v as f64,
            _ => unreachable!("validated by AlgorithmSpec::validate"),
        };
        Box::new(move |id, store, _pool, cancel| {
            let start = Instant::now();
            cancel.check()?;
            let src_item = store.load(src_ref);
            let src_image = src_item.as_image()?.clone();
            let mut out = tilework_core::image::Image::new(src_image.width(), src_image.height(), 1)?;
            let dst = tilework_tiling::buffers::TileDest::from_image(&mut out);
            let sources = tilework_tiling::buffers::TileSources::single(&src_image);
            let bounds =
                tilework_tiling::params::TileBounds::whole_image(src_image.width(), src_image.height());
            let params = sized_params(store, src_image.width(), src_image.height());
            tilework_tiling::engine::drive_image(
                &MultiplyAddTask { factor, offset },
                &sources,
                &dst,
                bounds,
                &params,
                cancel,
            )?;
            store.store(id, Item::Gray8(out), start.elapsed());
            Ok(())
        })
    }

    AlgorithmSpec {
        name: "multiply_add",
        category: "arithmetic",
        result_kind: ItemKind::Gray8,
        params: vec![
            ParamSpec {
                name: "source",
                description: "gray8 image",
                admissible: vec![ItemKind::Gray8],
            },
            ParamSpec {
                name: "factor",
                description: "multiplicative factor",
                admissible: vec![ItemKind::Real, ItemKind::Int],
            },
            ParamSpec {
                name: "offset",
                description: "additive offset",
                admissible: vec![ItemKind::Real, ItemKind::Int],
            },
        ],
        validate: no_extra_validation,
        compile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_registers_all_ten_operations() {
        let reg = AlgorithmRegistry::with_builtins();
        for name in [
            "input",
            "convert_to_gray",
            "convert_to_rgb",
            "threshold",
            "histogram",
            "otsu_threshold",
            "histogram_equalisation",
            "diff",
            "mean",
            "multiply_add",
        ] {
            assert!(reg.get(name).is_ok(), "missing builtin '{name}'");
        }
    }

    #[test]
    fn unknown_operation_errors() {
        let reg = AlgorithmRegistry::with_builtins();
        assert!(reg.get("sobel").is_err());
    }
}
