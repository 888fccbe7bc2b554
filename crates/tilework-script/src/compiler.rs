//! Ties the parser, plan builder, and algorithm registry together into a
//! runnable [`CompiledPlan`].

use std::collections::HashMap;

use tilework_core::error::Result;
use tilework_pool::{CancellationToken, WorkerPool};

use crate::graph::{build_plan, reachable_ids, PlanNode};
use crate::handler::{Handler, ItemStore};
use crate::item::ItemKind;
use crate::parser::parse;
use crate::registry::AlgorithmRegistry;

/// A parsed, type-checked, and plan-compiled script, ready to run against
/// any [`ItemStore`].
pub struct CompiledPlan {
    plan: PlanNode,
    handlers: HashMap<u32, Handler>,
    result_id: u32,
    result_kind: ItemKind,
    input_ids: Vec<u32>,
}

impl CompiledPlan {
    /// Parses `source` against `registry`, builds its execution plan, and
    /// compiles every reachable leaf's handler.
    pub fn compile(source: &str, registry: &AlgorithmRegistry) -> Result<Self> {
        let parsed = parse(source, registry)?;
        let result_id = parsed.result_id()?;
        let result_kind = parsed
            .items
            .iter()
            .find(|item| item.id == result_id)
            .map(|item| item.result_kind)
            .expect("result_id always names a parsed item");
        let reachable = reachable_ids(&parsed.items, result_id)?;
        let plan = build_plan(&parsed.items, result_id)?;
        let input_ids = parsed
            .input_ids()
            .into_iter()
            .filter(|id| reachable.contains(id))
            .collect();

        let mut handlers = HashMap::with_capacity(reachable.len());
        for item in parsed.items.iter().filter(|item| reachable.contains(&item.id)) {
            let spec = registry.get(item.op)?;
            handlers.insert(item.id, (spec.compile)(item.args.clone()));
        }

        Ok(Self {
            plan,
            handlers,
            result_id,
            result_kind,
            input_ids,
        })
    }

    /// The item id `run` leaves the script's result under.
    pub fn result_id(&self) -> u32 {
        self.result_id
    }

    /// The script result's declared type.
    pub fn result_kind(&self) -> ItemKind {
        self.result_kind
    }

    /// Ids of every `input(...)` statement this plan actually depends on, in
    /// source order — what `evaluate`/`evaluate_two` must seed before `run`.
    pub fn input_ids(&self) -> &[u32] {
        &self.input_ids
    }

    /// Runs every reachable leaf in dependency order, honoring the plan's
    /// parallel groups, against `store`.
    pub fn run(&self, store: &dyn ItemStore, pool: &WorkerPool, cancel: &CancellationToken) -> Result<()> {
        run_node(&self.plan, &self.handlers, store, pool, cancel)
    }
}

fn run_node(
    node: &PlanNode,
    handlers: &HashMap<u32, Handler>,
    store: &dyn ItemStore,
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> Result<()> {
    cancel.check()?;
    match node {
        PlanNode::Leaf(id) => {
            let handler = handlers
                .get(id)
                .ok_or_else(|| tilework_core::error::Error::Internal(format!("no handler for item {id}")))?;
            handler(*id, store, pool, cancel)
        }
        PlanNode::Seq(children) => {
            for child in children {
                run_node(child, handlers, store, pool, cancel)?;
            }
            Ok(())
        }
        PlanNode::Par(children) => run_parallel(children, handlers, store, pool, cancel),
    }
}

fn run_parallel(
    children: &[PlanNode],
    handlers: &HashMap<u32, Handler>,
    store: &dyn ItemStore,
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> Result<()> {
    match children.len() {
        0 => Ok(()),
        1 => run_node(&children[0], handlers, store, pool, cancel),
        _ => {
            let mid = children.len() / 2;
            let (left, right) = children.split_at(mid);
            let (ra, rb) = pool.join(
                || run_parallel(left, handlers, store, pool, cancel),
                || run_parallel(right, handlers, store, pool, cancel),
            );
            ra?;
            rb?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeStore {
        items: Mutex<HashMap<u32, Item>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                items: Mutex::new(HashMap::new()),
            }
        }

        fn seed(&self, id: u32, item: Item) {
            self.items.lock().unwrap().insert(id, item);
        }
    }

    impl ItemStore for FakeStore {
        fn load(&self, id: u32) -> Item {
            self.items.lock().unwrap().get(&id).cloned().unwrap_or(Item::Invalid)
        }

        fn store(&self, id: u32, item: Item, _duration: Duration) {
            self.items.lock().unwrap().insert(id, item);
        }

        fn parameter(&self, _key: &str) -> Option<crate::item::Literal> {
            None
        }
    }

    #[test]
    fn compiles_and_runs_s1_otsu_scenario() {
        let registry = AlgorithmRegistry::with_builtins();
        let plan = CompiledPlan::compile(
            r#"var g = input("gray", 8); var h = histogram(g); var t = otsu_threshold(h)"#,
            &registry,
        )
        .unwrap();

        let store = FakeStore::new();
        let image = tilework_core::image::Image::new(8, 8, 1).unwrap();
        let mut image = image;
        image.channel_mut(0).iter_mut().for_each(|p| *p = 128);
        store.seed(0, Item::Gray8(image));

        let pool = WorkerPool::new(2).unwrap();
        let cancel = CancellationToken::new();
        plan.run(&store, &pool, &cancel).unwrap();

        let result = store.load(plan.result_id());
        assert_eq!(result.as_int().unwrap(), 128);
    }

    #[test]
    fn compile_fails_for_bad_mode_without_allocating_a_plan() {
        let registry = AlgorithmRegistry::with_builtins();
        let err = CompiledPlan::compile(
            r#"var rgb = input("rgb", 8); var g = convert_to_gray(rgb, "mauve")"#,
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, tilework_core::error::Error::InvalidParameter { .. }));
    }
}
