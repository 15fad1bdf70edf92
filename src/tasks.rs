//! Kitchen tasks and the task registry.
//!
//! A task binds fixture roles, names the fixture the robot should face,
//! lists the objects to spawn and describes itself in one sentence.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SceneError;
use crate::fixtures::{FixtureId, FixtureQuery, FixtureRefs, FixtureRegistry, FixtureType};
use crate::metadata::{obj_lang, ObjectRecord};
use crate::prng::Pcg32;
use crate::types::{InnerPos, ObjectConfig, Placement, PosSymbol, TaskSpec};

/// Mutable state a task works against while setting up an episode.
pub struct TaskContext<'a> {
    pub registry: &'a FixtureRegistry,
    pub refs: &'a mut FixtureRefs,
    pub rng: &'a mut Pcg32,
}

impl TaskContext<'_> {
    /// Bind `role` and return the bound fixture's name.
    pub fn register(&mut self, role: &str, query: FixtureQuery) -> Result<String, SceneError> {
        let fixture = self.refs.register_role(self.registry, role, &query, self.rng)?;
        Ok(fixture.name.clone())
    }

    /// Name bound to a role registered earlier.
    pub fn role(&self, role: &str) -> Result<String, SceneError> {
        self.refs
            .get(role)
            .map(str::to_string)
            .ok_or_else(|| SceneError::UnknownFixture(format!("role {role}")))
    }
}

pub trait KitchenTask: Send + Sync {
    fn name(&self) -> &str;

    /// Layouts this task cannot run in.
    fn excluded_layouts(&self) -> Vec<u32> {
        Vec::new()
    }

    /// Bind the task's fixture roles. Runs once fixtures are placed.
    fn setup_refs(&self, ctx: &mut TaskContext<'_>) -> Result<(), SceneError>;

    /// Role the robot should face, if the task has one.
    fn robot_anchor(&self) -> Option<&str> {
        None
    }

    fn object_cfgs(&self, ctx: &mut TaskContext<'_>) -> Result<Vec<ObjectConfig>, SceneError>;

    fn lang(&self, _objects: &[ObjectRecord]) -> String {
        String::new()
    }
}

fn parse_args<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, SceneError> {
    Ok(serde_json::from_value(Value::Object(args.clone()))?)
}

fn default_obj_groups() -> Vec<String> {
    vec!["all".to_string()]
}

fn default_num_objs() -> u32 {
    1
}

fn default_cab_id() -> FixtureId {
    FixtureType::CabinetTop.into()
}

fn one_or_many<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

// -- KitchenDemo ---------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KitchenDemo {
    #[serde(default = "default_num_objs")]
    pub num_objs: u32,
    #[serde(default = "default_obj_groups", deserialize_with = "one_or_many")]
    pub obj_groups: Vec<String>,
}

impl KitchenTask for KitchenDemo {
    fn name(&self) -> &str {
        "KitchenDemo"
    }

    fn setup_refs(&self, ctx: &mut TaskContext<'_>) -> Result<(), SceneError> {
        ctx.register("cab", FixtureQuery::new("cab_main_main_group"))?;
        ctx.register("counter", FixtureQuery::new("counter_main_main_group"))?;
        Ok(())
    }

    fn robot_anchor(&self) -> Option<&str> {
        Some("cab")
    }

    fn object_cfgs(&self, ctx: &mut TaskContext<'_>) -> Result<Vec<ObjectConfig>, SceneError> {
        let counter = ctx.role("counter")?;
        let cab = ctx.role("cab")?;
        Ok((0..self.num_objs)
            .map(|i| {
                ObjectConfig::named(&format!("obj_{i}"), &self.obj_groups).with_placement(
                    Placement::on(counter.as_str(), [1.0, 1.0])
                        .near_ref(cab.as_str())
                        .at(0.0, -1.0),
                )
            })
            .collect())
    }
}

// -- Pick and place ------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PnPArgs {
    #[serde(default = "default_obj_groups", deserialize_with = "one_or_many")]
    pub obj_groups: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub exclude_obj_groups: Vec<String>,
    #[serde(default = "default_cab_id")]
    pub cab_id: FixtureId,
}

impl PnPArgs {
    fn target(&self, placement: Placement) -> ObjectConfig {
        ObjectConfig {
            exclude_obj_groups: self.exclude_obj_groups.clone(),
            graspable: Some(true),
            ..ObjectConfig::named("obj", &self.obj_groups).with_placement(placement)
        }
    }
}

fn distractor(name: &str, placement: Placement) -> ObjectConfig {
    ObjectConfig::named(name, &default_obj_groups()).with_placement(placement)
}

fn pick_place_lang(objects: &[ObjectRecord], from: &str, to: &str) -> String {
    let obj = obj_lang(objects, "obj").unwrap_or_else(|| "object".to_string());
    format!("pick the {obj} from the {from} and place it {to}")
}

/// Counter to wall cabinet. The robot faces the island, or a counter
/// when the layout has no island.
#[derive(Debug, Clone, Deserialize)]
pub struct PnPCounterToCab {
    #[serde(flatten)]
    pub args: PnPArgs,
}

impl KitchenTask for PnPCounterToCab {
    fn name(&self) -> &str {
        "PnPCounterToCab"
    }

    fn setup_refs(&self, ctx: &mut TaskContext<'_>) -> Result<(), SceneError> {
        match ctx.register("island", FixtureQuery::new(FixtureType::Island)) {
            Ok(_) => {}
            Err(SceneError::NoValidFixture { .. }) => {
                warn!("no island in layout, anchoring on a counter instead");
                ctx.register("island", FixtureQuery::new(FixtureType::Counter))?;
            }
            Err(e) => return Err(e),
        }
        ctx.register("cab", FixtureQuery::new(self.args.cab_id.clone()))?;
        let microwave = ctx.register("microwave", FixtureQuery::new(FixtureType::Microwave))?;
        ctx.register(
            "counter",
            FixtureQuery::new(FixtureType::Counter).near(microwave.as_str()),
        )?;
        ctx.register(
            "distr_counter",
            FixtureQuery::new(FixtureType::Counter).near(microwave.as_str()),
        )?;
        ctx.register("fridge", FixtureQuery::new(FixtureType::Fridge))?;
        Ok(())
    }

    fn robot_anchor(&self) -> Option<&str> {
        Some("island")
    }

    fn object_cfgs(&self, ctx: &mut TaskContext<'_>) -> Result<Vec<ObjectConfig>, SceneError> {
        let counter = ctx.role("counter")?;
        let cab = ctx.role("cab")?;
        Ok(vec![
            self.args.target(
                Placement::on(counter.as_str(), [0.60, 0.30])
                    .near_ref(cab.as_str())
                    .at(0.0, -1.0)
                    .shifted(0.0, 0.10),
            ),
            distractor(
                "distr_counter",
                Placement::on(counter.as_str(), [1.0, 0.30])
                    .near_ref(cab.as_str())
                    .at(0.0, 1.0)
                    .shifted(0.0, -0.05),
            ),
            distractor(
                "distr_cab",
                Placement::on(cab.as_str(), [1.0, 0.20]).at(0.0, 1.0),
            ),
        ])
    }

    fn lang(&self, objects: &[ObjectRecord]) -> String {
        pick_place_lang(objects, "counter", "in the cabinet")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PnPCabToCounter {
    #[serde(flatten)]
    pub args: PnPArgs,
}

impl KitchenTask for PnPCabToCounter {
    fn name(&self) -> &str {
        "PnPCabToCounter"
    }

    fn setup_refs(&self, ctx: &mut TaskContext<'_>) -> Result<(), SceneError> {
        let cab = ctx.register("cab", FixtureQuery::new(self.args.cab_id.clone()))?;
        ctx.register("counter", FixtureQuery::new(FixtureType::Counter).near(cab.as_str()))?;
        Ok(())
    }

    fn robot_anchor(&self) -> Option<&str> {
        Some("cab")
    }

    fn object_cfgs(&self, ctx: &mut TaskContext<'_>) -> Result<Vec<ObjectConfig>, SceneError> {
        let counter = ctx.role("counter")?;
        let cab = ctx.role("cab")?;
        Ok(vec![
            self.args
                .target(Placement::on(cab.as_str(), [0.50, 0.20]).at(0.0, -1.0)),
            distractor(
                "distr_counter",
                Placement::on(counter.as_str(), [1.0, 0.30])
                    .near_ref(cab.as_str())
                    .at(0.0, 1.0)
                    .shifted(0.0, -0.05),
            ),
            distractor(
                "distr_cab",
                Placement::on(cab.as_str(), [1.0, 0.20]).at(0.0, 1.0),
            ),
        ])
    }

    fn lang(&self, objects: &[ObjectRecord]) -> String {
        pick_place_lang(objects, "cabinet", "on the counter")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PnPCounterToSink {
    #[serde(flatten)]
    pub args: PnPArgs,
}

impl KitchenTask for PnPCounterToSink {
    fn name(&self) -> &str {
        "PnPCounterToSink"
    }

    fn setup_refs(&self, ctx: &mut TaskContext<'_>) -> Result<(), SceneError> {
        let sink = ctx.register("sink", FixtureQuery::new(FixtureType::Sink))?;
        ctx.register("counter", FixtureQuery::new(FixtureType::Counter).near(sink.as_str()))?;
        Ok(())
    }

    fn robot_anchor(&self) -> Option<&str> {
        Some("sink")
    }

    fn object_cfgs(&self, ctx: &mut TaskContext<'_>) -> Result<Vec<ObjectConfig>, SceneError> {
        let counter = ctx.role("counter")?;
        let sink = ctx.role("sink")?;
        let beside_sink = |size: [f64; 2]| {
            let mut p = Placement::on(counter.as_str(), size).near_ref(sink.as_str());
            p.pos = [InnerPos::Symbolic(PosSymbol::AlignWithRef), InnerPos::Value(-1.0)];
            p
        };
        let mut target = self.args.target(beside_sink([0.30, 0.40]));
        target.washable = Some(true);
        let mut distr_sink = distractor(
            "distr_sink",
            Placement::on(sink.as_str(), [0.25, 0.25]).at(0.0, 1.0),
        );
        distr_sink.washable = Some(true);
        Ok(vec![
            target,
            distractor("distr_counter", beside_sink([0.30, 0.30]).shifted(0.0, 0.30)),
            distr_sink,
        ])
    }

    fn lang(&self, objects: &[ObjectRecord]) -> String {
        pick_place_lang(objects, "counter", "in the sink")
    }
}

// -- Registry ------------------------------------------------------

pub type TaskCtor = fn(&Map<String, Value>) -> Result<Box<dyn KitchenTask>, SceneError>;

fn boxed<T: KitchenTask + DeserializeOwned + 'static>(
    args: &Map<String, Value>,
) -> Result<Box<dyn KitchenTask>, SceneError> {
    Ok(Box::new(parse_args::<T>(args)?))
}

/// Task name to constructor.
#[derive(Clone)]
pub struct TaskRegistry {
    ctors: IndexMap<String, TaskCtor>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TaskRegistry {
    pub fn empty() -> Self {
        TaskRegistry {
            ctors: IndexMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("KitchenDemo", boxed::<KitchenDemo>);
        registry.register("PnPCounterToCab", boxed::<PnPCounterToCab>);
        registry.register("PnPCabToCounter", boxed::<PnPCabToCounter>);
        registry.register("PnPCounterToSink", boxed::<PnPCounterToSink>);
        registry
    }

    pub fn register(&mut self, name: &str, ctor: TaskCtor) {
        self.ctors.insert(name.to_string(), ctor);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }

    pub fn create(&self, spec: &TaskSpec) -> Result<Box<dyn KitchenTask>, SceneError> {
        let ctor = self
            .ctors
            .get(&spec.name)
            .ok_or_else(|| SceneError::UnknownTask(spec.name.clone()))?;
        ctor(&spec.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{demo_layout, island_layout};
    use serde_json::json;

    fn spec(name: &str, args: Value) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn builtin_names() {
        let names: Vec<_> = TaskRegistry::with_defaults().names().map(str::to_string).collect();
        assert_eq!(
            names,
            ["KitchenDemo", "PnPCounterToCab", "PnPCabToCounter", "PnPCounterToSink"]
        );
    }

    #[test]
    fn unknown_task() {
        let err = TaskRegistry::with_defaults()
            .create(&spec("MakeCoffee", json!({})))
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::UnknownTask(name) if name == "MakeCoffee"));
    }

    #[test]
    fn args_are_parsed() {
        let task = TaskRegistry::with_defaults()
            .create(&spec("KitchenDemo", json!({"num_objs": 3, "obj_groups": "fruit"})))
            .unwrap();
        let registry = FixtureRegistry::from_layout(&demo_layout()).unwrap();
        let mut refs = FixtureRefs::default();
        let mut rng = Pcg32::new(1, 0);
        let mut ctx = TaskContext { registry: &registry, refs: &mut refs, rng: &mut rng };
        task.setup_refs(&mut ctx).unwrap();
        let cfgs = task.object_cfgs(&mut ctx).unwrap();
        assert_eq!(cfgs.len(), 3);
        assert_eq!(cfgs[2].name.as_deref(), Some("obj_2"));
        assert_eq!(cfgs[0].obj_groups, vec!["fruit".to_string()]);
    }

    #[test]
    fn bad_args_are_json_errors() {
        let err = TaskRegistry::with_defaults()
            .create(&spec("KitchenDemo", json!({"num_objs": "many"})))
            .err()
            .unwrap();
        assert!(matches!(err, SceneError::Json(_)));
    }

    #[test]
    fn counter_to_cab_falls_back_without_island() {
        let task = TaskRegistry::with_defaults()
            .create(&spec("PnPCounterToCab", json!({})))
            .unwrap();
        let registry = FixtureRegistry::from_layout(&demo_layout()).unwrap();
        let mut refs = FixtureRefs::default();
        let mut rng = Pcg32::new(2, 0);
        let mut ctx = TaskContext { registry: &registry, refs: &mut refs, rng: &mut rng };
        task.setup_refs(&mut ctx).unwrap();
        assert_eq!(refs.get("island"), Some("counter_main_main_group"));
        assert_eq!(refs.get("cab"), Some("cab_main_main_group"));
        assert_eq!(refs.get("counter"), Some("counter_main_main_group"));
        assert_eq!(refs.get("fridge"), Some("fridge_main_group"));
        let roles: Vec<_> = refs.as_map().keys().cloned().collect();
        assert_eq!(roles, ["island", "cab", "microwave", "counter", "distr_counter", "fridge"]);
    }

    #[test]
    fn counter_to_cab_uses_island_when_present() {
        let task = TaskRegistry::with_defaults()
            .create(&spec("PnPCounterToCab", json!({})))
            .unwrap();
        let registry = FixtureRegistry::from_layout(&island_layout()).unwrap();
        let mut refs = FixtureRefs::default();
        let mut rng = Pcg32::new(3, 0);
        let mut ctx = TaskContext { registry: &registry, refs: &mut refs, rng: &mut rng };
        task.setup_refs(&mut ctx).unwrap();
        assert_eq!(refs.get("island"), Some("island_island_group"));
        assert_eq!(task.robot_anchor(), Some("island"));
    }

    #[test]
    fn sink_task_targets() {
        let task = TaskRegistry::with_defaults()
            .create(&spec("PnPCounterToSink", json!({"obj_groups": ["fruit"]})))
            .unwrap();
        let registry = FixtureRegistry::from_layout(&demo_layout()).unwrap();
        let mut refs = FixtureRefs::default();
        let mut rng = Pcg32::new(4, 0);
        let mut ctx = TaskContext { registry: &registry, refs: &mut refs, rng: &mut rng };
        task.setup_refs(&mut ctx).unwrap();
        let cfgs = task.object_cfgs(&mut ctx).unwrap();
        assert_eq!(refs.get("counter"), Some("counter_main_main_group"));
        assert_eq!(cfgs[0].washable, Some(true));
        assert_eq!(cfgs[0].graspable, Some(true));
        let names: Vec<_> = cfgs.iter().filter_map(|c| c.name.clone()).collect();
        assert_eq!(names, ["obj", "distr_counter", "distr_sink"]);
    }
}
