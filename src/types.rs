//! Data types matching the scene-assembly JSON schema.
//!
//! Every struct here derives Serialize + Deserialize so it can
//! round-trip through the JSON interchange format.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::ObjectCatalog;
use crate::fixtures::{FixtureId, FixtureKind};
use crate::geometry::Vec3;
use crate::metadata::EpisodeMeta;
use crate::rotation::Axis;

// -- Serde helpers -------------------------------------------------

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
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

fn opt_one_or_many<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Vec<String>>, D::Error> {
    one_or_many(d).map(Some)
}

fn default_true() -> bool {
    true
}

fn default_all_groups() -> Vec<String> {
    vec!["all".to_string()]
}

// -- Fixtures / layouts --------------------------------------------

/// A sub-rectangle of a fixture surface, in the fixture's local frame.
/// `offset[2]` is the height of the surface above the fixture centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResetRegion {
    pub offset: Vec3,
    pub size: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSpec {
    pub name: String,
    pub kind: FixtureKind,
    #[serde(default)]
    pub pos: Vec3,
    #[serde(default)]
    pub rot: f64,
    pub size: Vec3,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub reset_regions: IndexMap<String, ResetRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LayoutTags {
    #[serde(default)]
    pub island: bool,
    #[serde(default)]
    pub wall_stack: bool,
    #[serde(default)]
    pub dining: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenLayout {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: LayoutTags,
    pub fixtures: Vec<FixtureSpec>,
}

// -- Placement -----------------------------------------------------

/// One side of a requested inner-region size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extent {
    Value(f64),
    Object(ObjectExtent),
}

/// Inner-region size taken from the entity's own bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectExtent {
    /// Same axis as the region side.
    #[serde(rename = "obj")]
    SameAxis,
    #[serde(rename = "obj.x")]
    X,
    #[serde(rename = "obj.y")]
    Y,
}

/// Normalized position of the inner region inside the outer region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InnerPos {
    Value(f64),
    Symbolic(PosSymbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PosSymbol {
    /// Align with the projected offset of `sample_region_kwargs.ref`.
    #[serde(rename = "ref")]
    AlignWithRef,
}

impl Default for InnerPos {
    fn default() -> Self {
        InnerPos::Value(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RotationSpec {
    Fixed(f64),
    Range([f64; 2]),
}

pub const DEFAULT_ROTATION: RotationSpec = RotationSpec::Range([
    -std::f64::consts::FRAC_PI_4,
    std::f64::consts::FRAC_PI_4,
]);

/// Arguments for choosing a reset region on the placement fixture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRegionArgs {
    /// Prefer the region closest to this fixture.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<FixtureId>,
    /// Use exactly this named region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Minimum region size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_size: Option<[f64; 2]>,
}

impl SampleRegionArgs {
    pub fn is_empty(&self) -> bool {
        self.reference.is_none() && self.region.is_none() && self.top_size.is_none()
    }
}

/// Place relative to an entity placed earlier in the same batch (or
/// passed in as already placed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleArgs {
    pub reference: String,
    #[serde(default = "default_true")]
    pub on_top: bool,
}

/// Overrides applied to the container config created for
/// `try_to_place_in`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graspable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub washable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microwavable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freezable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<[Option<f64>; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_scale: Option<f64>,
}

fn default_margin() -> f64 {
    0.04
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Fixture whose reset region bounds the placement. None means an
    /// absolute region centred at the world origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<FixtureId>,
    /// Proximity reference used when resolving `fixture`.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<FixtureId>,
    #[serde(default, skip_serializing_if = "SampleRegionArgs::is_empty")]
    pub sample_region_kwargs: SampleRegionArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[Extent; 2]>,
    #[serde(default)]
    pub pos: [InnerPos; 2],
    #[serde(default)]
    pub offset: [f64; 2],
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationSpec>,
    #[serde(default)]
    pub rotation_axis: Axis,
    #[serde(default = "default_true")]
    pub ensure_object_boundary_in_range: bool,
    #[serde(default = "default_true")]
    pub ensure_valid_placement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_args: Option<SampleArgs>,
    #[serde(
        default,
        deserialize_with = "opt_one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub try_to_place_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_kwargs: Option<ContainerArgs>,
}

impl Default for Placement {
    fn default() -> Self {
        Placement {
            fixture: None,
            reference: None,
            sample_region_kwargs: SampleRegionArgs::default(),
            size: None,
            pos: [InnerPos::default(); 2],
            offset: [0.0, 0.0],
            margin: default_margin(),
            rotation: None,
            rotation_axis: Axis::Z,
            ensure_object_boundary_in_range: true,
            ensure_valid_placement: true,
            sample_args: None,
            try_to_place_in: None,
            container_kwargs: None,
        }
    }
}

impl Placement {
    /// Placement on `fixture` with an inner region of `size`.
    pub fn on(fixture: impl Into<FixtureId>, size: [f64; 2]) -> Self {
        Placement {
            fixture: Some(fixture.into()),
            size: Some([Extent::Value(size[0]), Extent::Value(size[1])]),
            ..Placement::default()
        }
    }

    pub fn near_ref(mut self, reference: impl Into<FixtureId>) -> Self {
        self.sample_region_kwargs.reference = Some(reference.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.pos = [InnerPos::Value(x), InnerPos::Value(y)];
        self
    }

    pub fn shifted(mut self, dx: f64, dy: f64) -> Self {
        self.offset = [dx, dy];
        self
    }
}

// -- Objects -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_all_groups", deserialize_with = "one_or_many")]
    pub obj_groups: Vec<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub exclude_obj_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graspable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub washable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microwavable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freezable: Option<bool>,
    #[serde(default)]
    pub max_size: [Option<f64>; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        ObjectConfig {
            name: None,
            obj_groups: default_all_groups(),
            exclude_obj_groups: Vec::new(),
            graspable: None,
            washable: None,
            microwavable: None,
            cookable: None,
            freezable: None,
            max_size: [None; 3],
            object_scale: None,
            placement: None,
        }
    }
}

impl ObjectConfig {
    pub fn named(name: &str, groups: &[String]) -> Self {
        ObjectConfig {
            name: Some(name.to_string()),
            obj_groups: groups.to_vec(),
            ..ObjectConfig::default()
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    /// Apply container overrides.
    pub fn apply_container_args(&mut self, args: &ContainerArgs) {
        if args.graspable.is_some() {
            self.graspable = args.graspable;
        }
        if args.washable.is_some() {
            self.washable = args.washable;
        }
        if args.microwavable.is_some() {
            self.microwavable = args.microwavable;
        }
        if args.cookable.is_some() {
            self.cookable = args.cookable;
        }
        if args.freezable.is_some() {
            self.freezable = args.freezable;
        }
        if let Some(max_size) = args.max_size {
            self.max_size = max_size;
        }
        if args.object_scale.is_some() {
            self.object_scale = args.object_scale;
        }
    }
}

// -- Engine I/O ----------------------------------------------------

fn default_task_name() -> String {
    "KitchenDemo".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default = "default_task_name")]
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl Default for TaskSpec {
    fn default() -> Self {
        TaskSpec {
            name: default_task_name(),
            args: serde_json::Map::new(),
        }
    }
}

fn default_fixture_placement_attempts() -> u32 {
    10
}
fn default_object_placement_attempts() -> u32 {
    1
}
fn default_max_load_restarts() -> u32 {
    50
}
fn default_max_sample_tries() -> u32 {
    5000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_fixture_placement_attempts")]
    pub fixture_placement_attempts: u32,
    #[serde(default = "default_object_placement_attempts")]
    pub object_placement_attempts: u32,
    /// Whole-load restarts allowed after the first load.
    #[serde(default = "default_max_load_restarts")]
    pub max_load_restarts: u32,
    /// Draws per entity before a placement batch gives up.
    #[serde(default = "default_max_sample_tries")]
    pub max_sample_tries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fixture_placement_attempts: 10,
            object_placement_attempts: 1,
            max_load_restarts: 50,
            max_sample_tries: 5000,
        }
    }
}

fn default_available_styles() -> Vec<u32> {
    (0..12).collect()
}

fn default_registries() -> Vec<String> {
    vec!["objaverse".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneParams {
    pub seed: u64,
    pub layouts: Vec<KitchenLayout>,
    #[serde(default = "default_available_styles")]
    pub available_style_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_and_style_ids: Option<Vec<(u32, u32)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_layouts: Vec<u32>,
    #[serde(default)]
    pub catalog: ObjectCatalog,
    #[serde(default = "default_registries")]
    pub obj_registries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_instance_split: Option<crate::catalog::Split>,
    #[serde(default)]
    pub task: TaskSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_robot_base_pos: Option<FixtureId>,
    #[serde(default)]
    pub randomize_cameras: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_meta: Option<EpisodeMeta>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

// -- Tests ---------------------------------------------------------
