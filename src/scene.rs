//! Scene assembly.
//!
//! One load runs: select layout/style, build fixtures, place fixtures,
//! bind task roles, sample objects (expanding containers), place
//! objects, then derive the robot base pose. A placement failure
//! restarts the whole load, up to `RetryPolicy::max_load_restarts`
//! extra loads.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{object_joint, SimBackend};
use crate::cameras::{default_cameras, randomize_cameras, viewer_camera, CameraConfigs, ViewerCamera};
use crate::catalog::{ObjectCatalog, SampleFilter, IN_CONTAINER_GROUP};
use crate::error::SceneError;
use crate::fixtures::{FixtureKind, FixtureRefs, FixtureRegistry, DEFAULT_MIN_REGION};
use crate::geometry::Vec3;
use crate::layouts::LayoutSelection;
use crate::metadata::{EpisodeMeta, ObjectRecord};
use crate::placement::{
    build_initializer, PlacementEntry, PlacementInitializer, Placements, FIXTURE_Z_OFFSET,
    OBJECT_Z_OFFSET,
};
use crate::prng::Pcg32;
use crate::robot::{pick_anchor, robot_base_pose, RobotBasePose};
use crate::tasks::{KitchenTask, TaskContext, TaskRegistry};
use crate::types::{Extent, ObjectConfig, Placement, SampleArgs, SceneParams};

/// Final pose of one fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixturePose {
    pub kind: FixtureKind,
    pub pos: Vec3,
    pub rot: f64,
    pub size: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneResult {
    pub layout_id: u32,
    pub style_id: u32,
    pub fixtures: IndexMap<String, FixturePose>,
    /// Fixtures that carried a placement, as sampled.
    pub fixture_placements: Placements,
    pub object_placements: Placements,
    pub robot_base: RobotBasePose,
    pub cam_configs: CameraConfigs,
    pub viewer_camera: ViewerCamera,
    pub ep_meta: EpisodeMeta,
    /// Loads run, including the successful one.
    pub load_attempts: u32,
}

impl SceneResult {
    /// Write every object placement to its free joint.
    pub fn reset(&self, backend: &mut dyn SimBackend) -> Result<(), SceneError> {
        for (name, placed) in &self.object_placements {
            backend.set_free_joint_pose(&object_joint(name), placed.pos, placed.quat)?;
        }
        Ok(())
    }
}

/// Assemble one episode with the built-in tasks.
pub fn assemble(params: &SceneParams) -> Result<SceneResult, SceneError> {
    assemble_with(params, &TaskRegistry::with_defaults())
}

pub fn assemble_with(params: &SceneParams, tasks: &TaskRegistry) -> Result<SceneResult, SceneError> {
    let task = tasks.create(&params.task)?;
    let mut rng = Pcg32::new(params.seed, 0);
    let selection = match params.episode_meta {
        Some(_) => None,
        None => Some(LayoutSelection::from_params(params, &task.excluded_layouts())?),
    };

    let attempts = params.retry.max_load_restarts.saturating_add(1);
    for attempt in 1..=attempts {
        match load_once(params, task.as_ref(), selection.as_ref(), &mut rng) {
            Ok(mut result) => {
                result.load_attempts = attempt;
                info!(
                    task = task.name(),
                    layout = result.layout_id,
                    style = result.style_id,
                    attempt,
                    "scene assembled"
                );
                return Ok(result);
            }
            Err(e) if e.is_randomization() => {
                warn!(attempt, error = %e, "scene load failed, restarting");
            }
            Err(e) => return Err(e),
        }
    }
    Err(SceneError::LoadExhausted { attempts })
}

/// JSON params in, JSON result out.
pub fn assemble_json(params_json: &str) -> Result<String, SceneError> {
    let params: SceneParams = serde_json::from_str(params_json)?;
    let result = assemble(&params)?;
    Ok(serde_json::to_string(&result)?)
}

/// Assemble one episode per seed in parallel. Episodes share nothing,
/// so each result equals a sequential `assemble` with that seed.
pub fn assemble_many(params: &SceneParams, seeds: &[u64]) -> Vec<Result<SceneResult, SceneError>> {
    let tasks = TaskRegistry::with_defaults();
    seeds
        .par_iter()
        .map(|&seed| {
            let params = SceneParams {
                seed,
                ..params.clone()
            };
            assemble_with(&params, &tasks)
        })
        .collect()
}

fn load_once(
    params: &SceneParams,
    task: &dyn KitchenTask,
    selection: Option<&LayoutSelection>,
    rng: &mut Pcg32,
) -> Result<SceneResult, SceneError> {
    let replay = params.episode_meta.as_ref();

    let (layout_id, style_id) = match (replay, selection) {
        (Some(meta), _) => (meta.layout_id, meta.style_id),
        (None, Some(selection)) => selection.choose(rng)?,
        (None, None) => {
            return Err(SceneError::InvalidConfig("no layout selection".to_string()));
        }
    };
    info!(layout_id, style_id, replay = replay.is_some(), "loading kitchen");

    let layout = params
        .layouts
        .iter()
        .find(|l| l.id == layout_id)
        .ok_or_else(|| SceneError::InvalidConfig(format!("unknown layout {layout_id}")))?;
    let mut registry = FixtureRegistry::from_layout(layout)?;

    let cam_configs = match replay {
        Some(meta) => meta.cam_configs.clone(),
        None => {
            let mut cams = default_cameras();
            if params.randomize_cameras {
                randomize_cameras(&mut cams, rng);
            }
            cams
        }
    };

    // Fixtures
    let fixture_entries: Vec<PlacementEntry<'_>> = layout
        .fixtures
        .iter()
        .filter_map(|spec| {
            spec.placement.as_ref().map(|placement| PlacementEntry {
                name: &spec.name,
                size: spec.size,
                placement,
            })
        })
        .collect();
    let fixture_placements = if fixture_entries.is_empty() {
        Placements::new()
    } else {
        let initializer = build_initializer(
            &registry,
            rng,
            &fixture_entries,
            FIXTURE_Z_OFFSET,
            params.retry.max_sample_tries,
        )?;
        let placed = sample_with_retries(
            &initializer,
            rng,
            None,
            params.retry.fixture_placement_attempts,
            "fixtures",
        )?;
        for (name, entity) in &placed {
            registry.set_pose(name, entity.pos, entity.yaw)?;
        }
        placed
    };

    // Roles
    let mut refs = FixtureRefs::default();
    if let Some(meta) = replay {
        for (role, name) in &meta.fixture_refs {
            if registry.get(name).is_none() {
                return Err(SceneError::UnknownFixture(name.clone()));
            }
            refs.bind(role, name);
        }
    }
    let mut ctx = TaskContext {
        registry: &registry,
        refs: &mut refs,
        rng: &mut *rng,
    };
    task.setup_refs(&mut ctx)?;

    // Objects
    let records = match replay {
        Some(meta) => meta
            .object_cfgs
            .iter()
            .map(|r| -> Result<ObjectRecord, SceneError> {
                let info = params.catalog.lookup_path(&r.config, &r.info.mjcf_path)?;
                Ok(ObjectRecord {
                    config: r.config.clone(),
                    info,
                })
            })
            .collect::<Result<Vec<_>, SceneError>>()?,
        None => {
            let cfgs = task.object_cfgs(&mut ctx)?;
            let filter = SampleFilter {
                registries: &params.obj_registries,
                split: params.obj_instance_split,
            };
            sample_objects(cfgs, &params.catalog, filter, ctx.rng)?
        }
    };

    let object_entries: Vec<PlacementEntry<'_>> = records
        .iter()
        .filter_map(|r| {
            r.config.placement.as_ref().map(|placement| PlacementEntry {
                name: r.name(),
                size: r.info.size,
                placement,
            })
        })
        .collect();
    let object_placements = if object_entries.is_empty() {
        Placements::new()
    } else {
        let initializer = build_initializer(
            &registry,
            rng,
            &object_entries,
            OBJECT_Z_OFFSET,
            params.retry.max_sample_tries,
        )?;
        sample_with_retries(
            &initializer,
            rng,
            Some(&fixture_placements),
            params.retry.object_placement_attempts,
            "objects",
        )?
    };

    // Robot
    let anchor = match (&params.init_robot_base_pos, task.robot_anchor()) {
        (Some(id), _) => registry.resolve(id, None, DEFAULT_MIN_REGION, rng)?,
        (None, Some(role)) => {
            let name = refs
                .get(role)
                .ok_or_else(|| SceneError::UnknownFixture(format!("role {role}")))?;
            registry
                .get(name)
                .ok_or_else(|| SceneError::UnknownFixture(name.to_string()))?
        }
        (None, None) => pick_anchor(&registry, rng)?,
    };
    let robot_base = robot_base_pose(&registry, anchor, [0.0, 0.0]);

    let lang = task.lang(&records);
    let ep_meta = EpisodeMeta::new(
        layout_id,
        style_id,
        &records,
        &registry,
        &refs,
        &cam_configs,
        lang,
    );

    Ok(SceneResult {
        layout_id,
        style_id,
        fixtures: registry
            .iter()
            .map(|f| {
                let pose = FixturePose {
                    kind: f.kind,
                    pos: f.pos,
                    rot: f.rot,
                    size: f.size,
                };
                (f.name.clone(), pose)
            })
            .collect(),
        fixture_placements,
        object_placements,
        robot_base,
        cam_configs,
        viewer_camera: viewer_camera(layout_id),
        ep_meta,
        load_attempts: 0,
    })
}

/// Run a placement batch up to `attempts` times. Exhaustion is a
/// randomization failure naming `stage`.
fn sample_with_retries(
    initializer: &PlacementInitializer,
    rng: &mut Pcg32,
    placed: Option<&Placements>,
    attempts: u32,
    stage: &str,
) -> Result<Placements, SceneError> {
    for attempt in 1..=attempts {
        match initializer.sample(rng, placed) {
            Ok(out) => return Ok(out),
            Err(e) if e.is_randomization() => {
                debug!(stage, attempt, error = %e, "placement batch failed");
            }
            Err(e) => return Err(e),
        }
    }
    Err(SceneError::Randomization {
        entity: stage.to_string(),
    })
}

/// Sample an asset for every config. Objects that land in the
/// `in_container` group and ask for `try_to_place_in` get a container
/// config, and every container is listed before the objects.
fn sample_objects(
    cfgs: Vec<ObjectConfig>,
    catalog: &ObjectCatalog,
    filter: SampleFilter<'_>,
    rng: &mut Pcg32,
) -> Result<Vec<ObjectRecord>, SceneError> {
    let mut containers = Vec::new();
    let mut objects = Vec::with_capacity(cfgs.len());
    for (n, mut cfg) in cfgs.into_iter().enumerate() {
        let name = cfg
            .name
            .get_or_insert_with(|| format!("obj_{}", n + 1))
            .clone();
        let info = catalog.sample(&cfg, filter, rng)?;
        let wants_container = cfg
            .placement
            .as_ref()
            .is_some_and(|p| p.try_to_place_in.is_some());
        if wants_container {
            if info.in_group(IN_CONTAINER_GROUP) {
                containers.push(expand_container(&mut cfg, &name, catalog, filter, rng)?);
            } else {
                debug!(object = %name, cat = %info.cat, "not a container object, placing directly");
            }
        }
        objects.push(ObjectRecord { config: cfg, info });
    }
    containers.extend(objects);
    Ok(containers)
}

/// Move `cfg`'s placement onto a new container and put `cfg` on top
/// of it.
fn expand_container(
    cfg: &mut ObjectConfig,
    name: &str,
    catalog: &ObjectCatalog,
    filter: SampleFilter<'_>,
    rng: &mut Pcg32,
) -> Result<ObjectRecord, SceneError> {
    let mut placement = cfg.placement.take().unwrap_or_default();
    let groups = placement.try_to_place_in.take().unwrap_or_default();
    let container_args = placement.container_kwargs.take();

    let container_name = format!("{name}_container");
    let mut container = ObjectConfig {
        name: Some(container_name.clone()),
        obj_groups: groups,
        placement: Some(placement),
        ..ObjectConfig::default()
    };
    if let Some(args) = &container_args {
        container.apply_container_args(args);
    }
    let info = catalog.sample(&container, filter, rng)?;
    debug!(object = %name, container = %info.cat, "placing object in container");

    cfg.placement = Some(Placement {
        size: Some([Extent::Value(0.01); 2]),
        ensure_object_boundary_in_range: false,
        sample_args: Some(SampleArgs {
            reference: container_name,
            on_top: true,
        }),
        ..Placement::default()
    });
    Ok(ObjectRecord {
        config: container,
        info,
    })
}
