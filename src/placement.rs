//! Placement sampling.
//!
//! Each entity gets a `UniformSampler`: an x/y range in a reference
//! frame plus a rotation spec. A `PlacementInitializer` runs its
//! samplers in order, checking every candidate against everything
//! already placed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::SceneError;
use crate::fixtures::{FixtureRegistry, DEFAULT_MIN_REGION};
use crate::geometry::{
    boxes_collide, intersect_margin, relative_transform, rotated_half_extents, Frame,
    OrientedBox, Vec3,
};
use crate::prng::Pcg32;
use crate::rotation::{quat_about_axis, quat_mul, Axis, QuatWxyz};
use crate::types::{
    Extent, InnerPos, ObjectExtent, Placement, PosSymbol, RotationSpec, SampleArgs,
    DEFAULT_ROTATION,
};

/// Height above the reference surface at which objects are dropped.
pub const OBJECT_Z_OFFSET: f64 = 0.01;
pub const FIXTURE_Z_OFFSET: f64 = 0.0;
/// Padding added to symbolic sizes taken from the entity itself.
const OBJECT_SIZE_PAD: f64 = 0.005;

/// A sampled pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub pos: Vec3,
    /// (w, x, y, z)
    pub quat: QuatWxyz,
    /// Yaw of the footprint used for collision checks.
    pub yaw: f64,
    pub size: Vec3,
}

impl PlacedEntity {
    pub fn bounds(&self) -> OrientedBox {
        OrientedBox {
            center: self.pos,
            yaw: self.yaw,
            size: self.size,
        }
    }
}

/// Placed entities keyed by name, in placement order.
pub type Placements = IndexMap<String, PlacedEntity>;

#[derive(Debug, Clone)]
pub struct UniformSampler {
    pub name: String,
    pub size: Vec3,
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    pub rotation: RotationSpec,
    pub rotation_axis: Axis,
    pub ensure_object_boundary_in_range: bool,
    pub ensure_valid_placement: bool,
    pub reference: Frame,
    pub z_offset: f64,
    pub sample_args: Option<SampleArgs>,
}

fn sample_axis(rng: &mut Pcg32, range: [f64; 2], half_extent: f64) -> f64 {
    let mut lo = range[0] + half_extent;
    let mut hi = range[1] - half_extent;
    if lo > hi {
        let mid = (range[0] + range[1]) / 2.0;
        lo = mid;
        hi = mid;
    }
    rng.uniform(lo, hi)
}

impl UniformSampler {
    fn reference_frame(&self, placed: &Placements) -> Result<Frame, SceneError> {
        let Some(args) = &self.sample_args else {
            return Ok(self.reference);
        };
        let base = placed.get(&args.reference).ok_or_else(|| {
            SceneError::InvalidConfig(format!(
                "{} is placed relative to {}, which is not placed",
                self.name, args.reference
            ))
        })?;
        let mut pos = base.pos;
        if args.on_top {
            pos[2] += base.size[2] / 2.0;
        }
        Ok(Frame::new(pos, self.reference.yaw))
    }

    /// Draw poses until one is collision free. Each try consumes the
    /// rotation draw (if any) followed by x then y.
    pub fn sample(
        &self,
        rng: &mut Pcg32,
        placed: &Placements,
        max_tries: u32,
    ) -> Result<PlacedEntity, SceneError> {
        let frame = self.reference_frame(placed)?;
        for attempt in 0..max_tries {
            let rot = match self.rotation {
                RotationSpec::Fixed(v) => v,
                RotationSpec::Range([lo, hi]) => rng.uniform(lo, hi),
            };
            let footprint_rot = if self.rotation_axis == Axis::Z { rot } else { 0.0 };
            let (hx, hy) = if self.ensure_object_boundary_in_range {
                rotated_half_extents([self.size[0], self.size[1]], footprint_rot)
            } else {
                (0.0, 0.0)
            };
            let x = sample_axis(rng, self.x_range, hx);
            let y = sample_axis(rng, self.y_range, hy);

            let pos = frame.to_world([x, y, self.z_offset + self.size[2] / 2.0]);
            let candidate = PlacedEntity {
                pos,
                quat: quat_mul(
                    quat_about_axis(Axis::Z, frame.yaw),
                    quat_about_axis(self.rotation_axis, rot),
                ),
                yaw: frame.yaw + footprint_rot,
                size: self.size,
            };

            if self.ensure_valid_placement {
                let bounds = candidate.bounds();
                if let Some((other, _)) = placed
                    .iter()
                    .find(|(_, p)| boxes_collide(&bounds, &p.bounds()))
                {
                    trace!(entity = %self.name, attempt, blocker = %other, "placement collides");
                    continue;
                }
            }
            return Ok(candidate);
        }
        Err(SceneError::Randomization {
            entity: self.name.clone(),
        })
    }
}

/// Samplers run in insertion order.
#[derive(Debug, Clone)]
pub struct PlacementInitializer {
    samplers: Vec<UniformSampler>,
    max_tries: u32,
}

impl PlacementInitializer {
    pub fn new(max_tries: u32) -> Self {
        PlacementInitializer {
            samplers: Vec::new(),
            max_tries,
        }
    }

    pub fn append(&mut self, sampler: UniformSampler) {
        self.samplers.push(sampler);
    }

    pub fn samplers(&self) -> &[UniformSampler] {
        &self.samplers
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }

    /// Place every entity. `placed` holds entities that are already in
    /// the scene; they block new placements but are not returned.
    pub fn sample(
        &self,
        rng: &mut Pcg32,
        placed: Option<&Placements>,
    ) -> Result<Placements, SceneError> {
        let mut occupied = placed.cloned().unwrap_or_default();
        let mut out = Placements::new();
        for sampler in &self.samplers {
            let entity = sampler.sample(rng, &occupied, self.max_tries)?;
            debug!(entity = %sampler.name, pos = ?entity.pos, "placed");
            occupied.insert(sampler.name.clone(), entity.clone());
            out.insert(sampler.name.clone(), entity);
        }
        Ok(out)
    }
}

// -- Building samplers from placement configs -----------------------

/// One entity to place.
#[derive(Debug, Clone, Copy)]
pub struct PlacementEntry<'a> {
    pub name: &'a str,
    pub size: Vec3,
    pub placement: &'a Placement,
}

fn resolve_extent(extent: Extent, axis: usize, size: Vec3) -> f64 {
    match extent {
        Extent::Value(v) => v,
        Extent::Object(ObjectExtent::SameAxis) => size[axis] + OBJECT_SIZE_PAD,
        Extent::Object(ObjectExtent::X) => size[0] + OBJECT_SIZE_PAD,
        Extent::Object(ObjectExtent::Y) => size[1] + OBJECT_SIZE_PAD,
    }
}

fn check_unit_interval(name: &str, pos: &[InnerPos; 2]) -> Result<(), SceneError> {
    for p in pos {
        if let InnerPos::Value(v) = p {
            if !(-1.0..=1.0).contains(v) {
                return Err(SceneError::InvalidConfig(format!(
                    "placement pos for {name} must be within [-1, 1], got {v}"
                )));
            }
        }
    }
    Ok(())
}

/// Derive the sampler for one entity.
///
/// With a fixture: the chosen reset region is shrunk by `margin`
/// (outer region), the inner region is `size` clamped to the outer
/// one, and `pos` slides the inner region within the outer one
/// before `offset` is added. Without a fixture the region is `size`
/// centred at the world origin.
pub fn build_sampler(
    registry: &FixtureRegistry,
    rng: &mut Pcg32,
    entry: PlacementEntry<'_>,
    z_offset: f64,
) -> Result<UniformSampler, SceneError> {
    let placement = entry.placement;
    check_unit_interval(entry.name, &placement.pos)?;
    let target = placement
        .size
        .map(|s| [resolve_extent(s[0], 0, entry.size), resolve_extent(s[1], 1, entry.size)]);

    let (x_range, y_range, reference) = match &placement.fixture {
        Some(id) => {
            let fixture =
                registry.resolve(id, placement.reference.as_ref(), DEFAULT_MIN_REGION, rng)?;
            let region =
                fixture.sample_reset_region(registry, &placement.sample_region_kwargs, rng)?;

            let outer = intersect_margin(region.size, placement.margin);
            let inner = match target {
                Some(t) => [outer[0].min(t[0]), outer[1].min(t[1])],
                None => outer,
            };
            let slack = [(outer[0] - inner[0]) / 2.0, (outer[1] - inner[1]) / 2.0];

            let mut shift = [0.0; 2];
            for axis in 0..2 {
                let pos = match placement.pos[axis] {
                    InnerPos::Value(v) => v,
                    InnerPos::Symbolic(PosSymbol::AlignWithRef) => {
                        if slack[axis] <= 0.0 {
                            0.0
                        } else {
                            let ref_id = placement.sample_region_kwargs.reference.as_ref().ok_or_else(|| {
                                SceneError::InvalidConfig(format!(
                                    "pos \"ref\" for {} needs sample_region_kwargs.ref",
                                    entry.name
                                ))
                            })?;
                            let target_fixture =
                                registry.resolve(ref_id, None, DEFAULT_MIN_REGION, rng)?;
                            let (to_ref, _) =
                                relative_transform(&fixture.frame(), &target_fixture.frame());
                            ((to_ref[axis] - region.offset[axis]) / slack[axis]).clamp(-1.0, 1.0)
                        }
                    }
                };
                shift[axis] = slack[axis] * pos + placement.offset[axis] + region.offset[axis];
            }

            let reference = Frame::new(
                [fixture.pos[0], fixture.pos[1], fixture.pos[2] + region.offset[2]],
                fixture.rot,
            );
            (
                [shift[0] - inner[0] / 2.0, shift[0] + inner[0] / 2.0],
                [shift[1] - inner[1] / 2.0, shift[1] + inner[1] / 2.0],
                reference,
            )
        }
        None => {
            let t = target.ok_or_else(|| {
                SceneError::InvalidConfig(format!(
                    "placement for {} has neither fixture nor size",
                    entry.name
                ))
            })?;
            ([-t[0] / 2.0, t[0] / 2.0], [-t[1] / 2.0, t[1] / 2.0], Frame::default())
        }
    };

    Ok(UniformSampler {
        name: entry.name.to_string(),
        size: entry.size,
        x_range,
        y_range,
        rotation: placement.rotation.unwrap_or(DEFAULT_ROTATION),
        rotation_axis: placement.rotation_axis,
        ensure_object_boundary_in_range: placement.ensure_object_boundary_in_range,
        ensure_valid_placement: placement.ensure_valid_placement,
        reference,
        z_offset,
        sample_args: placement.sample_args.clone(),
    })
}

/// Build a sequential initializer over `entries`.
pub fn build_initializer(
    registry: &FixtureRegistry,
    rng: &mut Pcg32,
    entries: &[PlacementEntry<'_>],
    z_offset: f64,
    max_tries: u32,
) -> Result<PlacementInitializer, SceneError> {
    let mut initializer = PlacementInitializer::new(max_tries);
    for entry in entries {
        initializer.append(build_sampler(registry, rng, *entry, z_offset)?);
    }
    Ok(initializer)
}
