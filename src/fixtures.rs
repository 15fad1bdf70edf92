//! Fixture registry and typed lookup.
//!
//! Fixtures are kept in layout declaration order. Every lookup that has
//! to pick between several candidates draws from the episode PRNG, so
//! the order of iteration is part of the replay contract.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SceneError;
use crate::geometry::{pairwise_distance, point_in_region, Frame, OrientedBox, Vec3};
use crate::prng::Pcg32;
use crate::types::{FixtureSpec, KitchenLayout, ResetRegion, SampleRegionArgs};

/// Regions smaller than this do not count when filtering counters.
pub const DEFAULT_MIN_REGION: [f64; 2] = [0.2, 0.2];
/// Candidates within this distance of the nearest one are treated as
/// tied and picked at random.
const NEAR_TIE_TOLERANCE: f64 = 0.10;
/// Cabinets whose centre is above this height are wall cabinets.
const CABINET_TOP_MIN_Z: f64 = 1.0;

/// Concrete class of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureKind {
    Counter,
    Stove,
    Stovetop,
    Oven,
    Sink,
    Microwave,
    Fridge,
    Dishwasher,
    Hood,
    CoffeeMachine,
    Toaster,
    SingleCabinet,
    HingeCabinet,
    OpenCabinet,
    HousingCabinet,
    Drawer,
    Wall,
    Floor,
    Accessory,
}

impl FixtureKind {
    /// Fixtures the robot can stand in front of.
    pub fn supports_robot_base(self) -> bool {
        matches!(
            self,
            FixtureKind::Counter
                | FixtureKind::Stove
                | FixtureKind::Stovetop
                | FixtureKind::HousingCabinet
                | FixtureKind::Fridge
        )
    }

    /// Fixtures that may anchor the robot when no anchor is configured.
    pub fn is_robot_anchor(self) -> bool {
        matches!(
            self,
            FixtureKind::Sink
                | FixtureKind::CoffeeMachine
                | FixtureKind::Toaster
                | FixtureKind::Stove
                | FixtureKind::Stovetop
                | FixtureKind::SingleCabinet
                | FixtureKind::HingeCabinet
                | FixtureKind::OpenCabinet
                | FixtureKind::Drawer
                | FixtureKind::Microwave
                | FixtureKind::Hood
                | FixtureKind::Oven
                | FixtureKind::Fridge
                | FixtureKind::Dishwasher
        )
    }

    /// Tall standing fixtures keep the robot further back.
    pub fn is_tall_standing(self) -> bool {
        matches!(self, FixtureKind::HousingCabinet | FixtureKind::Fridge)
    }

    fn is_storage_cabinet(self) -> bool {
        matches!(
            self,
            FixtureKind::SingleCabinet | FixtureKind::HingeCabinet | FixtureKind::OpenCabinet
        )
    }
}

impl fmt::Display for FixtureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Semantic fixture type used in queries. Some types cover several
/// classes, and some narrow a class by name or height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureType {
    Counter,
    CounterNonCorner,
    Island,
    Cabinet,
    CabinetTop,
    Drawer,
    Stove,
    Stovetop,
    Oven,
    Sink,
    Microwave,
    Fridge,
    Dishwasher,
    Hood,
    CoffeeMachine,
    Toaster,
}

impl FixtureType {
    pub fn matches(self, fixture: &Fixture) -> bool {
        use FixtureKind as K;
        let kind = fixture.kind;
        match self {
            FixtureType::Counter => kind == K::Counter,
            FixtureType::CounterNonCorner => {
                kind == K::Counter && !fixture.name.contains("corner")
            }
            FixtureType::Island => kind == K::Counter && fixture.name.contains("island"),
            FixtureType::Cabinet => kind.is_storage_cabinet(),
            FixtureType::CabinetTop => {
                kind.is_storage_cabinet() && fixture.pos[2] > CABINET_TOP_MIN_Z
            }
            FixtureType::Drawer => kind == K::Drawer,
            FixtureType::Stove => kind == K::Stove,
            FixtureType::Stovetop => kind == K::Stovetop,
            FixtureType::Oven => kind == K::Oven,
            FixtureType::Sink => kind == K::Sink,
            FixtureType::Microwave => kind == K::Microwave,
            FixtureType::Fridge => kind == K::Fridge,
            FixtureType::Dishwasher => kind == K::Dishwasher,
            FixtureType::Hood => kind == K::Hood,
            FixtureType::CoffeeMachine => kind == K::CoffeeMachine,
            FixtureType::Toaster => kind == K::Toaster,
        }
    }

    /// Counter-like types are additionally filtered by region size.
    pub fn is_counter_like(self) -> bool {
        matches!(
            self,
            FixtureType::Counter | FixtureType::CounterNonCorner | FixtureType::Island
        )
    }
}

/// How a fixture is named in configs: a semantic type, or a name that
/// matches exactly or, failing that, as a substring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureId {
    Typed {
        #[serde(rename = "type")]
        kind: FixtureType,
    },
    Name(String),
}

impl FixtureId {
    fn matches(&self, fixture: &Fixture) -> bool {
        match self {
            FixtureId::Typed { kind } => kind.matches(fixture),
            FixtureId::Name(pattern) => fixture.name.contains(pattern.as_str()),
        }
    }

    fn is_counter_like(&self) -> bool {
        matches!(self, FixtureId::Typed { kind } if kind.is_counter_like())
    }
}

impl From<FixtureType> for FixtureId {
    fn from(kind: FixtureType) -> Self {
        FixtureId::Typed { kind }
    }
}

impl From<&str> for FixtureId {
    fn from(name: &str) -> Self {
        FixtureId::Name(name.to_string())
    }
}

impl From<String> for FixtureId {
    fn from(name: String) -> Self {
        FixtureId::Name(name)
    }
}

impl From<&Fixture> for FixtureId {
    fn from(fixture: &Fixture) -> Self {
        FixtureId::Name(fixture.name.clone())
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureId::Typed { kind } => write!(f, "{kind:?}"),
            FixtureId::Name(name) => f.write_str(name),
        }
    }
}

/// A placed fixture instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub name: String,
    pub kind: FixtureKind,
    pub pos: Vec3,
    pub rot: f64,
    pub size: Vec3,
    reset_regions: IndexMap<String, ResetRegion>,
}

impl Fixture {
    pub fn from_spec(spec: &FixtureSpec) -> Self {
        let mut reset_regions = spec.reset_regions.clone();
        if reset_regions.is_empty() {
            // Whole top surface.
            reset_regions.insert(
                "top".to_string(),
                ResetRegion {
                    offset: [0.0, 0.0, spec.size[2] / 2.0],
                    size: [spec.size[0], spec.size[1]],
                },
            );
        }
        Fixture {
            name: spec.name.clone(),
            kind: spec.kind,
            pos: spec.pos,
            rot: spec.rot,
            size: spec.size,
            reset_regions,
        }
    }

    pub fn frame(&self) -> Frame {
        Frame::new(self.pos, self.rot)
    }

    pub fn bounds(&self) -> OrientedBox {
        OrientedBox {
            center: self.pos,
            yaw: self.rot,
            size: self.size,
        }
    }

    pub fn reset_regions(&self) -> &IndexMap<String, ResetRegion> {
        &self.reset_regions
    }

    /// True if `point` lies inside this fixture's footprint.
    pub fn contains_point_2d(&self, point: Vec3) -> bool {
        point_in_region(point, &self.bounds(), true)
    }

    pub fn has_region_at_least(&self, min_size: [f64; 2]) -> bool {
        self.reset_regions
            .values()
            .any(|r| r.size[0] >= min_size[0] && r.size[1] >= min_size[1])
    }

    /// World position of a region centre.
    pub fn region_center(&self, region: &ResetRegion) -> Vec3 {
        self.frame().to_world(region.offset)
    }

    /// Pick one reset region.
    ///
    /// A named region wins. Otherwise regions are filtered by
    /// `top_size`, then the one whose centre is closest to `ref` is
    /// taken, or a random one when there is no `ref`.
    pub fn sample_reset_region(
        &self,
        registry: &FixtureRegistry,
        args: &SampleRegionArgs,
        rng: &mut Pcg32,
    ) -> Result<ResetRegion, SceneError> {
        if let Some(name) = &args.region {
            return self.reset_regions.get(name).copied().ok_or_else(|| {
                SceneError::InvalidConfig(format!(
                    "fixture {} has no reset region {name}",
                    self.name
                ))
            });
        }
        let mut candidates: Vec<ResetRegion> = self.reset_regions.values().copied().collect();
        if let Some(min) = args.top_size {
            candidates.retain(|r| r.size[0] >= min[0] && r.size[1] >= min[1]);
        }
        if candidates.is_empty() {
            return Err(SceneError::NoValidFixture {
                id: format!("reset region on {}", self.name),
            });
        }
        match &args.reference {
            Some(reference) => {
                let target = registry.resolve(reference, None, DEFAULT_MIN_REGION, rng)?;
                let target = target.frame();
                let mut best = candidates[0];
                let mut best_dist = f64::INFINITY;
                for region in candidates {
                    let center = Frame::new(self.region_center(&region), 0.0);
                    let d = pairwise_distance(&center, &target);
                    if d < best_dist {
                        best = region;
                        best_dist = d;
                    }
                }
                Ok(best)
            }
            None => rng.choose(&candidates).copied().ok_or_else(|| {
                SceneError::NoValidFixture {
                    id: format!("reset region on {}", self.name),
                }
            }),
        }
    }
}

/// All fixtures of the loaded layout, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    fixtures: IndexMap<String, Fixture>,
}

impl FixtureRegistry {
    pub fn from_layout(layout: &KitchenLayout) -> Result<Self, SceneError> {
        let mut registry = FixtureRegistry::default();
        for spec in &layout.fixtures {
            registry.insert(Fixture::from_spec(spec))?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, fixture: Fixture) -> Result<(), SceneError> {
        if self.fixtures.contains_key(&fixture.name) {
            return Err(SceneError::InvalidConfig(format!(
                "duplicate fixture name {}",
                fixture.name
            )));
        }
        self.fixtures.insert(fixture.name.clone(), fixture);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.get(name)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    /// Move a fixture after placement.
    pub fn set_pose(&mut self, name: &str, pos: Vec3, rot: f64) -> Result<(), SceneError> {
        let fixture = self
            .fixtures
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownFixture(name.to_string()))?;
        fixture.pos = pos;
        fixture.rot = rot;
        Ok(())
    }

    /// Resolve a fixture identifier to one fixture.
    ///
    /// An exact name returns that fixture. Otherwise candidates are all
    /// fixtures matching `id`, restricted for counter-like types to
    /// those with a reset region of at least `min_size`. Without a
    /// reference one candidate is drawn at random. With a reference,
    /// the reference itself is excluded and the first candidate whose
    /// footprint contains the reference wins; otherwise the nearest
    /// candidates (within 0.10 of the minimum distance) are drawn from.
    pub fn resolve(
        &self,
        id: &FixtureId,
        reference: Option<&FixtureId>,
        min_size: [f64; 2],
        rng: &mut Pcg32,
    ) -> Result<&Fixture, SceneError> {
        if let FixtureId::Name(name) = id {
            if let Some(fixture) = self.fixtures.get(name) {
                return Ok(fixture);
            }
        }

        let mut candidates: Vec<&Fixture> = self
            .fixtures
            .values()
            .filter(|f| id.matches(f))
            .filter(|f| !id.is_counter_like() || f.has_region_at_least(min_size))
            .collect();

        let Some(reference) = reference else {
            let picked = rng.choose(&candidates).copied().ok_or_else(|| {
                SceneError::NoValidFixture { id: id.to_string() }
            })?;
            debug!(id = %id, fixture = %picked.name, "resolved fixture");
            return Ok(picked);
        };

        let anchor = self.resolve(reference, None, DEFAULT_MIN_REGION, rng)?;
        candidates.retain(|f| f.name != anchor.name);
        if candidates.is_empty() {
            return Err(SceneError::NoValidFixture {
                id: format!("{id} near {reference}"),
            });
        }

        if let Some(host) = candidates.iter().find(|f| f.contains_point_2d(anchor.pos)) {
            debug!(id = %id, reference = %anchor.name, fixture = %host.name, "resolved containing fixture");
            return Ok(*host);
        }

        let anchor_frame = anchor.frame();
        let dists: Vec<f64> = candidates
            .iter()
            .map(|f| pairwise_distance(&f.frame(), &anchor_frame))
            .collect();
        let min_dist = dists.iter().copied().fold(f64::INFINITY, f64::min);
        let close: Vec<&Fixture> = candidates
            .iter()
            .zip(&dists)
            .filter(|(_, d)| **d - min_dist < NEAR_TIE_TOLERANCE)
            .map(|(f, _)| *f)
            .collect();
        let picked = rng.choose(&close).copied().ok_or_else(|| {
            SceneError::NoValidFixture { id: id.to_string() }
        })?;
        debug!(id = %id, reference = %anchor.name, fixture = %picked.name, "resolved nearest fixture");
        Ok(picked)
    }
}

/// Arguments for resolving a role.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureQuery {
    pub id: FixtureId,
    pub reference: Option<FixtureId>,
    pub min_size: [f64; 2],
}

impl FixtureQuery {
    pub fn new(id: impl Into<FixtureId>) -> Self {
        FixtureQuery {
            id: id.into(),
            reference: None,
            min_size: DEFAULT_MIN_REGION,
        }
    }

    pub fn near(mut self, reference: impl Into<FixtureId>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Task roles ("counter", "cab", ...) bound to fixture names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureRefs {
    roles: IndexMap<String, String>,
}

impl FixtureRefs {
    /// Resolve `query` for `role`, or return the fixture already bound
    /// to it. A bound role never draws from the PRNG.
    pub fn register_role<'r>(
        &mut self,
        registry: &'r FixtureRegistry,
        role: &str,
        query: &FixtureQuery,
        rng: &mut Pcg32,
    ) -> Result<&'r Fixture, SceneError> {
        if let Some(name) = self.roles.get(role) {
            return registry
                .get(name)
                .ok_or_else(|| SceneError::UnknownFixture(name.clone()));
        }
        let fixture = registry.resolve(&query.id, query.reference.as_ref(), query.min_size, rng)?;
        self.roles.insert(role.to_string(), fixture.name.clone());
        Ok(fixture)
    }

    /// Bind a role directly, e.g. when restoring a recorded episode.
    pub fn bind(&mut self, role: &str, fixture_name: &str) {
        self.roles.insert(role.to_string(), fixture_name.to_string());
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(String::as_str)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{demo_layout, island_layout};

    fn registry(layout: &KitchenLayout) -> FixtureRegistry {
        FixtureRegistry::from_layout(layout).expect("valid layout")
    }

    #[test]
    fn exact_name_wins_and_draws_nothing() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(1, 0);
        let mut untouched = rng.clone();
        let f = reg
            .resolve(&"sink_main_group".into(), None, DEFAULT_MIN_REGION, &mut rng)
            .unwrap();
        assert_eq!(f.name, "sink_main_group");
        assert_eq!(rng.next_u32(), untouched.next_u32());
    }

    #[test]
    fn name_pattern_falls_back_to_substring() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(1, 0);
        let f = reg
            .resolve(&"fridge".into(), None, DEFAULT_MIN_REGION, &mut rng)
            .unwrap();
        assert_eq!(f.name, "fridge_main_group");
    }

    #[test]
    fn missing_type_is_an_error() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(1, 0);
        let err = reg
            .resolve(&FixtureType::Dishwasher.into(), None, DEFAULT_MIN_REGION, &mut rng)
            .unwrap_err();
        assert!(matches!(err, SceneError::NoValidFixture { .. }));
    }

    #[test]
    fn island_requires_island_name() {
        let mut rng = Pcg32::new(2, 0);
        let plain = registry(&demo_layout());
        assert!(plain
            .resolve(&FixtureType::Island.into(), None, DEFAULT_MIN_REGION, &mut rng)
            .is_err());
        let with_island = registry(&island_layout());
        let f = with_island
            .resolve(&FixtureType::Island.into(), None, DEFAULT_MIN_REGION, &mut rng)
            .unwrap();
        assert_eq!(f.name, "island_island_group");
    }

    #[test]
    fn cabinet_top_filters_by_height() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(3, 0);
        for _ in 0..10 {
            let f = reg
                .resolve(&FixtureType::CabinetTop.into(), None, DEFAULT_MIN_REGION, &mut rng)
                .unwrap();
            assert!(f.pos[2] > 1.0);
        }
    }

    #[test]
    fn counter_region_size_filter() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(4, 0);
        let err = reg
            .resolve(&FixtureType::Counter.into(), None, [5.0, 5.0], &mut rng)
            .unwrap_err();
        assert!(matches!(err, SceneError::NoValidFixture { .. }));
    }

    #[test]
    fn reference_inside_counter_picks_host() {
        // The sink sits inside the main counter footprint.
        let reg = registry(&island_layout());
        let mut rng = Pcg32::new(5, 0);
        let f = reg
            .resolve(
                &FixtureType::Counter.into(),
                Some(&"sink_main_group".into()),
                DEFAULT_MIN_REGION,
                &mut rng,
            )
            .unwrap();
        assert_eq!(f.name, "counter_main_main_group");
    }

    #[test]
    fn near_tie_draws_only_from_closest_candidates() {
        use crate::test_support::fixture;
        use crate::types::LayoutTags;
        let layout = KitchenLayout {
            id: 9,
            name: "scattered".to_string(),
            tags: LayoutTags::default(),
            fixtures: vec![
                fixture("microwave", FixtureKind::Microwave, [0.0, 0.0, 0.46], [0.4, 0.3, 0.3]),
                fixture("counter_a", FixtureKind::Counter, [1.0, 0.0, 0.46], [0.5, 0.5, 0.92]),
                fixture("counter_b", FixtureKind::Counter, [0.0, -1.05, 0.46], [0.5, 0.5, 0.92]),
                fixture("counter_far", FixtureKind::Counter, [-1.5, 0.0, 0.46], [0.5, 0.5, 0.92]),
            ],
        };
        let reg = registry(&layout);
        let mut seen = std::collections::BTreeSet::new();
        for seed in 0..200 {
            let mut rng = Pcg32::new(seed, 0);
            let f = reg
                .resolve(
                    &FixtureType::Counter.into(),
                    Some(&"microwave".into()),
                    DEFAULT_MIN_REGION,
                    &mut rng,
                )
                .unwrap();
            seen.insert(f.name.clone());
        }
        let expected: std::collections::BTreeSet<String> =
            ["counter_a", "counter_b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn reference_excluded_from_candidates() {
        let reg = registry(&island_layout());
        let mut rng = Pcg32::new(6, 0);
        let f = reg
            .resolve(
                &FixtureType::Counter.into(),
                Some(&"island_island_group".into()),
                DEFAULT_MIN_REGION,
                &mut rng,
            )
            .unwrap();
        assert_eq!(f.name, "counter_main_main_group");
    }

    #[test]
    fn region_closest_to_reference() {
        let reg = registry(&demo_layout());
        let counter = reg.get("counter_main_main_group").unwrap();
        let mut rng = Pcg32::new(7, 0);
        let args = SampleRegionArgs {
            reference: Some("stove_main_group".into()),
            ..SampleRegionArgs::default()
        };
        let region = counter.sample_reset_region(&reg, &args, &mut rng).unwrap();
        assert_eq!(region, counter.reset_regions()["right"]);
    }

    #[test]
    fn named_region_and_default_top() {
        let reg = registry(&demo_layout());
        let mut rng = Pcg32::new(8, 0);
        let cab = reg.get("cab_main_main_group").unwrap();
        let args = SampleRegionArgs {
            region: Some("int".into()),
            ..SampleRegionArgs::default()
        };
        assert_eq!(cab.sample_reset_region(&reg, &args, &mut rng).unwrap().size, [1.1, 0.3]);

        let stove = reg.get("stove_main_group").unwrap();
        let top = stove.reset_regions()["top"];
        assert_eq!(top.size, [stove.size[0], stove.size[1]]);
        assert_eq!(top.offset, [0.0, 0.0, stove.size[2] / 2.0]);

        let missing = SampleRegionArgs {
            region: Some("nope".into()),
            ..SampleRegionArgs::default()
        };
        assert!(stove.sample_reset_region(&reg, &missing, &mut rng).is_err());
    }

    #[test]
    fn roles_are_memoized() {
        let reg = registry(&island_layout());
        let mut refs = FixtureRefs::default();
        let mut rng = Pcg32::new(9, 0);
        let query = FixtureQuery::new(FixtureType::Counter);
        let first = reg_name(refs.register_role(&reg, "counter", &query, &mut rng));
        let mut after = rng.clone();
        let again = reg_name(refs.register_role(&reg, "counter", &query, &mut rng));
        assert_eq!(first, again);
        assert_eq!(rng.next_u32(), after.next_u32());
        assert_eq!(refs.get("counter"), Some(first.as_str()));
    }

    fn reg_name(res: Result<&Fixture, SceneError>) -> String {
        res.unwrap().name.clone()
    }

    #[test]
    fn fixture_id_json_forms() {
        let typed: FixtureId = serde_json::from_str(r#"{"type": "cabinet_top"}"#).unwrap();
        assert_eq!(typed, FixtureType::CabinetTop.into());
        let named: FixtureId = serde_json::from_str(r#""sink_main_group""#).unwrap();
        assert_eq!(named, "sink_main_group".into());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut layout = demo_layout();
        let dup = layout.fixtures[0].clone();
        layout.fixtures.push(dup);
        assert!(FixtureRegistry::from_layout(&layout).is_err());
    }
}
