//! Object asset catalog and the object sampler.
//!
//! Categories carry group tags and capability flags. Sampling filters
//! categories by the requested groups and flags, draws one category,
//! then draws one of its eligible instances.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SceneError;
use crate::geometry::Vec3;
use crate::prng::Pcg32;
use crate::types::ObjectConfig;

/// Pseudo-group matching every category.
pub const ALL_GROUPS: &str = "all";
/// Group tag of categories that should be placed inside a container.
pub const IN_CONTAINER_GROUP: &str = "in_container";

fn default_scale() -> f64 {
    1.0
}

fn default_registry() -> String {
    "objaverse".to_string()
}

/// Held-out instance split. `A` is the larger training portion of
/// each category, `B` the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    A,
    B,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInstance {
    pub mjcf_path: String,
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Bounding box at unit scale.
    pub size: Vec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCategory {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub graspable: bool,
    #[serde(default)]
    pub washable: bool,
    #[serde(default)]
    pub microwavable: bool,
    #[serde(default)]
    pub cookable: bool,
    #[serde(default)]
    pub freezable: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub instances: Vec<ObjectInstance>,
}

impl ObjectCategory {
    fn in_group(&self, name: &str, group: &str) -> bool {
        group == ALL_GROUPS || group == name || self.groups.iter().any(|g| g == group)
    }

    fn satisfies_flags(&self, cfg: &ObjectConfig) -> bool {
        let want = |flag: Option<bool>, have: bool| flag.map_or(true, |v| v == have);
        want(cfg.graspable, self.graspable)
            && want(cfg.washable, self.washable)
            && want(cfg.microwavable, self.microwavable)
            && want(cfg.cookable, self.cookable)
            && want(cfg.freezable, self.freezable)
    }

    /// Instances in `split`: A keeps the first max(n - 3, ceil(n / 2)).
    fn split_instances(&self, split: Option<Split>) -> &[ObjectInstance] {
        let n = self.instances.len();
        let cut = n.saturating_sub(3).max(n.div_ceil(2));
        match split {
            None => &self.instances,
            Some(Split::A) => &self.instances[..cut],
            Some(Split::B) => &self.instances[cut..],
        }
    }

    fn scaled_size(&self, instance: &ObjectInstance, object_scale: f64) -> Vec3 {
        let s = self.scale * object_scale;
        [instance.size[0] * s, instance.size[1] * s, instance.size[2] * s]
    }
}

/// The sampled asset, recorded in episode metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub mjcf_path: String,
    pub cat: String,
    /// Every group the sampled category belongs to: `all`, its own
    /// name, then its tagged groups.
    pub groups_containing_sampled_obj: Vec<String>,
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
    /// Scaled bounding box.
    pub size: Vec3,
}

impl ObjectInfo {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups_containing_sampled_obj.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectCatalog {
    pub categories: IndexMap<String, ObjectCategory>,
}

/// Filters shared by every draw in one episode.
#[derive(Debug, Clone, Copy)]
pub struct SampleFilter<'a> {
    pub registries: &'a [String],
    pub split: Option<Split>,
}

impl ObjectCatalog {
    fn eligible_instances<'c>(
        &self,
        category: &'c ObjectCategory,
        cfg: &ObjectConfig,
        filter: SampleFilter<'_>,
    ) -> Vec<&'c ObjectInstance> {
        let object_scale = cfg.object_scale.unwrap_or(1.0);
        category
            .split_instances(filter.split)
            .iter()
            .filter(|inst| filter.registries.iter().any(|r| *r == inst.registry))
            .filter(|inst| {
                let size = category.scaled_size(inst, object_scale);
                size.iter()
                    .zip(cfg.max_size.iter())
                    .all(|(s, max)| max.map_or(true, |m| *s <= m))
            })
            .collect()
    }

    fn info_for(
        &self,
        cat: &str,
        category: &ObjectCategory,
        instance: &ObjectInstance,
        cfg: &ObjectConfig,
        split: Option<Split>,
    ) -> ObjectInfo {
        let mut groups_containing_sampled_obj = vec![ALL_GROUPS.to_string(), cat.to_string()];
        for group in &category.groups {
            if !groups_containing_sampled_obj.contains(group) {
                groups_containing_sampled_obj.push(group.clone());
            }
        }
        ObjectInfo {
            mjcf_path: instance.mjcf_path.clone(),
            cat: cat.to_string(),
            groups_containing_sampled_obj,
            groups: cfg.obj_groups.clone(),
            split,
            size: category.scaled_size(instance, cfg.object_scale.unwrap_or(1.0)),
        }
    }

    /// Draw one asset matching `cfg`.
    ///
    /// Consumes one draw for the category and one for the instance.
    pub fn sample(
        &self,
        cfg: &ObjectConfig,
        filter: SampleFilter<'_>,
        rng: &mut Pcg32,
    ) -> Result<ObjectInfo, SceneError> {
        let candidates: Vec<(&String, &ObjectCategory)> = self
            .categories
            .iter()
            .filter(|(name, c)| cfg.obj_groups.iter().any(|g| c.in_group(name, g)))
            .filter(|(name, c)| !cfg.exclude_obj_groups.iter().any(|g| c.in_group(name, g)))
            .filter(|(_, c)| c.satisfies_flags(cfg))
            .filter(|(_, c)| !self.eligible_instances(c, cfg, filter).is_empty())
            .collect();

        let no_match = || SceneError::NoValidObject {
            groups: cfg.obj_groups.clone(),
        };
        let &(cat, category) = rng.choose(&candidates).ok_or_else(no_match)?;
        let instances = self.eligible_instances(category, cfg, filter);
        let instance = *rng.choose(&instances).ok_or_else(no_match)?;
        debug!(cat = %cat, path = %instance.mjcf_path, "sampled object");
        Ok(self.info_for(cat, category, instance, cfg, filter.split))
    }

    /// Exact asset lookup for replay. Ignores every filter.
    pub fn lookup_path(&self, cfg: &ObjectConfig, mjcf_path: &str) -> Result<ObjectInfo, SceneError> {
        self.categories
            .iter()
            .find_map(|(cat, category)| {
                category
                    .instances
                    .iter()
                    .find(|inst| inst.mjcf_path == mjcf_path)
                    .map(|inst| self.info_for(cat, category, inst, cfg, None))
            })
            .ok_or_else(|| SceneError::UnknownObjectPath(mjcf_path.to_string()))
    }
}
