//! Episode metadata: everything needed to rebuild an episode.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cameras::CameraConfigs;
use crate::catalog::ObjectInfo;
use crate::fixtures::{FixtureKind, FixtureRegistry, FixtureRefs};
use crate::types::ObjectConfig;

/// An object config together with the asset sampled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(flatten)]
    pub config: ObjectConfig,
    pub info: ObjectInfo,
}

impl ObjectRecord {
    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub cls: FixtureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub layout_id: u32,
    pub style_id: u32,
    pub object_cfgs: Vec<ObjectRecord>,
    pub fixtures: IndexMap<String, FixtureRecord>,
    pub fixture_refs: IndexMap<String, String>,
    pub cam_configs: CameraConfigs,
    #[serde(default)]
    pub lang: String,
}

impl EpisodeMeta {
    pub fn new(
        layout_id: u32,
        style_id: u32,
        objects: &[ObjectRecord],
        registry: &FixtureRegistry,
        refs: &FixtureRefs,
        cam_configs: &CameraConfigs,
        lang: String,
    ) -> Self {
        EpisodeMeta {
            layout_id,
            style_id,
            object_cfgs: objects.to_vec(),
            fixtures: registry
                .iter()
                .map(|f| (f.name.clone(), FixtureRecord { cls: f.kind }))
                .collect(),
            fixture_refs: refs.as_map().clone(),
            cam_configs: cam_configs.clone(),
            lang,
        }
    }

    pub fn object(&self, name: &str) -> Option<&ObjectRecord> {
        self.object_cfgs.iter().find(|r| r.name() == name)
    }
}

/// Category of the named object with underscores spelled as spaces.
pub fn obj_lang(objects: &[ObjectRecord], name: &str) -> Option<String> {
    objects
        .iter()
        .find(|r| r.name() == name)
        .map(|r| r.info.cat.replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::default_cameras;
    use crate::test_support::{demo_catalog, demo_layout};

    fn record(name: &str, path: &str) -> ObjectRecord {
        let config = ObjectConfig::named(name, &["all".to_string()]);
        let info = demo_catalog().lookup_path(&config, path).unwrap();
        ObjectRecord { config, info }
    }

    #[test]
    fn json_shape() {
        let registry = FixtureRegistry::from_layout(&demo_layout()).unwrap();
        let mut refs = FixtureRefs::default();
        refs.bind("sink", "sink_main_group");
        let objects = vec![record("obj", "objects/objaverse/banana_0/model.xml")];
        let meta = EpisodeMeta::new(0, 3, &objects, &registry, &refs, &default_cameras(), String::new());
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["fixtures"]["sink_main_group"]["cls"], "Sink");
        assert_eq!(value["fixture_refs"]["sink"], "sink_main_group");
        // Config fields sit next to `info`.
        assert_eq!(value["object_cfgs"][0]["name"], "obj");
        assert_eq!(value["object_cfgs"][0]["info"]["cat"], "banana");

        let back: EpisodeMeta = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn object_language() {
        let mut objects = vec![record("obj", "objects/objaverse/banana_0/model.xml")];
        objects[0].info.cat = "hot_dog_bun".to_string();
        assert_eq!(obj_lang(&objects, "obj").as_deref(), Some("hot dog bun"));
        assert_eq!(obj_lang(&objects, "missing"), None);
    }
}
