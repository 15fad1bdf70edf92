//! Small kitchen layouts and an object catalog shared by unit tests.

use indexmap::IndexMap;

use crate::catalog::{ObjectCatalog, ObjectCategory, ObjectInstance};
use crate::fixtures::FixtureKind;
use crate::geometry::Vec3;
use crate::types::{
    FixtureSpec, KitchenLayout, LayoutTags, Placement, ResetRegion, RetryPolicy, RotationSpec,
    SampleRegionArgs, SceneParams, TaskSpec,
};

pub fn fixture(name: &str, kind: FixtureKind, pos: Vec3, size: Vec3) -> FixtureSpec {
    FixtureSpec {
        name: name.to_string(),
        kind,
        pos,
        rot: 0.0,
        size,
        reset_regions: IndexMap::new(),
        placement: None,
    }
}

fn with_region(mut spec: FixtureSpec, name: &str, offset: Vec3, size: [f64; 2]) -> FixtureSpec {
    spec.reset_regions.insert(name.to_string(), ResetRegion { offset, size });
    spec
}

fn on_counter_region(region: &str, size: [f64; 2], pos: [f64; 2]) -> Placement {
    Placement {
        sample_region_kwargs: SampleRegionArgs {
            region: Some(region.to_string()),
            ..SampleRegionArgs::default()
        },
        rotation: Some(RotationSpec::Range([0.0, 0.0])),
        ..Placement::on("counter_main_main_group", size).at(pos[0], pos[1])
    }
}

/// One wall of counters with a sink, stove, wall cabinet, microwave,
/// fridge, and two appliances placed on the counter. No island.
pub fn demo_layout() -> KitchenLayout {
    let counter = fixture(
        "counter_main_main_group",
        FixtureKind::Counter,
        [2.0, -0.3, 0.46],
        [2.4, 0.65, 0.92],
    );
    let counter = with_region(counter, "left", [-0.7, 0.0, 0.46], [0.9, 0.6]);
    let counter = with_region(counter, "right", [0.75, 0.0, 0.46], [0.8, 0.6]);

    let cab = fixture(
        "cab_main_main_group",
        FixtureKind::HingeCabinet,
        [2.0, -0.45, 1.7],
        [1.2, 0.35, 0.7],
    );
    let cab = with_region(cab, "int", [0.0, 0.0, -0.3], [1.1, 0.3]);

    let mut toaster = fixture("toaster_main_group", FixtureKind::Toaster, [0.0; 3], [0.3, 0.2, 0.2]);
    toaster.placement = Some(on_counter_region("right", [0.7, 0.5], [0.0, 0.0]));
    let mut coffee = fixture(
        "coffee_machine_main_group",
        FixtureKind::CoffeeMachine,
        [0.0; 3],
        [0.3, 0.3, 0.4],
    );
    coffee.placement = Some(on_counter_region("left", [0.5, 0.35], [-1.0, 1.0]));

    KitchenLayout {
        id: 0,
        name: "one_wall_small".to_string(),
        tags: LayoutTags::default(),
        fixtures: vec![
            counter,
            fixture("sink_main_group", FixtureKind::Sink, [2.0, -0.3, 0.9], [0.6, 0.5, 0.2]),
            fixture("stove_main_group", FixtureKind::Stove, [3.6, -0.3, 0.46], [0.76, 0.65, 0.92]),
            cab,
            fixture(
                "microwave_main_group",
                FixtureKind::Microwave,
                [4.6, -0.4, 1.45],
                [0.6, 0.4, 0.35],
            ),
            fixture("fridge_main_group", FixtureKind::Fridge, [0.3, -0.35, 0.9], [0.9, 0.75, 1.8]),
            toaster,
            coffee,
        ],
    }
}

/// `demo_layout` plus a free-standing island in front of the counter.
pub fn island_layout() -> KitchenLayout {
    let mut layout = demo_layout();
    layout.id = 1;
    layout.name = "one_wall_island".to_string();
    layout.tags.island = true;
    let island = fixture(
        "island_island_group",
        FixtureKind::Counter,
        [2.0, -1.8, 0.46],
        [1.8, 0.9, 0.92],
    );
    layout
        .fixtures
        .push(with_region(island, "top", [0.0, 0.0, 0.46], [1.6, 0.8]));
    layout
}

fn category(
    name: &str,
    groups: &[&str],
    graspable: bool,
    count: usize,
    size: Vec3,
) -> ObjectCategory {
    ObjectCategory {
        groups: groups.iter().map(|g| g.to_string()).collect(),
        graspable,
        washable: graspable,
        microwavable: false,
        cookable: !graspable,
        freezable: false,
        scale: 1.0,
        instances: (0..count)
            .map(|i| ObjectInstance {
                mjcf_path: format!("objects/objaverse/{name}_{i}/model.xml"),
                registry: "objaverse".to_string(),
                size,
            })
            .collect(),
    }
}

pub fn demo_catalog() -> ObjectCatalog {
    let mut apple = category("apple", &["fruit", "food"], true, 3, [0.08, 0.08, 0.08]);
    apple.instances.push(ObjectInstance {
        mjcf_path: "objects/aigen/apple_3/model.xml".to_string(),
        registry: "aigen".to_string(),
        size: [0.08, 0.08, 0.08],
    });
    let mut categories = IndexMap::new();
    categories.insert("apple".to_string(), apple);
    categories.insert(
        "banana".to_string(),
        category("banana", &["fruit", "food"], true, 1, [0.18, 0.06, 0.04]),
    );
    categories.insert(
        "cheese".to_string(),
        category("cheese", &["food", "in_container"], true, 1, [0.06, 0.06, 0.03]),
    );
    categories.insert(
        "bowl".to_string(),
        category("bowl", &["container"], true, 1, [0.16, 0.16, 0.06]),
    );
    categories.insert(
        "pot".to_string(),
        category("pot", &["cookware"], false, 1, [0.3, 0.3, 0.15]),
    );
    ObjectCatalog { categories }
}

/// Both demo layouts, the demo catalog, and `task` with `args`.
pub fn demo_params(seed: u64, task: &str, args: serde_json::Value) -> SceneParams {
    let args = match args {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    SceneParams {
        seed,
        layouts: vec![demo_layout(), island_layout()],
        available_style_ids: (0..12).collect(),
        layout_and_style_ids: None,
        layout_ids: None,
        style_ids: None,
        exclude_layouts: Vec::new(),
        catalog: demo_catalog(),
        obj_registries: vec!["objaverse".to_string()],
        obj_instance_split: None,
        task: TaskSpec {
            name: task.to_string(),
            args,
        },
        init_robot_base_pos: None,
        randomize_cameras: false,
        episode_meta: None,
        retry: RetryPolicy::default(),
    }
}
