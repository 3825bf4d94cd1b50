//! Reconciler lifecycle tests against a recording backend.
//!
//! Run with: `cargo test -p parallax-core`

use std::collections::HashSet;

use glam::Vec3;
use parallax_core::camera::CameraState;
use parallax_core::error::{ModelLoadError, SceneError};
use parallax_core::field::DataField;
use parallax_core::geometry::callout::CalloutLayout;
use parallax_core::scene::{
    EntityIdentity, LoadOutcome, LoadedModel, ModelTicket, NodeTransform, Primitive, Reconciler,
    SceneBackend,
};
use parallax_core::shape::{
    AnnotationShape, LengthUnit, ModelShape, PolylineShape, SceneOptions, Shape, ShapeId,
    ShapeKind, SphereShape, Vec3Fields,
};
use parallax_core::telemetry::{Field, Series, TelemetrySnapshot};
use parallax_core::{Bounds3, ViewAngleSettings};

/// Every call the reconciler makes, in order.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Spawn(String),
    SpawnModel(String, String),
    Rebuild(u32),
    Transform(u32, NodeTransform),
    Callout(u32, usize),
    Despawn(u32),
    Load(ModelTicket),
}

#[derive(Default)]
struct RecordingBackend {
    next_node: u32,
    live: HashSet<u32>,
    calls: Vec<Call>,
    fail_spawn: HashSet<String>,
}

impl RecordingBackend {
    fn spawns(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Spawn(_) | Call::SpawnModel(..)))
            .count()
    }

    fn despawns(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Despawn(_)))
            .count()
    }

    fn loads(&self) -> Vec<ModelTicket> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Load(ticket) => Some(ticket.clone()),
                _ => None,
            })
            .collect()
    }

    fn last_transform(&self, node: u32) -> Option<NodeTransform> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Transform(n, t) if *n == node => Some(*t),
            _ => None,
        })
    }

    fn alloc(&mut self) -> u32 {
        self.next_node += 1;
        self.live.insert(self.next_node);
        self.next_node
    }
}

impl SceneBackend for RecordingBackend {
    type Node = u32;
    type Model = String;

    fn spawn(&mut self, id: &ShapeId, _primitive: &Primitive) -> Result<u32, SceneError> {
        if self.fail_spawn.contains(id.as_str()) {
            return Err(SceneError::Spawn {
                id: id.clone(),
                reason: "refused".into(),
            });
        }
        self.calls.push(Call::Spawn(id.to_string()));
        Ok(self.alloc())
    }

    fn spawn_model(&mut self, id: &ShapeId, model: String) -> Result<u32, SceneError> {
        self.calls.push(Call::SpawnModel(id.to_string(), model));
        Ok(self.alloc())
    }

    fn rebuild(&mut self, node: &mut u32, _primitive: &Primitive) -> Result<(), SceneError> {
        self.calls.push(Call::Rebuild(*node));
        Ok(())
    }

    fn set_transform(&mut self, node: &u32, transform: &NodeTransform) {
        self.calls.push(Call::Transform(*node, *transform));
    }

    fn set_callout_layout(&mut self, node: &u32, index: usize, _layout: &CalloutLayout) {
        self.calls.push(Call::Callout(*node, index));
    }

    fn despawn(&mut self, node: u32) {
        assert!(self.live.remove(&node), "node {node} despawned twice");
        self.calls.push(Call::Despawn(node));
    }

    fn load_model(&mut self, ticket: ModelTicket) {
        self.calls.push(Call::Load(ticket));
    }
}

fn sphere(id: &str) -> Shape {
    Shape::new(id, ShapeKind::Sphere(SphereShape::default()))
}

fn model(id: &str, url: &str) -> Shape {
    Shape::new(
        id,
        ShapeKind::Model(ModelShape {
            url: Some(url.into()),
            ..Default::default()
        }),
    )
}

fn options(shapes: Vec<Shape>) -> SceneOptions {
    SceneOptions {
        shapes,
        ..Default::default()
    }
}

fn loaded(asset: &str) -> Result<LoadedModel<String>, ModelLoadError> {
    Ok(LoadedModel {
        asset: asset.to_string(),
        bounds: Some(Bounds3 {
            min: Vec3::splat(-5.0),
            max: Vec3::splat(5.0),
        }),
    })
}

fn empty() -> TelemetrySnapshot {
    TelemetrySnapshot::default()
}

#[test]
fn test_replacing_a_with_c_keeps_b() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();

    let first = reconciler.reconcile(&options(vec![sphere("A"), sphere("B")]), &empty(), &mut backend);
    assert_eq!(first.created, 2);
    let b_node = *reconciler.entity("B").unwrap().node();
    backend.calls.clear();

    let report = reconciler.reconcile(&options(vec![sphere("B"), sphere("C")]), &empty(), &mut backend);
    assert_eq!(report.created, 1);
    assert_eq!(report.destroyed, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(backend.spawns(), 1);
    assert_eq!(backend.despawns(), 1);
    assert_eq!(backend.calls[0], Call::Despawn(1));
    assert!(backend.calls.contains(&Call::Spawn("C".into())));
    assert!(!backend.calls.iter().any(|c| matches!(c, Call::Transform(n, _) if *n == b_node)));

    assert!(!reconciler.contains("A"));
    assert!(reconciler.contains("B"));
    assert!(reconciler.contains("C"));
    assert_eq!(reconciler.len(), backend.live.len());
}

#[test]
fn test_hidden_shape_is_destroyed() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    reconciler.reconcile(&options(vec![sphere("A")]), &empty(), &mut backend);

    let report = reconciler.reconcile(&options(vec![sphere("A").hidden()]), &empty(), &mut backend);
    assert_eq!(report.destroyed, 1);
    assert!(reconciler.is_empty());
    assert!(backend.live.is_empty());
}

#[test]
fn test_type_change_recreates() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    reconciler.reconcile(&options(vec![sphere("X")]), &empty(), &mut backend);

    let cube = Shape::new("X", ShapeKind::Model(ModelShape::default()));
    let report = reconciler.reconcile(&options(vec![cube]), &empty(), &mut backend);
    assert_eq!(report.recreated, 1);
    assert_eq!(reconciler.entity("X").unwrap().identity(), &EntityIdentity::Cube);
    assert_eq!(backend.live.len(), 1);
}

#[test]
fn test_sphere_moves_in_place_with_telemetry() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let shape = Shape::new(
        "sat",
        ShapeKind::Sphere(SphereShape {
            position: Vec3Fields {
                x: DataField::field("Nav.PosX"),
                ..Default::default()
            },
            ..Default::default()
        }),
    );
    let opts = options(vec![shape]);
    let at = |x: f64| {
        TelemetrySnapshot::new(vec![Series::new("Nav").with_field(Field::new("PosX", [x]))])
    };

    reconciler.reconcile(&opts, &at(1.0), &mut backend);
    let node = *reconciler.entity("sat").unwrap().node();
    let report = reconciler.reconcile(&opts, &at(7.0), &mut backend);

    assert_eq!(report.updated, 1);
    assert_eq!(backend.spawns(), 1);
    assert_eq!(
        backend.last_transform(node).unwrap().translation,
        Vec3::new(7.0, 0.0, 0.0)
    );
}

#[test]
fn test_sphere_radius_change_rebuilds_in_place() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    reconciler.reconcile(&options(vec![sphere("s")]), &empty(), &mut backend);

    let bigger = Shape::new(
        "s",
        ShapeKind::Sphere(SphereShape {
            radius: 4.0,
            ..Default::default()
        }),
    );
    reconciler.reconcile(&options(vec![bigger]), &empty(), &mut backend);
    assert!(backend.calls.contains(&Call::Rebuild(1)));
    assert_eq!(backend.despawns(), 0);
    assert_eq!(reconciler.entity("s").unwrap().metrics().original_size, Some(8.0));
}

#[test]
fn test_polyline_data_change_recreates() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let polyline = |xs: &str| {
        Shape::new(
            "path",
            ShapeKind::Polyline(PolylineShape {
                points: Vec3Fields {
                    x: DataField::constant(xs),
                    y: DataField::constant("0,0"),
                    z: DataField::constant("0,0"),
                },
                ..Default::default()
            }),
        )
    };
    reconciler.reconcile(&options(vec![polyline("0,1")]), &empty(), &mut backend);
    let report = reconciler.reconcile(&options(vec![polyline("0,2")]), &empty(), &mut backend);
    assert_eq!(report.recreated, 1);
    assert_eq!(backend.despawns(), 1);
    assert_eq!(backend.live.len(), 1);

    let unchanged = reconciler.reconcile(&options(vec![polyline("0,2")]), &empty(), &mut backend);
    assert_eq!(unchanged, Default::default());
}

#[test]
fn test_superseded_model_load_is_discarded() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();

    reconciler.reconcile(&options(vec![model("m", "first.glb")]), &empty(), &mut backend);
    reconciler.reconcile(&options(vec![model("m", "second.glb")]), &empty(), &mut backend);
    let loads = backend.loads();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].generation > loads[0].generation);

    // The second load finishes first, then the first one straggles in.
    let second = reconciler.complete_model_load(&loads[1], loaded("second-asset"), &mut backend);
    let first = reconciler.complete_model_load(&loads[0], loaded("first-asset"), &mut backend);
    assert_eq!(second, LoadOutcome::Applied);
    assert_eq!(first, LoadOutcome::Stale);

    let entity = reconciler.entity("m").unwrap();
    assert_eq!(
        entity.identity(),
        &EntityIdentity::Model {
            url: "second.glb".into()
        }
    );
    assert_eq!(entity.load_version(), loads[1].generation);
    assert_eq!(backend.spawns(), 1);
    assert!(backend.calls.contains(&Call::SpawnModel("m".into(), "second-asset".into())));
}

#[test]
fn test_stale_load_error_is_ignored() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();

    reconciler.reconcile(&options(vec![model("m", "a.glb")]), &empty(), &mut backend);
    reconciler.reconcile(&options(vec![model("m", "b.glb")]), &empty(), &mut backend);
    let loads = backend.loads();

    let error = ModelLoadError::Failed {
        url: "a.glb".into(),
        reason: "404".into(),
    };
    let outcome = reconciler.complete_model_load(&loads[0], Err(error), &mut backend);
    assert_eq!(outcome, LoadOutcome::Stale);
    assert!(reconciler.is_load_pending("m"));

    let applied = reconciler.complete_model_load(&loads[1], loaded("b"), &mut backend);
    assert_eq!(applied, LoadOutcome::Applied);
}

#[test]
fn test_removed_model_load_is_discarded() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();

    reconciler.reconcile(&options(vec![model("m", "a.glb")]), &empty(), &mut backend);
    reconciler.reconcile(&options(vec![]), &empty(), &mut backend);
    let ticket = backend.loads()[0].clone();

    let outcome = reconciler.complete_model_load(&ticket, loaded("a"), &mut backend);
    assert_eq!(outcome, LoadOutcome::Stale);
    assert!(reconciler.is_empty());
    assert_eq!(backend.spawns(), 0);
}

#[test]
fn test_pending_load_is_not_reissued() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let opts = options(vec![model("m", "a.glb")]);

    reconciler.reconcile(&opts, &empty(), &mut backend);
    let report = reconciler.reconcile(&opts, &empty(), &mut backend);
    assert_eq!(report.loads_requested, 0);
    assert_eq!(backend.loads().len(), 1);
}

#[test]
fn test_failed_url_is_retried_next_cycle() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let opts = options(vec![model("m", "flaky.glb")]);
    let missing = || -> Result<LoadedModel<String>, ModelLoadError> {
        Err(ModelLoadError::MissingScene {
            url: "flaky.glb".into(),
        })
    };

    reconciler.reconcile(&opts, &empty(), &mut backend);
    let first = backend.loads()[0].clone();
    assert_eq!(
        reconciler.complete_model_load(&first, missing(), &mut backend),
        LoadOutcome::Failed
    );
    assert!(!reconciler.contains("m"));
    assert!(!reconciler.is_load_pending("m"));

    // One new request per later cycle, none while it is still in flight.
    let again = reconciler.reconcile(&opts, &empty(), &mut backend);
    assert_eq!(again.loads_requested, 1);
    assert_eq!(again.skipped, 0);
    let in_flight = reconciler.reconcile(&opts, &empty(), &mut backend);
    assert_eq!(in_flight.loads_requested, 0);
    assert_eq!(backend.loads().len(), 2);

    let second = backend.loads()[1].clone();
    assert!(second.generation > first.generation);
    assert_eq!(
        reconciler.complete_model_load(&second, missing(), &mut backend),
        LoadOutcome::Failed
    );
    reconciler.reconcile(&opts, &empty(), &mut backend);
    let third = backend.loads()[2].clone();
    assert_eq!(
        reconciler.complete_model_load(&third, loaded("flaky"), &mut backend),
        LoadOutcome::Applied
    );
    assert!(reconciler.contains("m"));
}

#[test]
fn test_model_unit_change_updates_scale_in_place() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let options_with_unit = |unit: LengthUnit| {
        options(vec![Shape::new(
            "m",
            ShapeKind::Model(ModelShape {
                url: Some("m.glb".into()),
                unit,
                view_angle_scaling: false,
                ..Default::default()
            }),
        )])
    };

    reconciler.reconcile(&options_with_unit(LengthUnit::Kilometers), &empty(), &mut backend);
    let ticket = backend.loads()[0].clone();
    reconciler.complete_model_load(&ticket, loaded("m"), &mut backend);
    assert_eq!(reconciler.entity("m").unwrap().metrics().original_scale, 1.0);

    let report = reconciler.reconcile(&options_with_unit(LengthUnit::Meters), &empty(), &mut backend);
    assert_eq!(report.updated, 1);
    assert_eq!(backend.spawns(), 1);
    assert_eq!(backend.loads().len(), 1);
    let entity = reconciler.entity("m").unwrap();
    assert_eq!(entity.metrics().original_scale, 0.001);
    assert_eq!(entity.transform().scale, 0.001);
}

#[test]
fn test_failed_spawn_is_not_registered() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    backend.fail_spawn.insert("bad".into());

    let report = reconciler.reconcile(&options(vec![sphere("bad"), sphere("ok")]), &empty(), &mut backend);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert!(!reconciler.contains("bad"));
    assert!(reconciler.contains("ok"));
}

#[test]
fn test_duplicate_ids_keep_first() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let report = reconciler.reconcile(&options(vec![sphere("d"), sphere("d")]), &empty(), &mut backend);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(backend.live.len(), 1);
}

#[test]
fn test_frame_scaling_tracks_camera_distance() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let auto = Shape::new(
        "auto",
        ShapeKind::Sphere(SphereShape {
            auto_radius: true,
            ..Default::default()
        }),
    );
    let fixed = sphere("fixed");
    reconciler.reconcile(&options(vec![auto, fixed]), &empty(), &mut backend);

    let near = CameraState::looking_at(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, 0.8);
    reconciler.apply_frame_scaling(&near, &mut backend);
    let near_scale = reconciler.entity("auto").unwrap().transform().scale;
    assert!((near_scale - 1.00003).abs() < 1e-4, "near_scale={near_scale}");

    let far = CameraState::looking_at(Vec3::new(0.0, 0.0, 1000.0), Vec3::ZERO, 0.8);
    reconciler.apply_frame_scaling(&far, &mut backend);
    let far_scale = reconciler.entity("auto").unwrap().transform().scale;
    assert!(far_scale > near_scale * 9.0);

    assert_eq!(reconciler.entity("fixed").unwrap().transform().scale, 1.0);
}

#[test]
fn test_inverted_view_angle_clamps_do_not_panic() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let opts = SceneOptions::from_json(
        r#"{
            "shapes": [{ "id": "s", "type": "sphere", "autoRadius": true }],
            "viewAngle": { "enabled": true, "minSize": 10, "maxSize": 1 }
        }"#,
    )
    .unwrap();
    reconciler.reconcile(&opts, &empty(), &mut backend);

    let camera = CameraState::looking_at(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, 0.8);
    reconciler.apply_frame_scaling(&camera, &mut backend);
    let scale = reconciler.entity("s").unwrap().transform().scale;
    assert!((1.0..=10.0).contains(&scale), "scale={scale}");

    let far = CameraState::looking_at(Vec3::new(0.0, 0.0, 1e5), Vec3::ZERO, 0.8);
    reconciler.apply_frame_scaling(&far, &mut backend);
    assert_eq!(reconciler.entity("s").unwrap().transform().scale, 10.0);
}

#[test]
fn test_cube_scale_factor_multiplies_view_angle_scale() {
    let scaled_cube = |scale_factor: f32| {
        let mut reconciler = Reconciler::new();
        let mut backend = RecordingBackend::default();
        let cube = Shape::new(
            "cube",
            ShapeKind::Model(ModelShape {
                scale_factor,
                ..Default::default()
            }),
        );
        reconciler.reconcile(&options(vec![cube]), &empty(), &mut backend);
        let camera = CameraState::looking_at(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, 0.8);
        reconciler.apply_frame_scaling(&camera, &mut backend);
        reconciler.entity("cube").unwrap().transform().scale
    };

    let single = scaled_cube(1.0);
    let double = scaled_cube(2.0);
    assert!((single - 1.7321).abs() < 1e-3, "single={single}");
    assert!((double - 2.0 * single).abs() < 1e-4, "double={double}");
}

#[test]
fn test_model_without_bounds_keeps_authored_scale() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let opts = options(vec![model("m", "empty.glb")]);
    reconciler.reconcile(&opts, &empty(), &mut backend);
    let ticket = backend.loads()[0].clone();
    let empty_model = Ok(LoadedModel {
        asset: "empty".to_string(),
        bounds: None,
    });
    assert_eq!(
        reconciler.complete_model_load(&ticket, empty_model, &mut backend),
        LoadOutcome::Applied
    );
    backend.calls.clear();

    let camera = CameraState::looking_at(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, 0.8);
    reconciler.apply_frame_scaling(&camera, &mut backend);
    reconciler.apply_frame_scaling(&camera, &mut backend);
    assert!(backend.calls.is_empty());

    // A later snapshot does not switch scaling back on.
    reconciler.reconcile(&opts, &empty(), &mut backend);
    reconciler.apply_frame_scaling(&camera, &mut backend);
    assert!(backend.calls.is_empty());

    let entity = reconciler.entity("m").unwrap();
    assert!(!entity.metrics().view_angle.enabled);
    assert_eq!(entity.transform().scale, entity.metrics().original_scale);
}

#[test]
fn test_frame_scaling_lays_out_every_callout() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let annotation = Shape::new(
        "labels",
        ShapeKind::Annotation(AnnotationShape {
            position: Vec3Fields {
                x: DataField::constant("0,5"),
                y: DataField::constant("0"),
                z: DataField::constant("0"),
            },
            text: DataField::constant("one,two"),
            ..Default::default()
        }),
    );
    reconciler.reconcile(&options(vec![annotation]), &empty(), &mut backend);
    backend.calls.clear();

    reconciler.apply_frame_scaling(&CameraState::default(), &mut backend);
    assert_eq!(
        backend.calls,
        vec![Call::Callout(1, 0), Call::Callout(1, 1)]
    );
}

#[test]
fn test_global_disable_stops_model_scaling() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    let mut opts = options(vec![Shape::new("cube", ShapeKind::Model(ModelShape::default()))]);
    opts.view_angle = ViewAngleSettings {
        enabled: false,
        ..Default::default()
    };
    reconciler.reconcile(&opts, &empty(), &mut backend);
    backend.calls.clear();

    reconciler.apply_frame_scaling(&CameraState::default(), &mut backend);
    assert!(backend.calls.is_empty());
}

#[test]
fn test_clear_releases_everything() {
    let mut reconciler = Reconciler::new();
    let mut backend = RecordingBackend::default();
    reconciler.reconcile(
        &options(vec![sphere("a"), sphere("b"), model("m", "m.glb")]),
        &empty(),
        &mut backend,
    );
    let ticket = backend.loads()[0].clone();

    reconciler.clear(&mut backend);
    assert!(reconciler.is_empty());
    assert!(backend.live.is_empty());
    assert_eq!(
        reconciler.complete_model_load(&ticket, loaded("m"), &mut backend),
        LoadOutcome::Stale
    );
}
