//! Diffing the declared shapes against the live scene.
//!
//! Each reconcile pass resolves every visible shape against the latest
//! telemetry and then, per id:
//!
//! ```text
//! absent from options         → destroy, invalidate pending load
//! same identity               → update in place (transform, geometry, scale)
//! identity changed            → destroy, then create
//! new                         → create (sync) or issue a load (async)
//! ```
//!
//! Identity is the primitive kind, or the URL for loaded models. Polyline
//! data changes are treated as identity changes and rebuilt from scratch.

use std::collections::{HashMap, HashSet};

use crate::camera::CameraState;
use crate::error::ModelLoadError;
use crate::factory::{self, Blueprint, ModelRequest, Plan, Primitive};
use crate::field::FieldResolver;
use crate::geometry::callout::{REFERENCE_DISTANCE, layout_callout};
use crate::label::LabelFont;
use crate::scaling::{callout_distance_scale, view_angle_scale};
use crate::shape::{SceneOptions, ShapeId};
use crate::telemetry::TelemetrySnapshot;

use super::entity::{EntityIdentity, SceneEntity};
use super::loads::{LoadGate, LoadOutcome, LoadedModel, ModelTicket, PendingModel};
use super::SceneBackend;

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub destroyed: usize,
    pub loads_requested: usize,
    /// Shapes left out: duplicate ids or backend errors.
    pub skipped: usize,
}

impl ReconcileReport {
    /// Whether the pass changed the scene graph structure.
    pub fn changed_structure(&self) -> bool {
        self.created + self.recreated + self.destroyed > 0
    }
}

/// Sole owner of the id → entity map.
#[derive(Debug)]
pub struct Reconciler<N> {
    entities: HashMap<ShapeId, SceneEntity<N>>,
    gate: LoadGate,
    pending: HashMap<ShapeId, PendingModel>,
    label_font: Option<LabelFont>,
    callout_reference_distance: f32,
}

impl<N> Default for Reconciler<N> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            gate: LoadGate::default(),
            pending: HashMap::new(),
            label_font: None,
            callout_reference_distance: REFERENCE_DISTANCE,
        }
    }
}

impl<N> Reconciler<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font used to measure annotation labels.
    pub fn set_label_font(&mut self, font: Option<LabelFont>) {
        self.label_font = font;
    }

    /// Camera distance at which callouts are drawn at scale 1.
    pub fn set_callout_reference_distance(&mut self, distance: f32) {
        if distance.is_finite() && distance > 0.0 {
            self.callout_reference_distance = distance;
        } else {
            tracing::warn!("Ignoring invalid callout reference distance {distance}");
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entity(&self, id: &str) -> Option<&SceneEntity<N>> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&ShapeId, &SceneEntity<N>)> {
        self.entities.iter()
    }

    pub fn is_load_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Bring the scene graph in line with `options` and `telemetry`.
    pub fn reconcile<B>(
        &mut self,
        options: &SceneOptions,
        telemetry: &TelemetrySnapshot,
        backend: &mut B,
    ) -> ReconcileReport
    where
        B: SceneBackend<Node = N>,
    {
        let resolver = FieldResolver::new(telemetry);
        let mut report = ReconcileReport::default();

        let visible: HashSet<&ShapeId> = options.visible_shapes().map(|s| &s.id).collect();

        let absent: Vec<ShapeId> = self
            .entities
            .keys()
            .filter(|id| !visible.contains(id))
            .cloned()
            .collect();
        for id in absent {
            self.destroy(&id, backend);
            report.destroyed += 1;
        }

        let abandoned: Vec<ShapeId> = self
            .pending
            .keys()
            .filter(|id| !visible.contains(id))
            .cloned()
            .collect();
        for id in abandoned {
            self.pending.remove(&id);
            self.gate.invalidate(&id);
            tracing::debug!("Abandoned pending model load for `{id}`");
        }

        let mut seen = HashSet::new();
        for shape in options.visible_shapes() {
            if !seen.insert(&shape.id) {
                tracing::warn!("Duplicate shape id `{}`, keeping the first", shape.id);
                report.skipped += 1;
                continue;
            }
            let plan = factory::plan(
                shape,
                &resolver,
                &options.view_angle,
                self.label_font.as_ref(),
            );
            match plan {
                Plan::Immediate(blueprint) => {
                    self.apply_blueprint(&shape.id, blueprint, backend, &mut report)
                }
                Plan::Model(request) => self.apply_model(&shape.id, request, backend, &mut report),
            }
        }

        tracing::debug!("Reconciled scene: {report:?}");
        report
    }

    fn apply_blueprint<B>(
        &mut self,
        id: &ShapeId,
        blueprint: Blueprint,
        backend: &mut B,
        report: &mut ReconcileReport,
    ) where
        B: SceneBackend<Node = N>,
    {
        if self.pending.remove(id).is_some() {
            self.gate.invalidate(id);
        }

        let identity = blueprint.primitive.identity();
        let replace = match self.entities.get(id) {
            None => false,
            Some(entity) if entity.identity != identity => true,
            Some(entity) => {
                identity == EntityIdentity::Polyline
                    && entity.primitive.as_ref() != Some(&blueprint.primitive)
            }
        };

        if replace {
            self.destroy(id, backend);
            if self.create(id, blueprint, backend) {
                report.recreated += 1;
            } else {
                report.skipped += 1;
            }
            return;
        }

        let Some(entity) = self.entities.get_mut(id) else {
            if self.create(id, blueprint, backend) {
                report.created += 1;
            } else {
                report.skipped += 1;
            }
            return;
        };

        let mut changed = false;
        if entity.primitive.as_ref() != Some(&blueprint.primitive) {
            if let Err(e) = backend.rebuild(&mut entity.node, &blueprint.primitive) {
                tracing::warn!("Failed to rebuild `{id}`: {e}");
            }
            entity.primitive = Some(blueprint.primitive);
            changed = true;
        }

        let mut transform = blueprint.transform;
        if blueprint.metrics.view_angle.enabled && entity.metrics.view_angle.enabled {
            // The scaling pass owns the scale; keep the last computed one.
            transform.scale = entity.transform.scale;
        }
        if transform != entity.transform {
            backend.set_transform(&entity.node, &transform);
            entity.transform = transform;
            changed = true;
        }

        if entity.metrics != blueprint.metrics {
            entity.metrics = blueprint.metrics;
            changed = true;
        }

        if changed {
            report.updated += 1;
        }
    }

    fn apply_model<B>(
        &mut self,
        id: &ShapeId,
        request: ModelRequest,
        backend: &mut B,
        report: &mut ReconcileReport,
    ) where
        B: SceneBackend<Node = N>,
    {
        let identity = EntityIdentity::Model {
            url: request.url.clone(),
        };

        if let Some(entity) = self.entities.get_mut(id)
            && entity.identity == identity
        {
            let mut changed = false;
            let original_scale = request.original_scale();
            let mut view_angle = request.view_angle;
            // A model without a measurable size stays at its authored scale.
            view_angle.enabled &= entity.metrics.has_reference_size();
            if entity.metrics.original_scale != original_scale
                || entity.metrics.view_angle != view_angle
            {
                entity.metrics.original_scale = original_scale;
                entity.metrics.view_angle = view_angle;
                changed = true;
            }

            let mut transform = request.transform();
            if view_angle.enabled {
                transform.scale = entity.transform.scale;
            }
            if transform != entity.transform {
                backend.set_transform(&entity.node, &transform);
                entity.transform = transform;
                changed = true;
            }
            if changed {
                report.updated += 1;
            }
            return;
        }

        if self.entities.contains_key(id) {
            // Different URL, or a primitive before: the old node goes now.
            self.destroy(id, backend);
            report.recreated += 1;
        }

        if let Some(pending) = self.pending.get_mut(id) {
            if pending.ticket.url == request.url {
                pending.request = request;
                return;
            }
            self.pending.remove(id);
            self.gate.invalidate(id);
        }

        let ticket = ModelTicket {
            id: id.clone(),
            generation: self.gate.issue(id),
            url: request.url.clone(),
        };
        tracing::debug!("Loading model `{}` for `{id}` (generation {})", ticket.url, ticket.generation);
        self.pending.insert(
            id.clone(),
            PendingModel {
                ticket: ticket.clone(),
                request,
            },
        );
        backend.load_model(ticket);
        report.loads_requested += 1;
    }

    /// Feed a finished load back in.
    ///
    /// Results for superseded tickets are dropped without touching the scene.
    /// A failed load leaves the id without a node, so the next reconcile pass
    /// requests it again.
    pub fn complete_model_load<B>(
        &mut self,
        ticket: &ModelTicket,
        result: Result<LoadedModel<B::Model>, ModelLoadError>,
        backend: &mut B,
    ) -> LoadOutcome
    where
        B: SceneBackend<Node = N>,
    {
        if !self.gate.is_current(&ticket.id, ticket.generation) {
            tracing::debug!(
                "Discarding stale load of `{}` for `{}` (generation {})",
                ticket.url,
                ticket.id,
                ticket.generation
            );
            return LoadOutcome::Stale;
        }
        let Some(pending) = self.pending.remove(&ticket.id) else {
            return LoadOutcome::Stale;
        };

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!("Model for `{}` unavailable: {e}", ticket.id);
                return LoadOutcome::Failed;
            }
        };

        if self.entities.contains_key(&ticket.id) {
            self.destroy(&ticket.id, backend);
        }

        let metrics = factory::model_metrics(&pending.request, loaded.bounds);
        let transform = pending.request.transform();
        match backend.spawn_model(&ticket.id, loaded.asset) {
            Ok(node) => {
                backend.set_transform(&node, &transform);
                tracing::debug!("Spawned model `{}` for `{}`", ticket.url, ticket.id);
                self.entities.insert(
                    ticket.id.clone(),
                    SceneEntity {
                        node,
                        identity: EntityIdentity::Model {
                            url: ticket.url.clone(),
                        },
                        primitive: None,
                        transform,
                        metrics,
                        load_version: ticket.generation,
                    },
                );
                LoadOutcome::Applied
            }
            Err(e) => {
                tracing::warn!("{e}");
                LoadOutcome::Failed
            }
        }
    }

    /// Recompute camera-dependent scale for every entity. Call once per
    /// frame after the camera moved.
    pub fn apply_frame_scaling<B>(&mut self, camera: &CameraState, backend: &mut B)
    where
        B: SceneBackend<Node = N>,
    {
        let reference_distance = self.callout_reference_distance;
        for (id, entity) in self.entities.iter_mut() {
            match &entity.primitive {
                Some(Primitive::Polyline { .. }) => {}
                Some(Primitive::Annotation {
                    callouts,
                    direction,
                    ..
                }) => {
                    for (index, callout) in callouts.iter().enumerate() {
                        let scale = callout_distance_scale(
                            camera.distance_to(callout.anchor),
                            reference_distance,
                        );
                        let layout = layout_callout(
                            callout.anchor,
                            callout.label_px,
                            direction.sign(),
                            scale,
                            camera.rotation,
                        );
                        backend.set_callout_layout(&entity.node, index, &layout);
                    }
                }
                _ => {
                    let metrics = &mut entity.metrics;
                    if !metrics.view_angle.enabled {
                        continue;
                    }
                    metrics.ensure_original_size();
                    if !metrics.has_reference_size() {
                        tracing::warn!(
                            "No reference size for `{id}`, view-angle scaling disabled"
                        );
                        metrics.view_angle.enabled = false;
                        continue;
                    }
                    let distance = camera.distance_to(entity.transform.translation);
                    let scale = metrics.original_scale
                        * view_angle_scale(metrics, distance, &metrics.view_angle);
                    if scale != entity.transform.scale {
                        entity.transform.scale = scale;
                        backend.set_transform(&entity.node, &entity.transform);
                    }
                }
            }
        }
    }

    /// Destroy every entity and abandon every pending load.
    pub fn clear<B>(&mut self, backend: &mut B)
    where
        B: SceneBackend<Node = N>,
    {
        let ids: Vec<ShapeId> = self.entities.keys().cloned().collect();
        for id in ids {
            self.destroy(&id, backend);
        }
        for id in self.pending.keys() {
            self.gate.invalidate(id);
        }
        self.pending.clear();
    }

    fn create<B>(&mut self, id: &ShapeId, blueprint: Blueprint, backend: &mut B) -> bool
    where
        B: SceneBackend<Node = N>,
    {
        match backend.spawn(id, &blueprint.primitive) {
            Ok(node) => {
                backend.set_transform(&node, &blueprint.transform);
                tracing::debug!("Created {:?} `{id}`", blueprint.primitive.identity());
                self.entities.insert(
                    id.clone(),
                    SceneEntity {
                        node,
                        identity: blueprint.primitive.identity(),
                        primitive: Some(blueprint.primitive),
                        transform: blueprint.transform,
                        metrics: blueprint.metrics,
                        load_version: 0,
                    },
                );
                true
            }
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    fn destroy<B>(&mut self, id: &ShapeId, backend: &mut B)
    where
        B: SceneBackend<Node = N>,
    {
        if let Some(entity) = self.entities.remove(id) {
            tracing::debug!("Destroyed `{id}`");
            backend.despawn(entity.node);
        }
    }
}
