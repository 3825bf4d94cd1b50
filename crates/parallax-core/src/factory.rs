//! Entity factory: turns a shape plus telemetry into something buildable.
//!
//! Spheres, polylines, annotations, and URL-less models become a
//! [`Blueprint`] the backend can build synchronously. Models with a URL
//! become a [`ModelRequest`]; the reconciler issues the load and finishes the
//! entity with [`model_metrics`] when it completes.

use glam::{Quat, Vec2, Vec3};

use crate::bounds::Bounds3;
use crate::field::FieldResolver;
use crate::geometry::DEFAULT_CUBE_EDGE;
use crate::geometry::polyline::{build_path, zip_points};
use crate::label::{LabelFont, LabelLayout};
use crate::scaling::ViewAngleConfig;
use crate::scene::{EntityIdentity, EntityMetrics, NodeTransform};
use crate::shape::{
    AnnotationShape, CalloutDirection, LengthUnit, ModelShape, PolylineShape, QuatFields, Shape,
    ShapeColor, ShapeId, ShapeKind, SphereShape, Vec3Fields, ViewAngleSettings,
};

/// Radius an auto-sized sphere starts from before the first scaling pass.
pub const AUTO_RADIUS_DEFAULT: f32 = 1.0;

/// One callout of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalloutSpec {
    pub anchor: Vec3,
    pub text: String,
    /// Rasterized label size in pixels.
    pub label_px: Vec2,
}

/// Backend-neutral geometry for a synchronously built node.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Sphere {
        radius: f32,
        color: ShapeColor,
        opacity: f32,
    },
    Polyline {
        points: Vec<Vec3>,
        color: ShapeColor,
    },
    Annotation {
        callouts: Vec<CalloutSpec>,
        color: ShapeColor,
        direction: CalloutDirection,
        font_size: f32,
    },
    Cube {
        edge: f32,
        color: ShapeColor,
    },
}

impl Primitive {
    pub fn identity(&self) -> EntityIdentity {
        match self {
            Self::Sphere { .. } => EntityIdentity::Sphere,
            Self::Polyline { .. } => EntityIdentity::Polyline,
            Self::Annotation { .. } => EntityIdentity::Annotation,
            Self::Cube { .. } => EntityIdentity::Cube,
        }
    }
}

/// Everything needed to build a node right away.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub primitive: Primitive,
    pub transform: NodeTransform,
    pub metrics: EntityMetrics,
}

/// An asynchronous model load and how to place the result.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub url: String,
    pub unit: LengthUnit,
    pub scale_factor: f32,
    pub view_angle: ViewAngleConfig,
    pub translation: Vec3,
    pub rotation: Quat,
}

impl ModelRequest {
    /// Scale factor times unit conversion.
    pub fn original_scale(&self) -> f32 {
        self.scale_factor * self.unit.to_scene_units()
    }

    pub fn transform(&self) -> NodeTransform {
        NodeTransform {
            translation: self.translation,
            rotation: self.rotation,
            scale: self.original_scale(),
        }
    }
}

/// How a shape comes into existence.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Immediate(Blueprint),
    Model(ModelRequest),
}

/// Resolve `shape` against the current telemetry.
pub fn plan(
    shape: &Shape,
    resolver: &FieldResolver<'_>,
    settings: &ViewAngleSettings,
    font: Option<&LabelFont>,
) -> Plan {
    match &shape.kind {
        ShapeKind::Sphere(sphere) => Plan::Immediate(sphere_blueprint(&shape.id, sphere, resolver, settings)),
        ShapeKind::Polyline(polyline) => Plan::Immediate(polyline_blueprint(polyline, resolver)),
        ShapeKind::Annotation(annotation) => {
            Plan::Immediate(annotation_blueprint(annotation, resolver, font))
        }
        ShapeKind::Model(model) => model_plan(&shape.id, model, resolver, settings),
    }
}

fn sphere_blueprint(
    id: &ShapeId,
    sphere: &SphereShape,
    resolver: &FieldResolver<'_>,
    settings: &ViewAngleSettings,
) -> Blueprint {
    let radius = if sphere.auto_radius {
        AUTO_RADIUS_DEFAULT
    } else if sphere.radius.is_finite() && sphere.radius > 0.0 {
        sphere.radius
    } else {
        tracing::warn!("Sphere `{id}` has invalid radius {}, using 1.0", sphere.radius);
        1.0
    };

    Blueprint {
        primitive: Primitive::Sphere {
            radius,
            color: sphere.color,
            opacity: sphere.opacity.clamp(0.0, 1.0),
        },
        transform: NodeTransform::from_translation(resolve_position(id, &sphere.position, resolver)),
        metrics: EntityMetrics {
            original_size: Some(2.0 * radius),
            view_angle: ViewAngleConfig::from_settings(settings, sphere.auto_radius),
            ..Default::default()
        },
    }
}

fn polyline_blueprint(polyline: &PolylineShape, resolver: &FieldResolver<'_>) -> Blueprint {
    let points = polyline_points(&polyline.points, resolver);
    Blueprint {
        primitive: Primitive::Polyline {
            points: build_path(points, polyline.close_path, polyline.smooth),
            color: polyline.color,
        },
        transform: NodeTransform::IDENTITY,
        metrics: EntityMetrics {
            view_angle: ViewAngleConfig::disabled(),
            ..Default::default()
        },
    }
}

fn polyline_points(fields: &Vec3Fields, resolver: &FieldResolver<'_>) -> Vec<Vec3> {
    zip_points(
        &resolver.numeric(&fields.x, 0.0),
        &resolver.numeric(&fields.y, 0.0),
        &resolver.numeric(&fields.z, 0.0),
    )
}

fn annotation_blueprint(
    annotation: &AnnotationShape,
    resolver: &FieldResolver<'_>,
    font: Option<&LabelFont>,
) -> Blueprint {
    Blueprint {
        primitive: Primitive::Annotation {
            callouts: annotation_callouts(annotation, resolver, font),
            color: annotation.color,
            direction: annotation.direction,
            font_size: annotation.font_size,
        },
        transform: NodeTransform::IDENTITY,
        metrics: EntityMetrics {
            view_angle: ViewAngleConfig::disabled(),
            ..Default::default()
        },
    }
}

/// Callouts for an annotation.
///
/// When the position mixes constant and telemetry axes, or is bound to
/// telemetry while the text is constant, only the most recent values are
/// shown as a single callout. Otherwise there is one callout per index
/// across the longest of the four arrays, with shorter arrays repeating their
/// last element. Blank texts produce no callout.
pub fn annotation_callouts(
    annotation: &AnnotationShape,
    resolver: &FieldResolver<'_>,
    font: Option<&LabelFont>,
) -> Vec<CalloutSpec> {
    let position = &annotation.position;
    let bound_axes = position.axes().iter().filter(|f| f.is_field()).count();
    let mixed = bound_axes > 0 && bound_axes < 3;
    let collapse = mixed || (bound_axes > 0 && !annotation.text.is_field());

    let xs = resolver.numeric(&position.x, 0.0);
    let ys = resolver.numeric(&position.y, 0.0);
    let zs = resolver.numeric(&position.z, 0.0);
    let texts = resolver.text(&annotation.text, "");

    let rows: Vec<(Vec3, &str)> = if collapse {
        vec![(
            anchor_at(&xs, &ys, &zs, usize::MAX),
            texts.last().map(String::as_str).unwrap_or(""),
        )]
    } else {
        let count = [xs.len(), ys.len(), zs.len(), texts.len()]
            .into_iter()
            .max()
            .unwrap_or(0);
        (0..count)
            .map(|i| (anchor_at(&xs, &ys, &zs, i), clamped(&texts, i).map(String::as_str).unwrap_or("")))
            .collect()
    };

    rows.into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .filter_map(|(anchor, text)| {
            if !anchor.is_finite() {
                tracing::warn!("Annotation anchor is not finite, skipping callout `{text}`");
                return None;
            }
            let layout = LabelLayout::measure(text, annotation.font_size, font);
            Some(CalloutSpec {
                anchor,
                text: text.to_string(),
                label_px: Vec2::new(layout.width as f32, layout.height as f32),
            })
        })
        .collect()
}

fn clamped<T>(values: &[T], index: usize) -> Option<&T> {
    values.get(index).or_else(|| values.last())
}

fn anchor_at(xs: &[f64], ys: &[f64], zs: &[f64], index: usize) -> Vec3 {
    let axis = |values: &[f64]| clamped(values, index).copied().unwrap_or(0.0) as f32;
    Vec3::new(axis(xs), axis(ys), axis(zs))
}

fn model_plan(
    id: &ShapeId,
    model: &ModelShape,
    resolver: &FieldResolver<'_>,
    settings: &ViewAngleSettings,
) -> Plan {
    let translation = resolve_position(id, &model.position, resolver);
    let rotation = resolve_orientation(id, model.orientation.as_ref(), resolver);
    let scale_factor = if model.scale_factor.is_finite() && model.scale_factor > 0.0 {
        model.scale_factor
    } else {
        tracing::warn!("Model `{id}` has invalid scale factor {}, using 1.0", model.scale_factor);
        1.0
    };
    let view_angle =
        ViewAngleConfig::from_settings(settings, settings.enabled && model.view_angle_scaling);

    match model.resource_url() {
        Some(url) => Plan::Model(ModelRequest {
            url: url.to_string(),
            unit: model.unit,
            scale_factor,
            view_angle,
            translation,
            rotation,
        }),
        None => Plan::Immediate(Blueprint {
            primitive: Primitive::Cube {
                edge: DEFAULT_CUBE_EDGE,
                color: model.color,
            },
            transform: NodeTransform {
                translation,
                rotation,
                scale: scale_factor,
            },
            metrics: EntityMetrics {
                original_size: Some(DEFAULT_CUBE_EDGE),
                original_scale: scale_factor,
                aspect_ratio: Some(1.0),
                bounds: Some(Bounds3 {
                    min: Vec3::splat(-DEFAULT_CUBE_EDGE / 2.0),
                    max: Vec3::splat(DEFAULT_CUBE_EDGE / 2.0),
                }),
                view_angle,
            },
        }),
    }
}

/// Metrics for a loaded model, derived from its local bounds.
///
/// A model with no measurable bounds keeps its authored scale: view-angle
/// scaling is switched off for it.
pub fn model_metrics(request: &ModelRequest, bounds: Option<Bounds3>) -> EntityMetrics {
    let mut metrics = EntityMetrics {
        original_scale: request.original_scale(),
        bounds,
        view_angle: request.view_angle,
        ..Default::default()
    };
    metrics.ensure_original_size();
    if metrics.view_angle.enabled && !metrics.has_reference_size() {
        tracing::warn!(
            "Model `{}` has no measurable bounds, view-angle scaling disabled",
            request.url
        );
        metrics.view_angle.enabled = false;
    }
    metrics
}

/// Latest position of a field group. Non-finite results fall back to the origin.
pub fn resolve_position(id: &ShapeId, fields: &Vec3Fields, resolver: &FieldResolver<'_>) -> Vec3 {
    let position = Vec3::new(
        resolver.last_numeric(&fields.x, 0.0) as f32,
        resolver.last_numeric(&fields.y, 0.0) as f32,
        resolver.last_numeric(&fields.z, 0.0) as f32,
    );
    if position.is_finite() {
        position
    } else {
        tracing::warn!("Position of `{id}` is not finite, placing at origin");
        Vec3::ZERO
    }
}

/// Latest orientation, normalized. Degenerate quaternions become identity.
pub fn resolve_orientation(
    id: &ShapeId,
    fields: Option<&QuatFields>,
    resolver: &FieldResolver<'_>,
) -> Quat {
    let Some(fields) = fields else {
        return Quat::IDENTITY;
    };
    let raw = Quat::from_xyzw(
        resolver.last_numeric(&fields.x, 0.0) as f32,
        resolver.last_numeric(&fields.y, 0.0) as f32,
        resolver.last_numeric(&fields.z, 0.0) as f32,
        resolver.last_numeric(&fields.w, 1.0) as f32,
    );
    let length = raw.length();
    if raw.is_finite() && length > f32::EPSILON && length.is_finite() {
        raw / length
    } else {
        tracing::warn!("Orientation of `{id}` is degenerate, using identity");
        Quat::IDENTITY
    }
}

/// Every resolved anchor point of a shape, for bounds estimation.
pub fn anchor_points(shape: &Shape, resolver: &FieldResolver<'_>) -> Vec<Vec3> {
    match &shape.kind {
        ShapeKind::Sphere(sphere) => vec![resolve_position(&shape.id, &sphere.position, resolver)],
        ShapeKind::Model(model) => vec![resolve_position(&shape.id, &model.position, resolver)],
        ShapeKind::Polyline(polyline) => polyline_points(&polyline.points, resolver),
        ShapeKind::Annotation(annotation) => annotation_callouts(annotation, resolver, None)
            .into_iter()
            .map(|callout| callout.anchor)
            .collect(),
    }
}
