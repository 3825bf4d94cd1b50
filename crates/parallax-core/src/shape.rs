//! Declarative scene description: shapes and global options.
//!
//! `SceneOptions` is the single snapshot the host hands over whenever its
//! configuration changes. Shapes are a closed set of variants; the factory
//! and the reconciler match on them exhaustively.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use palette::{LinSrgb, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;
use crate::field::DataField;

/// Caller-assigned identifier, stable for the lifetime of a shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for ShapeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Colors ──────────────────────────────────────────────────────────────────

/// An sRGB color written as `#rrggbb` (or `#rgb`) in the options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeColor(pub Srgb<u8>);

impl ShapeColor {
    pub const WHITE: Self = Self(Srgb::new(255, 255, 255));

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(Srgb::new(r, g, b))
    }

    /// Non-linear sRGB components in `0..=1` with the given alpha.
    pub fn to_srgba_f32(self, alpha: f32) -> [f32; 4] {
        let c: Srgb<f32> = self.0.into_format();
        [c.red, c.green, c.blue, alpha.clamp(0.0, 1.0)]
    }

    /// 8-bit sRGB components with the given alpha.
    pub fn to_rgba8(self, alpha: u8) -> [u8; 4] {
        [self.0.red, self.0.green, self.0.blue, alpha]
    }

    /// WCAG relative luminance (linear-light, Rec. 709 weights).
    pub fn relative_luminance(self) -> f32 {
        let linear: LinSrgb<f32> = self.0.into_format::<f32>().into_linear();
        0.2126 * linear.red + 0.7152 * linear.green + 0.0722 * linear.blue
    }
}

impl Default for ShapeColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl TryFrom<String> for ShapeColor {
    type Error = palette::rgb::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Srgb::<u8>::from_str(value.trim()).map(Self)
    }
}

impl From<ShapeColor> for String {
    fn from(color: ShapeColor) -> Self {
        format!(
            "#{:02x}{:02x}{:02x}",
            color.0.red, color.0.green, color.0.blue
        )
    }
}

// ── Field groups ────────────────────────────────────────────────────────────

/// Three data fields forming a position (or a list of positions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3Fields {
    pub x: DataField,
    pub y: DataField,
    pub z: DataField,
}

impl Vec3Fields {
    /// Constant position, handy for tests and demos.
    pub fn constant(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: DataField::constant(x.to_string()),
            y: DataField::constant(y.to_string()),
            z: DataField::constant(z.to_string()),
        }
    }

    pub fn axes(&self) -> [&DataField; 3] {
        [&self.x, &self.y, &self.z]
    }
}

/// Four data fields forming an orientation quaternion `(x, y, z, w)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuatFields {
    pub x: DataField,
    pub y: DataField,
    pub z: DataField,
    pub w: DataField,
}

impl Default for QuatFields {
    fn default() -> Self {
        Self {
            x: DataField::constant("0"),
            y: DataField::constant("0"),
            z: DataField::constant("0"),
            w: DataField::constant("1"),
        }
    }
}

// ── Shapes ──────────────────────────────────────────────────────────────────

/// Length unit of an external model asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Meters,
    /// Scene units are kilometers, so this is the identity.
    #[default]
    Kilometers,
}

impl LengthUnit {
    /// Multiplier converting asset units to scene units.
    pub const fn to_scene_units(self) -> f32 {
        match self {
            Self::Meters => 0.001,
            Self::Kilometers => 1.0,
        }
    }
}

/// Which way an annotation's connector bends away from its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutDirection {
    /// Right and up.
    #[default]
    Normal,
    /// Left and down.
    Inverted,
}

impl CalloutDirection {
    pub const fn sign(self) -> f32 {
        match self {
            Self::Normal => 1.0,
            Self::Inverted => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SphereShape {
    pub position: Vec3Fields,
    /// Fixed radius in scene units, used when `auto_radius` is off.
    pub radius: f32,
    /// Keep the sphere at a constant apparent size instead of a fixed radius.
    pub auto_radius: bool,
    pub color: ShapeColor,
    pub opacity: f32,
}

impl Default for SphereShape {
    fn default() -> Self {
        Self {
            position: Vec3Fields::default(),
            radius: 1.0,
            auto_radius: false,
            color: ShapeColor::WHITE,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelShape {
    pub position: Vec3Fields,
    pub orientation: Option<QuatFields>,
    /// Asset path or URL. Without one a reference cube is drawn.
    pub url: Option<String>,
    pub unit: LengthUnit,
    /// Author-controlled multiplier on top of the unit conversion.
    pub scale_factor: f32,
    /// Opt this model into view-angle scaling (also gated globally).
    pub view_angle_scaling: bool,
    pub color: ShapeColor,
}

impl Default for ModelShape {
    fn default() -> Self {
        Self {
            position: Vec3Fields::default(),
            orientation: None,
            url: None,
            unit: LengthUnit::Kilometers,
            scale_factor: 1.0,
            view_angle_scaling: true,
            color: ShapeColor::WHITE,
        }
    }
}

impl ModelShape {
    /// The asset URL, treating blank strings as absent.
    pub fn resource_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolylineShape {
    pub points: Vec3Fields,
    pub color: ShapeColor,
    /// Requested stroke width in pixels. Most backends draw 1px lines.
    pub line_width: f32,
    pub close_path: bool,
    pub smooth: bool,
}

impl Default for PolylineShape {
    fn default() -> Self {
        Self {
            points: Vec3Fields::default(),
            color: ShapeColor::WHITE,
            line_width: 1.0,
            close_path: false,
            smooth: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationShape {
    pub position: Vec3Fields,
    pub text: DataField,
    pub color: ShapeColor,
    pub direction: CalloutDirection,
    /// Label glyph size in texture pixels.
    pub font_size: f32,
}

impl Default for AnnotationShape {
    fn default() -> Self {
        Self {
            position: Vec3Fields::default(),
            text: DataField::default(),
            color: ShapeColor::WHITE,
            direction: CalloutDirection::Normal,
            font_size: 32.0,
        }
    }
}

/// The type-specific part of a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Sphere(SphereShape),
    Model(ModelShape),
    Polyline(PolylineShape),
    Annotation(AnnotationShape),
}

impl ShapeKind {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Sphere(_) => "sphere",
            Self::Model(_) => "model",
            Self::Polyline(_) => "polyline",
            Self::Annotation(_) => "annotation",
        }
    }
}

/// One declarative entity and its data bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

fn default_visible() -> bool {
    true
}

impl Shape {
    pub fn new(id: impl Into<String>, kind: ShapeKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: ShapeId(id),
            visible: true,
            kind,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

// ── Global options ──────────────────────────────────────────────────────────

/// Global view-angle scaling parameters, mirrored into every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewAngleSettings {
    pub enabled: bool,
    /// Apparent size to maintain, in radians.
    pub target_angular_size: f32,
    /// Lower clamp on the computed scale multiplier.
    pub min_size: f32,
    /// Upper clamp on the computed scale multiplier.
    pub max_size: f32,
}

impl Default for ViewAngleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_angular_size: 0.02,
            min_size: 1e-3,
            max_size: 1e6,
        }
    }
}

/// A named camera position the host can jump to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPreset {
    pub tag: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_degrees: f32,
    pub presets: Vec<CameraPreset>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [20.0, 20.0, 20.0],
            target: [0.0, 0.0, 0.0],
            fov_degrees: 45.0,
            presets: Vec::new(),
        }
    }
}

impl CameraSettings {
    /// The preset registered under `tag`. The first one wins on duplicates.
    pub fn preset(&self, tag: &str) -> Option<&CameraPreset> {
        self.presets.iter().find(|preset| preset.tag == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightingSettings {
    pub ambient_brightness: f32,
    pub directional_illuminance: f32,
    /// Direction the directional light travels in.
    pub direction: [f32; 3],
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            ambient_brightness: 400.0,
            directional_illuminance: 8_000.0,
            direction: [-1.0, -1.0, -0.5],
        }
    }
}

/// Everything the host configures, delivered as one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneOptions {
    pub shapes: Vec<Shape>,
    pub camera: CameraSettings,
    pub lighting: LightingSettings,
    pub view_angle: ViewAngleSettings,
}

impl SceneOptions {
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Shapes that should be present in the scene.
    pub fn visible_shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().filter(|shape| shape.visible)
    }
}
