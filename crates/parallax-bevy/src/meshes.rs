//! Mesh, material, and texture builders for scene primitives.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, PrimitiveTopology, TextureDimension, TextureFormat};
use parallax_core::bounds::Bounds3;
use parallax_core::shape::ShapeColor;

/// Convert a core vector into a Bevy one.
pub fn to_vec3(v: glam::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

/// Convert a core quaternion into a Bevy one.
pub fn to_quat(q: glam::Quat) -> Quat {
    Quat::from_array(q.to_array())
}

pub fn to_color(color: ShapeColor, alpha: f32) -> Color {
    let [r, g, b, a] = color.to_srgba_f32(alpha);
    Color::srgba(r, g, b, a)
}

/// A line strip through `points`.
pub fn line_strip(points: &[glam::Vec3]) -> Mesh {
    let positions: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();
    Mesh::new(
        PrimitiveTopology::LineStrip,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
}

/// Unlit material for lines and connectors.
pub fn line_material(color: ShapeColor) -> StandardMaterial {
    StandardMaterial {
        base_color: to_color(color, 1.0),
        unlit: true,
        ..default()
    }
}

/// Lit material for solid bodies. Translucent when `opacity < 1`.
pub fn body_material(color: ShapeColor, opacity: f32) -> StandardMaterial {
    let alpha_mode = if opacity < 1.0 {
        AlphaMode::Blend
    } else {
        AlphaMode::Opaque
    };
    StandardMaterial {
        base_color: to_color(color, opacity),
        alpha_mode,
        perceptual_roughness: 0.6,
        ..default()
    }
}

/// Unlit, double-sided material showing a label texture.
pub fn label_material(texture: Handle<Image>) -> StandardMaterial {
    StandardMaterial {
        base_color_texture: Some(texture),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

/// Upload a rasterized label as an sRGB texture.
pub fn label_image(label: ::image::RgbaImage) -> Image {
    let (width, height) = label.dimensions();
    Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        label.into_raw(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
}

/// Local-space bounds of a mesh's vertex positions.
pub fn mesh_bounds(mesh: &Mesh) -> Option<Bounds3> {
    let positions = mesh.attribute(Mesh::ATTRIBUTE_POSITION)?.as_float3()?;
    Bounds3::from_points(positions.iter().map(|p| glam::Vec3::from_array(*p)))
}
