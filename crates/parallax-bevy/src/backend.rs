//! [`SceneBackend`] implementation over Bevy's ECS and asset collections.
//!
//! Each shape becomes one root entity carrying the node transform, with the
//! visible parts as children. Every mesh, material, and texture created for a
//! node is recorded on it and removed from its `Assets` collection when the
//! node is rebuilt or despawned.

use bevy::asset::LoadState;
use bevy::ecs::system::SystemParam;
use bevy::gltf::{Gltf, GltfMesh};
use bevy::prelude::*;
use parallax_core::bounds::Bounds3;
use parallax_core::error::{ModelLoadError, SceneError};
use parallax_core::factory::{CalloutSpec, Primitive};
use parallax_core::geometry::callout::CalloutLayout;
use parallax_core::label::{LabelStyle, rasterize_label};
use parallax_core::scene::{LoadedModel, ModelTicket, NodeTransform, SceneBackend};
use parallax_core::shape::ShapeId;

use crate::meshes::{
    body_material, label_image, label_material, line_material, line_strip, mesh_bounds, to_quat,
    to_vec3,
};
use crate::resources::{LabelFontState, PendingModelLoads};

/// Marks the root entity of a reconciled shape.
#[derive(Component, Debug, Clone)]
pub struct ShapeRoot {
    pub id: ShapeId,
}

/// Marks a callout label quad.
#[derive(Component)]
pub struct CalloutLabel;

#[derive(Debug)]
struct CalloutParts {
    connector_mesh: Handle<Mesh>,
    label: Entity,
}

/// A reconciled node: its root entity and every asset created for it.
#[derive(Debug)]
pub struct SceneNode {
    pub entity: Entity,
    children: Vec<Entity>,
    meshes: Vec<Handle<Mesh>>,
    materials: Vec<Handle<StandardMaterial>>,
    images: Vec<Handle<Image>>,
    callouts: Vec<CalloutParts>,
}

impl SceneNode {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            children: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            images: Vec::new(),
            callouts: Vec::new(),
        }
    }
}

/// Everything the reconciler needs to touch the live scene.
#[derive(SystemParam)]
pub struct BevySceneBackend<'w, 's> {
    commands: Commands<'w, 's>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    images: ResMut<'w, Assets<Image>>,
    gltfs: Res<'w, Assets<Gltf>>,
    gltf_meshes: Res<'w, Assets<GltfMesh>>,
    asset_server: Res<'w, AssetServer>,
    pending: ResMut<'w, PendingModelLoads>,
    label_font: Res<'w, LabelFontState>,
}

impl BevySceneBackend<'_, '_> {
    fn child(&mut self, node: &mut SceneNode, bundle: impl Bundle) -> Entity {
        let child = self.commands.spawn((bundle, ChildOf(node.entity))).id();
        node.children.push(child);
        child
    }

    fn add_mesh(&mut self, node: &mut SceneNode, mesh: Mesh) -> Handle<Mesh> {
        let handle = self.meshes.add(mesh);
        node.meshes.push(handle.clone());
        handle
    }

    fn add_material(
        &mut self,
        node: &mut SceneNode,
        material: StandardMaterial,
    ) -> Handle<StandardMaterial> {
        let handle = self.materials.add(material);
        node.materials.push(handle.clone());
        handle
    }

    /// Build the visible children for `primitive` under `node`.
    fn build(&mut self, node: &mut SceneNode, primitive: &Primitive) {
        match primitive {
            Primitive::Sphere {
                radius,
                color,
                opacity,
            } => {
                let mesh = self.add_mesh(node, Mesh::from(Sphere::new(*radius)));
                let material = self.add_material(node, body_material(*color, *opacity));
                self.child(node, (Mesh3d(mesh), MeshMaterial3d(material), Transform::IDENTITY));
            }
            Primitive::Cube { edge, color } => {
                let mesh = self.add_mesh(node, Mesh::from(Cuboid::from_length(*edge)));
                let material = self.add_material(node, body_material(*color, 1.0));
                self.child(node, (Mesh3d(mesh), MeshMaterial3d(material), Transform::IDENTITY));
            }
            Primitive::Polyline { points, color } => {
                if points.len() < 2 {
                    return;
                }
                let mesh = self.add_mesh(node, line_strip(points));
                let material = self.add_material(node, line_material(*color));
                self.child(node, (Mesh3d(mesh), MeshMaterial3d(material), Transform::IDENTITY));
            }
            Primitive::Annotation {
                callouts,
                color,
                font_size,
                ..
            } => {
                let connector_material = self.add_material(node, line_material(*color));
                let quad = self.add_mesh(node, Mesh::from(Rectangle::new(1.0, 1.0)));
                let style = LabelStyle::from_color(*color);
                for callout in callouts {
                    self.build_callout(node, callout, &style, *font_size, &connector_material, &quad);
                }
            }
        }
    }

    fn build_callout(
        &mut self,
        node: &mut SceneNode,
        callout: &CalloutSpec,
        style: &LabelStyle,
        font_size: f32,
        connector_material: &Handle<StandardMaterial>,
        quad: &Handle<Mesh>,
    ) {
        let anchor = callout.anchor;
        let connector_mesh = self.add_mesh(node, line_strip(&[anchor, anchor, anchor]));
        self.child(
            node,
            (
                Mesh3d(connector_mesh.clone()),
                MeshMaterial3d(connector_material.clone()),
                Transform::IDENTITY,
            ),
        );

        let raster = rasterize_label(&callout.text, font_size, style, self.label_font.font.as_ref());
        let texture = self.images.add(label_image(raster));
        node.images.push(texture.clone());
        let material = self.add_material(node, label_material(texture));
        let label = self.child(
            node,
            (
                Mesh3d(quad.clone()),
                MeshMaterial3d(material),
                Transform::from_translation(to_vec3(anchor)),
                CalloutLabel,
                Name::new(format!("callout {}", callout.text)),
            ),
        );

        node.callouts.push(CalloutParts {
            connector_mesh,
            label,
        });
    }

    /// Despawn a node's children and release every asset it owns.
    fn release(&mut self, node: &mut SceneNode) {
        for child in node.children.drain(..) {
            self.commands.entity(child).despawn();
        }
        for mesh in node.meshes.drain(..) {
            self.meshes.remove(&mesh);
        }
        for material in node.materials.drain(..) {
            self.materials.remove(&material);
        }
        for image in node.images.drain(..) {
            self.images.remove(&image);
        }
        node.callouts.clear();
    }

    /// Check every in-flight glTF load and return the finished ones.
    pub fn take_finished_loads(
        &mut self,
    ) -> Vec<(ModelTicket, Result<LoadedModel<Handle<Scene>>, ModelLoadError>)> {
        let mut finished = Vec::new();
        let mut still_pending = Vec::new();

        for (ticket, handle) in std::mem::take(&mut self.pending.loads) {
            if let Some(LoadState::Failed(err)) = self.asset_server.get_load_state(&handle) {
                let error = ModelLoadError::Failed {
                    url: ticket.url.clone(),
                    reason: err.to_string(),
                };
                finished.push((ticket, Err(error)));
                continue;
            }
            if !self.asset_server.is_loaded_with_dependencies(&handle) {
                still_pending.push((ticket, handle));
                continue;
            }
            let result = self.loaded_model(&ticket, &handle);
            finished.push((ticket, result));
        }

        self.pending.loads = still_pending;
        finished
    }

    fn loaded_model(
        &self,
        ticket: &ModelTicket,
        handle: &Handle<Gltf>,
    ) -> Result<LoadedModel<Handle<Scene>>, ModelLoadError> {
        let gltf = self.gltfs.get(handle).ok_or_else(|| ModelLoadError::Failed {
            url: ticket.url.clone(),
            reason: "asset missing after load".into(),
        })?;
        let scene = gltf
            .default_scene
            .clone()
            .or_else(|| gltf.scenes.first().cloned())
            .ok_or_else(|| ModelLoadError::MissingScene {
                url: ticket.url.clone(),
            })?;
        Ok(LoadedModel {
            asset: scene,
            bounds: self.gltf_bounds(gltf),
        })
    }

    /// Union of the bounds of every primitive mesh in the file.
    ///
    /// Node transforms inside the file are not applied.
    fn gltf_bounds(&self, gltf: &Gltf) -> Option<Bounds3> {
        gltf.meshes
            .iter()
            .filter_map(|handle| self.gltf_meshes.get(handle))
            .flat_map(|mesh| mesh.primitives.iter())
            .filter_map(|primitive| self.meshes.get(&primitive.mesh).and_then(mesh_bounds))
            .reduce(Bounds3::union)
    }
}

impl SceneBackend for BevySceneBackend<'_, '_> {
    type Node = SceneNode;
    type Model = Handle<Scene>;

    fn spawn(&mut self, id: &ShapeId, primitive: &Primitive) -> Result<SceneNode, SceneError> {
        let entity = self
            .commands
            .spawn((
                ShapeRoot { id: id.clone() },
                Transform::IDENTITY,
                Visibility::default(),
                Name::new(format!("shape {id}")),
            ))
            .id();
        let mut node = SceneNode::new(entity);
        self.build(&mut node, primitive);
        Ok(node)
    }

    fn spawn_model(&mut self, id: &ShapeId, model: Handle<Scene>) -> Result<SceneNode, SceneError> {
        let entity = self
            .commands
            .spawn((
                ShapeRoot { id: id.clone() },
                Transform::IDENTITY,
                Visibility::default(),
                Name::new(format!("model {id}")),
            ))
            .id();
        let mut node = SceneNode::new(entity);
        self.child(&mut node, (SceneRoot(model), Transform::IDENTITY));
        Ok(node)
    }

    fn rebuild(&mut self, node: &mut SceneNode, primitive: &Primitive) -> Result<(), SceneError> {
        self.release(node);
        self.build(node, primitive);
        Ok(())
    }

    fn set_transform(&mut self, node: &SceneNode, transform: &NodeTransform) {
        self.commands.entity(node.entity).insert(Transform {
            translation: to_vec3(transform.translation),
            rotation: to_quat(transform.rotation),
            scale: Vec3::splat(transform.scale),
        });
    }

    fn set_callout_layout(&mut self, node: &SceneNode, index: usize, layout: &CalloutLayout) {
        let Some(parts) = node.callouts.get(index) else {
            return;
        };
        if let Some(mut mesh) = self.meshes.get_mut(&parts.connector_mesh) {
            let positions: Vec<[f32; 3]> = layout.connector.iter().map(|p| p.to_array()).collect();
            mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        }
        self.commands.entity(parts.label).insert(Transform {
            translation: to_vec3(layout.label_center),
            rotation: to_quat(layout.label_rotation),
            scale: Vec3::new(layout.label_size.x, layout.label_size.y, 1.0),
        });
    }

    fn despawn(&mut self, mut node: SceneNode) {
        self.release(&mut node);
        self.commands.entity(node.entity).despawn();
    }

    fn load_model(&mut self, ticket: ModelTicket) {
        let handle = self.asset_server.load::<Gltf>(ticket.url.clone());
        self.pending.loads.push((ticket, handle));
    }
}
