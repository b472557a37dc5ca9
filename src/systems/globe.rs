use bevy_ecs::{entity::Entity, query::With, world::World};
use cgmath::{EuclideanSpace, Rad};

use crate::components::{
    camera::CameraComponent,
    globe::{CloudComponent, GlobeComponent, MarkerComponent},
    material::MaterialComponent,
    mesh::MeshComponent,
    render_pipelines::RenderPipelineComponent,
};
use crate::controller::AppController;
use crate::{matrix4_to_array, MARKER_RADIUS, PLANET_RADIUS};

use super::{
    material::MaterialSystem, mesh::MeshSystem, render_pipelines::MeshRenderPipelineSystem,
};

const GLOBE_SEGMENTS: u32 = 90;
const MARKER_SEGMENTS: u32 = 16;
/// Radius of the cloud shell, just above the surface.
pub const CLOUD_RADIUS: f32 = 2.02;

/// Model matrices for everything that moves with the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMatrices {
    pub globe: [[f32; 4]; 4],
    pub clouds: [[f32; 4]; 4],
    pub marker: Option<[[f32; 4]; 4]>,
}

impl SceneMatrices {
    pub fn from_controller(controller: &AppController) -> Self {
        let spin_about_y = |spin: Rad<f64>| {
            matrix4_to_array(cgmath::Matrix4::from_angle_y(Rad(spin.0 as f32)))
        };
        Self {
            globe: spin_about_y(controller.spin()),
            clouds: spin_about_y(controller.cloud_spin()),
            marker: controller
                .marker_position()
                .and_then(|p| p.to_vec().cast::<f32>())
                .map(|p| matrix4_to_array(cgmath::Matrix4::from_translation(p))),
        }
    }
}

/// Builds the globe, cloud and marker entities and keeps them in step with
/// the controller.
pub struct GlobeSystem<'a> {
    device: &'a wgpu::Device,
    texture_format: wgpu::TextureFormat,
}

impl<'a> GlobeSystem<'a> {
    pub fn new(device: &'a wgpu::Device, texture_format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            texture_format,
        }
    }

    pub fn spawn_globe(&self, world: &mut World, camera: &CameraComponent) -> Entity {
        let (vertices, indices) =
            MeshSystem::generate_sphere_mesh(PLANET_RADIUS as f32, GLOBE_SEGMENTS);
        let mesh = MeshSystem::new(self.device).create_mesh_component(
            &vertices,
            &indices,
            matrix4_to_array(cgmath::Matrix4::from_angle_y(Rad(0.0))),
        );
        let material = MaterialSystem::new(self.device).globe_material();
        let pipeline = self.lit_pipeline(
            MeshRenderPipelineSystem::new(self.device),
            camera,
            &material,
            &mesh,
        );

        world
            .spawn((GlobeComponent, mesh, material, pipeline))
            .id()
    }

    pub fn spawn_clouds(&self, world: &mut World, camera: &CameraComponent) -> Entity {
        let (vertices, indices) = MeshSystem::generate_sphere_mesh(CLOUD_RADIUS, GLOBE_SEGMENTS);
        let mesh = MeshSystem::new(self.device).create_mesh_component(
            &vertices,
            &indices,
            matrix4_to_array(cgmath::Matrix4::from_angle_y(Rad(0.0))),
        );
        let material = MaterialSystem::new(self.device).cloud_material();
        let pipeline = self.lit_pipeline(
            MeshRenderPipelineSystem::translucent(self.device),
            camera,
            &material,
            &mesh,
        );

        world
            .spawn((CloudComponent, mesh, material, pipeline))
            .id()
    }

    pub fn spawn_marker(
        &self,
        world: &mut World,
        camera: &CameraComponent,
        controller: &AppController,
    ) -> Option<Entity> {
        let selection = controller.selection()?;
        let position = controller.marker_position()?;

        let (vertices, indices) = MeshSystem::generate_sphere_mesh(MARKER_RADIUS, MARKER_SEGMENTS);
        let mesh = MeshSystem::new(self.device).create_mesh_component(
            &vertices,
            &indices,
            matrix4_to_array(cgmath::Matrix4::from_translation(
                position.to_vec().cast::<f32>()?,
            )),
        );
        let material = MaterialSystem::new(self.device).marker_material();
        let pipeline = self.lit_pipeline(
            MeshRenderPipelineSystem::new(self.device),
            camera,
            &material,
            &mesh,
        );

        let marker = MarkerComponent {
            lat: selection.lat,
            lng: selection.lng,
        };
        tracing::debug!(lat = marker.lat, lng = marker.lng, "marker placed");
        Some(world.spawn((marker, mesh, material, pipeline)).id())
    }

    /// Spawns, replaces or removes the marker so it matches the selection.
    pub fn sync_marker(
        &self,
        world: &mut World,
        marker: &mut Option<Entity>,
        camera: &CameraComponent,
        controller: &AppController,
    ) {
        let wanted = controller.selection().map(|s| (s.lat, s.lng));
        let current = marker
            .and_then(|entity| world.get::<MarkerComponent>(entity))
            .map(|m| (m.lat, m.lng));
        if wanted == current {
            return;
        }

        if let Some(entity) = marker.take() {
            world.despawn(entity);
            tracing::debug!("marker removed");
        }
        *marker = self.spawn_marker(world, camera, controller);
    }

    /// Writes both spins into the globe and cloud model matrices and
    /// re-pins the marker. Unchanged matrices are not uploaded again.
    pub fn update_model_matrices(world: &mut World, queue: &wgpu::Queue, controller: &AppController) {
        let matrices = SceneMatrices::from_controller(controller);

        let mut globes = world.query_filtered::<&mut MeshComponent, With<GlobeComponent>>();
        for mut mesh in globes.iter_mut(world) {
            MeshSystem::write_model_matrix(queue, &mut mesh, matrices.globe);
        }

        let mut clouds = world.query_filtered::<&mut MeshComponent, With<CloudComponent>>();
        for mut mesh in clouds.iter_mut(world) {
            MeshSystem::write_model_matrix(queue, &mut mesh, matrices.clouds);
        }

        if let Some(marker_matrix) = matrices.marker {
            let mut markers = world.query_filtered::<&mut MeshComponent, With<MarkerComponent>>();
            for mut mesh in markers.iter_mut(world) {
                MeshSystem::write_model_matrix(queue, &mut mesh, marker_matrix);
            }
        }
    }

    fn lit_pipeline(
        &self,
        pipeline_system: MeshRenderPipelineSystem,
        camera: &CameraComponent,
        material: &MaterialComponent,
        mesh: &MeshComponent,
    ) -> RenderPipelineComponent {
        let layouts: &[&wgpu::BindGroupLayout] = &[
            &camera.camera_bind_group_layout,
            &material.bind_group_layout,
            &mesh.model_matrix_bind_group_layout,
        ];
        let render_pipeline_layout = pipeline_system.layout_desc(layouts);
        let render_pipeline = pipeline_system.pipeline_desc(
            &render_pipeline_layout,
            &material.shader,
            self.texture_format,
        );
        RenderPipelineComponent {
            render_pipeline,
            render_pipeline_layout,
            translucent: pipeline_system.is_translucent(),
        }
    }
}
