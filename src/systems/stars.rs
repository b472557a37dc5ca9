use bevy_ecs::{entity::Entity, world::World};
use cgmath::SquareMatrix;
use rand::Rng;

use crate::components::{
    camera::CameraComponent, globe::StarFieldComponent, mesh::Vertex,
    render_pipelines::RenderPipelineComponent,
};
use crate::matrix4_to_array;

use super::{mesh::MeshSystem, render_pipelines::PointRenderPipelineSystem};

pub const STAR_COUNT: usize = 20_000;
pub const STAR_INNER_RADIUS: f32 = 300.0;
pub const STAR_OUTER_RADIUS: f32 = 360.0;

pub struct StarSystem {}

impl StarSystem {
    /// Points spread evenly over directions, at a random depth inside the shell.
    pub fn generate_star_field<R: Rng>(
        rng: &mut R,
        count: usize,
        inner_radius: f32,
        outer_radius: f32,
    ) -> Vec<Vertex> {
        (0..count)
            .map(|_| {
                let z: f32 = rng.gen_range(-1.0..=1.0);
                let theta: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
                let radius: f32 = rng.gen_range(inner_radius..=outer_radius);
                let ring = (1.0 - z * z).max(0.0).sqrt();
                Vertex {
                    position: [
                        radius * ring * theta.cos(),
                        radius * ring * theta.sin(),
                        radius * z,
                    ],
                }
            })
            .collect()
    }

    pub fn spawn_star_field(
        device: &wgpu::Device,
        world: &mut World,
        camera: &CameraComponent,
        texture_format: wgpu::TextureFormat,
    ) -> Entity {
        let vertices = StarSystem::generate_star_field(
            &mut rand::thread_rng(),
            STAR_COUNT,
            STAR_INNER_RADIUS,
            STAR_OUTER_RADIUS,
        );
        let indices: Vec<u32> = (0..vertices.len() as u32).collect();
        let mesh = MeshSystem::new(device).create_mesh_component(
            &vertices,
            &indices,
            matrix4_to_array(cgmath::Matrix4::identity()),
        );

        let shader =
            device.create_shader_module(wgpu::include_wgsl!("../shaders/star_shader.wgsl"));
        let pipeline_system = PointRenderPipelineSystem::new(device);
        let layouts: &[&wgpu::BindGroupLayout] = &[
            &camera.camera_bind_group_layout,
            &mesh.model_matrix_bind_group_layout,
        ];
        let render_pipeline_layout = pipeline_system.layout_desc(layouts);
        let render_pipeline =
            pipeline_system.pipeline_desc(&render_pipeline_layout, &shader, texture_format);

        world
            .spawn((
                StarFieldComponent,
                mesh,
                RenderPipelineComponent {
                    render_pipeline,
                    render_pipeline_layout,
                    translucent: false,
                },
            ))
            .id()
    }
}
