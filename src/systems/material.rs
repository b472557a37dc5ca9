use wgpu::util::DeviceExt;

use crate::components::material::{MaterialComponent, MaterialUniform};

/// Sun direction shared by every lit material.
pub const LIGHT_DIRECTION: [f32; 4] = [10.0, 10.0, 5.0, 0.0];

pub const OCEAN_COLOR: [f32; 4] = [0.05, 0.22, 0.48, 1.0];
pub const MARKER_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
/// Alpha is the opacity of the thickest cloud.
pub const CLOUD_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.8];

pub struct MaterialSystem<'a> {
    device: &'a wgpu::Device,
}

impl<'a> MaterialSystem<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    /// Colour/light uniform block bound at group 1 next to `shader`.
    pub fn create_color_material(
        &self,
        uniforms: MaterialUniform,
        shader: wgpu::ShaderModule,
    ) -> MaterialComponent {
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Material Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                    label: Some("Material Bind Group Layout"),
                });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("Material Bind Group"),
        });

        // the bind group keeps the uniform buffer alive
        MaterialComponent {
            bind_group,
            bind_group_layout,
            shader,
        }
    }

    pub fn globe_material(&self) -> MaterialComponent {
        self.create_color_material(
            MaterialUniform {
                color: OCEAN_COLOR,
                light_direction: LIGHT_DIRECTION,
            },
            self.device
                .create_shader_module(wgpu::include_wgsl!("../shaders/globe_shader.wgsl")),
        )
    }

    pub fn marker_material(&self) -> MaterialComponent {
        self.create_color_material(
            MaterialUniform {
                color: MARKER_COLOR,
                light_direction: LIGHT_DIRECTION,
            },
            self.device
                .create_shader_module(wgpu::include_wgsl!("../shaders/marker_shader.wgsl")),
        )
    }

    pub fn cloud_material(&self) -> MaterialComponent {
        self.create_color_material(
            MaterialUniform {
                color: CLOUD_COLOR,
                light_direction: LIGHT_DIRECTION,
            },
            self.device
                .create_shader_module(wgpu::include_wgsl!("../shaders/cloud_shader.wgsl")),
        )
    }
}
