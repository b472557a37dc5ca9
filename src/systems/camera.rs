use wgpu::util::DeviceExt;

use crate::components::camera::{Camera, CameraComponent, CameraController, CameraUniform};
use crate::{INITIAL_EYE, MAX_CAMERA_DISTANCE, MIN_CAMERA_DISTANCE};

pub struct CameraSystem<'a> {
    device: &'a wgpu::Device,
}

impl<'a> CameraSystem<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    pub fn create_camera(&self, screen_width: u32, screen_height: u32) -> CameraComponent {
        let camera = Camera {
            // +z is out of the screen
            eye: INITIAL_EYE.into(),
            target: (0.0, 0.0, 0.0).into(),
            up: cgmath::Vector3::unit_y(),
            aspect: screen_width as f32 / screen_height.max(1) as f32,
            fovy: 45.0,
            znear: 0.1,
            zfar: 1000.0,
        };

        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera);

        let camera_buffer = CameraSystem::create_uniform_buffer(self.device, &camera_uniform);
        let camera_bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                    label: Some("Camera Component Uniform Bind Group Layout"),
                });

        let camera_bind_group = CameraSystem::create_uniform_bind_group(
            self.device,
            &camera_buffer,
            &camera_bind_group_layout,
        );
        let camera_controller =
            CameraController::new(0.05, MIN_CAMERA_DISTANCE, MAX_CAMERA_DISTANCE);

        CameraComponent {
            camera,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            camera_bind_group_layout,
            camera_controller,
        }
    }

    pub fn resize(camera_component: &mut CameraComponent, screen_width: u32, screen_height: u32) {
        camera_component.camera.aspect = screen_width as f32 / screen_height.max(1) as f32;
    }

    /// Pushes the current eye/target to the GPU.
    pub fn write_uniform(queue: &wgpu::Queue, camera_component: &mut CameraComponent) {
        camera_component
            .camera_uniform
            .update_view_proj(&camera_component.camera);
        queue.write_buffer(
            &camera_component.camera_buffer,
            0,
            bytemuck::cast_slice(&[camera_component.camera_uniform]),
        );
    }
}

impl<'a> CameraSystem<'a> {
    fn create_uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, data: &T) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Component Uniform Buffer"),
            contents: bytemuck::bytes_of(data),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    fn create_uniform_bind_group(
        device: &wgpu::Device,
        buffer: &wgpu::Buffer,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("Camera Component Uniform Bind Group"),
        })
    }
}
