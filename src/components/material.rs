use bevy_ecs::component::Component;

/// Flat colour plus a light direction, laid out for a 16-byte aligned
/// uniform block (WebGL2 is strict about it).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub light_direction: [f32; 4],
}

#[derive(Component)]
pub struct MaterialComponent {
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub shader: wgpu::ShaderModule,
}

#[cfg(target_arch = "wasm32")]
unsafe impl Send for MaterialComponent {}
#[cfg(target_arch = "wasm32")]
unsafe impl Sync for MaterialComponent {}
