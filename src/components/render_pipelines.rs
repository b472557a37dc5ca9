use bevy_ecs::component::Component;

#[derive(Component)]
pub struct RenderPipelineComponent {
    pub render_pipeline: wgpu::RenderPipeline,
    pub render_pipeline_layout: wgpu::PipelineLayout,
    /// Blended and drawn after everything opaque.
    pub translucent: bool,
}

#[cfg(target_arch = "wasm32")]
unsafe impl Send for RenderPipelineComponent {}
#[cfg(target_arch = "wasm32")]
unsafe impl Sync for RenderPipelineComponent {}
