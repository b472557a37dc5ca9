pub mod camera;
pub mod globe;
pub mod material;
pub mod mesh;
pub mod render_pipelines;
