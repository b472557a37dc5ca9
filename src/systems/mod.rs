pub mod camera;
pub mod clock;
pub mod geospatial;
pub mod globe;
pub mod material;
pub mod mesh;
pub mod render_pipelines;
pub mod stars;
