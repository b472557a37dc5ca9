use wgpu::util::DeviceExt;

use crate::components::mesh::{MeshComponent, Vertex};
use crate::systems::geospatial::coordinates::CoordinatesSystem;

pub struct MeshSystem<'a> {
    device: &'a wgpu::Device,
}

impl<'a> MeshSystem<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device }
    }

    pub fn create_vertex_buffer(&self, data: &[Vertex]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            })
    }

    pub fn create_index_buffer(&self, data: &[u32]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            })
    }

    pub fn create_model_matrix_bind_group_layout(&self) -> wgpu::BindGroupLayout {
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
                label: Some("Model Matrix Bind Group Layout"),
            })
    }

    pub fn create_model_matrix_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        model_matrix: [[f32; 4]; 4],
    ) -> (wgpu::BindGroup, wgpu::Buffer) {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Matrix Buffer"),
                contents: bytemuck::cast_slice(&[model_matrix]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("Model Matrix Bind Group"),
        });
        (bind_group, buffer)
    }

    /// Uploads geometry and a model matrix into a ready-to-draw component.
    pub fn create_mesh_component(
        &self,
        vertices: &[Vertex],
        indices: &[u32],
        model_matrix: [[f32; 4]; 4],
    ) -> MeshComponent {
        let model_matrix_bind_group_layout = self.create_model_matrix_bind_group_layout();
        let (model_matrix_bind_group, model_matrix_buffer) =
            self.create_model_matrix_bind_group(&model_matrix_bind_group_layout, model_matrix);
        MeshComponent {
            vertex_buffer: self.create_vertex_buffer(vertices),
            index_buffer: self.create_index_buffer(indices),
            num_indices: indices.len() as u32,
            model_matrix_buffer,
            model_matrix_bind_group_layout,
            model_matrix_bind_group,
            model_matrix,
        }
    }

    /// Uploads `model_matrix` unless the mesh already has it. Returns
    /// whether anything was written.
    pub fn write_model_matrix(
        queue: &wgpu::Queue,
        mesh: &mut MeshComponent,
        model_matrix: [[f32; 4]; 4],
    ) -> bool {
        if mesh.model_matrix == model_matrix {
            return false;
        }
        mesh.model_matrix = model_matrix;
        queue.write_buffer(
            &mesh.model_matrix_buffer,
            0,
            bytemuck::cast_slice(&[model_matrix]),
        );
        true
    }

    fn map(value: u32, start1: u32, stop1: u32, start2: f64, stop2: f64) -> f64 {
        start2
            + (stop2 - start2) * ((value as f64 - start1 as f64) / (stop1 as f64 - start1 as f64))
    }

    /// Latitude/longitude grid sphere as one stitched triangle strip.
    ///
    /// Rows run from the north pole to the south pole, columns from -180 to
    /// 180 degrees, so the shader can read geographic coordinates straight
    /// back out of the vertex positions.
    pub fn generate_sphere_mesh(radius: f32, total: u32) -> (Vec<Vertex>, Vec<u32>) {
        let mut vertices = Vec::with_capacity(((total + 1) * (total + 1)) as usize);
        let mut indices = Vec::new();

        for i in 0..=total {
            let lat = MeshSystem::map(i, 0, total, 90.0, -90.0);
            for j in 0..=total {
                let lon = MeshSystem::map(j, 0, total, -180.0, 180.0);
                let p = CoordinatesSystem::project(lat, lon, radius as f64);
                vertices.push(Vertex {
                    position: [p.x as f32, p.y as f32, p.z as f32],
                });
            }
        }

        for i in 0..total {
            for j in 0..=total {
                indices.push(i * (total + 1) + j); // current row
                indices.push((i + 1) * (total + 1) + j); // next row
            }

            if i != total - 1 {
                // degenerate pair stitches this strip to the next one
                indices.push((i + 1) * (total + 1) + total);
                indices.push((i + 1) * (total + 1));
            }
        }

        (vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn length(v: &Vertex) -> f32 {
        let [x, y, z] = v.position;
        (x * x + y * y + z * z).sqrt()
    }

    #[test]
    fn sphere_vertices_sit_on_the_radius() {
        let (vertices, _) = MeshSystem::generate_sphere_mesh(2.0, 32);
        assert_eq!(vertices.len(), 33 * 33);
        for v in &vertices {
            assert_abs_diff_eq!(length(v), 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn sphere_starts_at_the_north_pole() {
        let (vertices, _) = MeshSystem::generate_sphere_mesh(1.0, 8);
        let [x, y, z] = vertices[0].position;
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 0.0, epsilon = 1e-6);
        let [_, y, _] = vertices.last().unwrap().position;
        assert_abs_diff_eq!(y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn strip_indices_stay_in_bounds() {
        let total = 16;
        let (vertices, indices) = MeshSystem::generate_sphere_mesh(1.0, total);
        let per_strip = 2 * (total + 1) as usize;
        assert_eq!(indices.len(), per_strip * total as usize + 2 * (total as usize - 1));
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
