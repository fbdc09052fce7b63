// GPU vertex/instance layouts and the unit cube every renderable entity draws.
//
// One instanced draw call covers the whole scene: the cube is uploaded once,
// and each entity contributes its world matrix and color as instance data.

use glam::{Mat4, Vec3};

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex with position and normal.
///   @location(0) position: vec3<f32>
///   @location(1) normal:   vec3<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

// ============================================================================
// INSTANCE DATA (per-entity)
// ============================================================================

/// World matrix (four columns) plus color.
///   @location(2..=5) model columns
///   @location(6)     color
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4
    ];

    pub fn new(model: Mat4, color: [f32; 4]) -> Self {
        Self { model: model.to_cols_array_2d(), color }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,  // One per instance, not per vertex
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// ============================================================================
// UNIT CUBE
// ============================================================================

/// Triangle mesh ready for upload.
pub struct RenderMesh {
    pub vertices: Vec<GpuVertex>,
    pub indices:  Vec<u16>,
}

/// Unit cube centred on the origin (side 1.0), four vertices per face so each
/// face carries a flat normal. Triangles wind CCW seen from outside.
pub fn unit_cube() -> RenderMesh {
    // (normal, u, v) with u × v = normal
    let faces = [
        (Vec3::X,     Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z,     Vec3::Y),
        (Vec3::Y,     Vec3::X,     Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X,     Vec3::Z),
        (Vec3::Z,     Vec3::X,     Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u16;
        let centre = normal * 0.5;
        for (su, sv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            vertices.push(GpuVertex {
                position: (centre + u * su + v * sv).to_array(),
                normal:   normal.to_array(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    RenderMesh { vertices, indices }
}
