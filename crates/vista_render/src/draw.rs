//! CPU-side frame preparation: vertex interleaving, uniform layouts and the
//! per-frame draw list.

use std::sync::Arc;

use vista_core::{Light, Mesh, Scene};
use vista_math::{Camera, Mat4, Vec3, Vec4};

const DEFAULT_COLOR: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);

/// Estimated lights are directions; the shader wants a point far along it.
const ESTIMATED_LIGHT_DISTANCE: f32 = 100.0;

/// Vertex data for rendering
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }

    /// Interleave positions and normals. Meshes without normals get +Y.
    pub fn from_mesh(mesh: &Mesh) -> Vec<Vertex> {
        mesh.positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let n = mesh
                    .normals
                    .as_ref()
                    .and_then(|normals| normals.get(i))
                    .copied()
                    .unwrap_or(Vec3::Y);
                Vertex {
                    position: p.to_array(),
                    normal: n.to_array(),
                }
            })
            .collect()
    }
}

/// Camera and lighting, shared by every draw in a frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Summed ambient colour * intensity
    pub ambient: [f32; 4],
    /// World-space position of the key light
    pub light_position: [f32; 4],
    /// Key light colour * intensity
    pub light_color: [f32; 4],
}

impl FrameUniform {
    pub fn new(camera: &Camera, lights: &[Light]) -> Self {
        let mut ambient = Vec3::ZERO;
        let mut key = None;
        let mut estimated = None;

        for light in lights {
            match *light {
                Light::Ambient { color, intensity } => ambient += color * intensity,
                // Only the first directional light is shaded
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    key.get_or_insert((color * intensity, position));
                }
                Light::Estimated {
                    ambient: estimated_ambient,
                    color,
                    intensity,
                    direction,
                } => {
                    ambient += estimated_ambient;
                    estimated = Some((color * intensity, direction * ESTIMATED_LIGHT_DISTANCE));
                }
            }
        }

        let (light_color, light_position) = estimated.or(key).unwrap_or((Vec3::ZERO, Vec3::Y));

        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            ambient: ambient.extend(1.0).to_array(),
            light_position: light_position.extend(1.0).to_array(),
            light_color: light_color.extend(1.0).to_array(),
        }
    }
}

/// Per-draw data, bound with a dynamic offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// x: 1.0 for unlit
    pub flags: [f32; 4],
}

/// One mesh to draw this frame.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub mesh: Arc<Mesh>,
    pub world: Mat4,
    pub color: Vec4,
    pub unlit: bool,
}

impl DrawItem {
    pub fn is_transparent(&self) -> bool {
        self.color.w < 1.0
    }

    pub fn uniform(&self) -> DrawUniform {
        DrawUniform {
            model: self.world.to_cols_array_2d(),
            color: self.color.to_array(),
            flags: [if self.unlit { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// Flatten the visible scene into draws, opaque first so translucent
/// geometry (the reticle) blends over it.
pub fn collect_draws(scene: &Scene) -> Vec<DrawItem> {
    let mut draws = Vec::new();
    for object in scene.visible_objects() {
        object
            .graph
            .visit_meshes(object.model_matrix(), &mut |world, mesh, material| {
                let (color, unlit) = material.map_or((DEFAULT_COLOR, false), |m| (m.base_color, m.unlit));
                draws.push(DrawItem {
                    mesh: mesh.clone(),
                    world: *world,
                    color,
                    unlit,
                });
            });
    }
    draws.sort_by_key(DrawItem::is_transparent);
    draws
}

/// Cache key for an uploaded mesh.
pub fn mesh_key(mesh: &Arc<Mesh>) -> usize {
    Arc::as_ptr(mesh) as usize
}
