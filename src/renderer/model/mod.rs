//! The model pipeline: imports a glTF asset and turns it into GPU-resident
//! meshes that draw themselves with their material textures bound.
//!
//! Loading happens once, before the render loop; per-frame draws touch no
//! files and allocate no GPU resources.

use std::ffi::c_void;
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::renderer::gl;
use crate::renderer::shader::ShaderProgram;

mod cache;
pub mod scene;

use cache::TextureCache;

/// Vertex attribute locations of the model shader.
const ATTR_LOC_POSITION: gl::types::GLuint = 0;
const ATTR_LOC_NORMAL: gl::types::GLuint = 1;
const ATTR_LOC_TEX_COORDS: gl::types::GLuint = 2;

/// Why a model failed to load. Every variant aborts the whole load; there is
/// no partially constructed [`Model`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not a loadable glTF asset: {reason}", .path.display())]
    InvalidGltf { path: PathBuf, reason: String },
    #[error("{} uses an unsupported glTF feature: {reason}", .path.display())]
    Unsupported { path: PathBuf, reason: String },
}

/// One interleaved vertex as uploaded to the vertex buffer. The field order
/// and the attribute locations above are a binding contract with the model
/// shader's vertex stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

/// The texture kinds the shaders consume, each with a fixed sampler-name
/// prefix. The emitted uniform names (`material.texture_diffuse1`, ...) bind
/// to the fragment shader and must not change independently of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Diffuse,
    Specular,
}

impl TextureKind {
    /// Resolution order during load; also the binding order at draw time.
    pub const ALL: [TextureKind; 2] = [TextureKind::Diffuse, TextureKind::Specular];

    fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "material.texture_diffuse",
            TextureKind::Specular => "material.texture_specular",
        }
    }
}

/// A non-owning reference to a texture in the model's cache. Copies of one
/// upload are shared between every mesh whose material names the same file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRef {
    pub id: gl::types::GLuint,
    pub kind: TextureKind,
}

/// One drawable mesh: its CPU-side vertex/index data, its texture references
/// and the GPU buffer triple built from them.
///
/// The buffers are uploaded exactly once at construction and never resized;
/// the vertex and index arrays are immutable afterwards.
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<TextureRef>,
    vao: gl::types::GLuint,
    vbo: gl::types::GLuint,
    ebo: gl::types::GLuint,
}

impl Mesh {
    fn new(vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<TextureRef>) -> Mesh {
        let mut vao = 0;
        let mut vbo = 0;
        let mut ebo = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        gl::call!(gl::GenBuffers(1, &mut vbo));
        gl::call!(gl::GenBuffers(1, &mut ebo));

        gl::call!(gl::BindVertexArray(vao));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, vbo));
        gl::buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(&vertices), gl::STATIC_DRAW);
        gl::call!(gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, ebo));
        gl::buffer_data(
            gl::ELEMENT_ARRAY_BUFFER,
            bytemuck::cast_slice(&indices),
            gl::STATIC_DRAW,
        );

        let stride = mem::size_of::<Vertex>() as i32;
        gl::call!(gl::EnableVertexAttribArray(ATTR_LOC_POSITION));
        gl::call!(gl::VertexAttribPointer(
            ATTR_LOC_POSITION,
            3,
            gl::FLOAT,
            gl::FALSE,
            stride,
            ptr::null::<c_void>(),
        ));
        gl::call!(gl::EnableVertexAttribArray(ATTR_LOC_NORMAL));
        gl::call!(gl::VertexAttribPointer(
            ATTR_LOC_NORMAL,
            3,
            gl::FLOAT,
            gl::FALSE,
            stride,
            ptr::null::<c_void>().add(mem::offset_of!(Vertex, normal)),
        ));
        gl::call!(gl::EnableVertexAttribArray(ATTR_LOC_TEX_COORDS));
        gl::call!(gl::VertexAttribPointer(
            ATTR_LOC_TEX_COORDS,
            2,
            gl::FLOAT,
            gl::FALSE,
            stride,
            ptr::null::<c_void>().add(mem::offset_of!(Vertex, tex_coords)),
        ));
        gl::call!(gl::BindVertexArray(0));

        Mesh {
            vertices,
            indices,
            textures,
            vao,
            vbo,
            ebo,
        }
    }

    /// Binds this mesh's textures and issues its indexed draw call.
    ///
    /// Texture units 0..N-1 are claimed in stored-texture order, each unit's
    /// sampler uniform named by a per-kind 1-based counter. Texture-unit
    /// state is left as-is afterwards; callers must not rely on it.
    pub fn draw(&self, shader: &ShaderProgram) {
        for ((name, unit), texture) in sampler_uniforms(&self.textures)
            .into_iter()
            .zip(&self.textures)
        {
            gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit as u32));
            shader.set_int(&name, unit);
            gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture.id));
        }
        gl::call!(gl::BindVertexArray(self.vao));
        gl::call!(gl::DrawElements(
            gl::TRIANGLES,
            self.indices.len() as i32,
            gl::UNSIGNED_INT,
            ptr::null(),
        ));
        gl::call!(gl::BindVertexArray(0));
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(1, &self.vao));
        gl::call!(gl::DeleteBuffers(1, &self.vbo));
        gl::call!(gl::DeleteBuffers(1, &self.ebo));
    }
}

/// Sampler uniform name and texture unit for each texture, in binding order.
/// `material.texture_diffuse1` is the first diffuse texture, bound to the
/// first claimed unit, and so on per kind.
fn sampler_uniforms(textures: &[TextureRef]) -> Vec<(String, i32)> {
    let mut diffuse_count = 0;
    let mut specular_count = 0;
    textures
        .iter()
        .enumerate()
        .map(|(unit, texture)| {
            let count = match texture.kind {
                TextureKind::Diffuse => {
                    diffuse_count += 1;
                    diffuse_count
                }
                TextureKind::Specular => {
                    specular_count += 1;
                    specular_count
                }
            };
            (
                format!("{}{}", texture.kind.uniform_prefix(), count),
                unit as i32,
            )
        })
        .collect()
}

/// Every mesh built from one asset file, in traversal order, plus the
/// texture cache that owns their shared texture uploads.
pub struct Model {
    meshes: Vec<Mesh>,
    textures: TextureCache,
}

impl Model {
    /// Imports the asset at `path` and uploads everything the meshes need.
    /// Blocks until done; meant to run before the render loop starts.
    pub fn load(path: impl AsRef<Path>) -> Result<Model, LoadError> {
        let path = path.as_ref();
        let scene = scene::load_scene(
            path,
            // Required preprocessing: the extraction and draw paths assume
            // triangle lists with normals present.
            scene::LoadOptions {
                triangulate: true,
                generate_normals: true,
            },
        )?;
        let directory = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let mut textures = TextureCache::new(directory);
        let mut meshes = Vec::new();
        for primitive in primitives_in_draw_order(&scene) {
            let vertices = extract_vertices(primitive);
            let mut texture_refs = Vec::new();
            if let Some(material) = primitive.material.map(|index| &scene.materials[index]) {
                for kind in TextureKind::ALL {
                    texture_refs.extend(textures.material_textures(material, kind));
                }
            }
            log::debug!(
                "mesh {}: {} vertices, {} indices, {} textures",
                meshes.len(),
                vertices.len(),
                primitive.indices.len(),
                texture_refs.len(),
            );
            meshes.push(Mesh::new(vertices, primitive.indices.clone(), texture_refs));
        }
        Ok(Model { meshes, textures })
    }

    /// Draws every mesh in load order with the given shader bound.
    pub fn draw(&self, shader: &ShaderProgram) {
        for mesh in &self.meshes {
            mesh.draw(shader);
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

/// Depth-first walk of the node hierarchy: a node's own primitives first,
/// then its children in listed order. This order is the draw order and is
/// reproducible for the same asset.
fn primitives_in_draw_order(scene: &scene::Scene) -> Vec<&scene::Primitive> {
    fn visit<'s>(scene: &'s scene::Scene, node: usize, out: &mut Vec<&'s scene::Primitive>) {
        let node = &scene.nodes[node];
        if let Some(mesh) = node.mesh {
            out.extend(&scene.meshes[mesh].primitives);
        }
        for &child in &node.children {
            visit(scene, child, out);
        }
    }
    let mut primitives = Vec::new();
    for &root in &scene.root_nodes {
        visit(scene, root, &mut primitives);
    }
    primitives
}

/// Zips a primitive's attribute arrays into the interleaved vertex layout.
/// Primitives without a UV channel get (0, 0) for every vertex.
fn extract_vertices(primitive: &scene::Primitive) -> Vec<Vertex> {
    (0..primitive.positions.len())
        .map(|i| Vertex {
            position: primitive.positions[i],
            normal: primitive.normals[i],
            tex_coords: primitive
                .texcoords
                .as_ref()
                .map_or([0.0, 0.0], |texcoords| texcoords[i]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::scene::{Node, Primitive, Scene};

    fn primitive(marker: f32) -> Primitive {
        Primitive {
            positions: vec![[marker, 0.0, 0.0]],
            normals: vec![[0.0, 1.0, 0.0]],
            texcoords: None,
            indices: vec![0],
            material: None,
        }
    }

    #[test]
    fn extraction_interleaves_attributes() {
        let primitive = Primitive {
            positions: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            normals: vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            texcoords: Some(vec![[0.25, 0.5], [0.75, 1.0]]),
            indices: vec![0, 1, 0],
            material: None,
        };
        assert_eq!(
            extract_vertices(&primitive),
            vec![
                Vertex {
                    position: [1.0, 2.0, 3.0],
                    normal: [0.0, 1.0, 0.0],
                    tex_coords: [0.25, 0.5],
                },
                Vertex {
                    position: [4.0, 5.0, 6.0],
                    normal: [1.0, 0.0, 0.0],
                    tex_coords: [0.75, 1.0],
                },
            ]
        );
    }

    #[test]
    fn extraction_defaults_missing_uvs_to_zero() {
        let primitive = Primitive {
            positions: vec![[0.0; 3]; 3],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            texcoords: None,
            indices: vec![0, 1, 2],
            material: None,
        };
        let vertices = extract_vertices(&primitive);
        assert_eq!(vertices.len(), 3);
        assert!(vertices.iter().all(|vertex| vertex.tex_coords == [0.0, 0.0]));
    }

    #[test]
    fn traversal_is_depth_first_in_listed_order() {
        // root(mesh 0) -> [a(mesh 1, child b), c(mesh 2)]; b has mesh 0 again.
        let scene = Scene {
            root_nodes: vec![0],
            nodes: vec![
                Node { mesh: Some(0), children: vec![1, 3] },
                Node { mesh: Some(1), children: vec![2] },
                Node { mesh: Some(0), children: vec![] },
                Node { mesh: Some(2), children: vec![] },
            ],
            meshes: vec![
                scene::Mesh { primitives: vec![primitive(0.0)] },
                scene::Mesh { primitives: vec![primitive(1.0), primitive(2.0)] },
                scene::Mesh { primitives: vec![primitive(3.0)] },
            ],
            materials: vec![],
        };
        let order: Vec<f32> = primitives_in_draw_order(&scene)
            .iter()
            .map(|primitive| primitive.positions[0][0])
            .collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 0.0, 3.0]);
    }

    #[test]
    fn sampler_uniforms_count_per_kind() {
        let textures = [
            TextureRef { id: 10, kind: TextureKind::Diffuse },
            TextureRef { id: 11, kind: TextureKind::Diffuse },
            TextureRef { id: 12, kind: TextureKind::Specular },
        ];
        assert_eq!(
            sampler_uniforms(&textures),
            vec![
                ("material.texture_diffuse1".to_string(), 0),
                ("material.texture_diffuse2".to_string(), 1),
                ("material.texture_specular1".to_string(), 2),
            ]
        );
    }

    #[test]
    fn sampler_counters_are_independent_of_interleaving() {
        let textures = [
            TextureRef { id: 1, kind: TextureKind::Specular },
            TextureRef { id: 2, kind: TextureKind::Diffuse },
            TextureRef { id: 3, kind: TextureKind::Specular },
        ];
        assert_eq!(
            sampler_uniforms(&textures),
            vec![
                ("material.texture_specular1".to_string(), 0),
                ("material.texture_diffuse1".to_string(), 1),
                ("material.texture_specular2".to_string(), 2),
            ]
        );
    }
}
