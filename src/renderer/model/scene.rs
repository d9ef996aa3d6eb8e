//! glTF import: parses a `.gltf` file plus its external `.bin` buffers into
//! flat, index-linked arrays that the model loader walks.
//!
//! Only the features the viewer needs are supported. GLB containers, `data:`
//! URIs, interleaved (`byteStride`) buffer views and sparse accessors are
//! rejected up front with a descriptive error instead of being half-parsed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::Vec3;
use tinyjson::JsonValue;

use super::{LoadError, TextureKind};

// glTF componentType values.
const COMPONENT_U8: u32 = 5121;
const COMPONENT_U16: u32 = 5123;
const COMPONENT_U32: u32 = 5125;
const COMPONENT_F32: u32 = 5126;

// glTF primitive modes.
const MODE_TRIANGLES: usize = 4;
const MODE_TRIANGLE_STRIP: usize = 5;
const MODE_TRIANGLE_FAN: usize = 6;

/// Preprocessing applied while importing. [`super::Model::load`] always sets
/// both flags; they are separate so the tests can exercise the raw paths.
#[derive(Clone, Copy, Debug)]
pub struct LoadOptions {
    /// Convert triangle strips and fans into plain triangle lists.
    pub triangulate: bool,
    /// Compute smooth per-vertex normals when a primitive has none.
    pub generate_normals: bool,
}

/// An imported asset: node hierarchy, meshes and materials as flat arrays
/// referencing each other by index.
#[derive(Debug, PartialEq)]
pub struct Scene {
    pub root_nodes: Vec<usize>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
}

/// One node of the hierarchy. Node-local transforms are not imported; every
/// mesh is drawn in the coordinate space the asset stores it in.
#[derive(Debug, PartialEq)]
pub struct Node {
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, PartialEq)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

/// Vertex and index data of one drawable primitive, already post-processed:
/// triangles only, normals always present, indices widened to u32.
#[derive(Debug, PartialEq)]
pub struct Primitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

/// Texture file paths of one material, relative to the asset's directory,
/// grouped by the texture kind they feed at draw time.
#[derive(Debug, Default, PartialEq)]
pub struct Material {
    pub diffuse_textures: Vec<String>,
    pub specular_textures: Vec<String>,
}

impl Material {
    pub fn texture_paths(&self, kind: TextureKind) -> &[String] {
        match kind {
            TextureKind::Diffuse => &self.diffuse_textures,
            TextureKind::Specular => &self.specular_textures,
        }
    }
}

/// Loads and post-processes a `.gltf` asset. External buffers are resolved
/// against the asset's own directory. Any structural problem fails the whole
/// load; only texture slots degrade (see [`Material`]).
pub fn load_scene(path: &Path, options: LoadOptions) -> Result<Scene, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let json: JsonValue = text.parse().map_err(|err: tinyjson::JsonParseError| {
        LoadError::InvalidGltf {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    })?;
    // The base directory is derived once and reused for every buffer and,
    // later, every texture of this asset.
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    parse_scene(&json, directory, options).map_err(|err| err.at(path))
}

/// Parse failure before it has been attributed to the asset path.
enum ParseError {
    Invalid(String),
    Unsupported(String),
    Read { path: PathBuf, source: io::Error },
}

impl ParseError {
    fn at(self, asset: &Path) -> LoadError {
        match self {
            ParseError::Invalid(reason) => LoadError::InvalidGltf {
                path: asset.to_path_buf(),
                reason,
            },
            ParseError::Unsupported(reason) => LoadError::Unsupported {
                path: asset.to_path_buf(),
                reason,
            },
            ParseError::Read { path, source } => LoadError::Read { path, source },
        }
    }
}

type Object = HashMap<String, JsonValue>;

fn parse_scene(
    json: &JsonValue,
    directory: &Path,
    options: LoadOptions,
) -> Result<Scene, ParseError> {
    let root = object(json, "glTF document")?;
    let buffers = parse_buffers(root, directory)?;
    let buffer_views = parse_buffer_views(root)?;
    let accessors = parse_accessors(root)?;
    let texture_paths = parse_texture_paths(root)?;
    let materials = parse_materials(root, &texture_paths)?;
    let meshes = parse_meshes(
        root,
        &accessors,
        &buffer_views,
        &buffers,
        materials.len(),
        options,
    )?;
    let (root_nodes, nodes) = parse_nodes(root, meshes.len())?;
    Ok(Scene {
        root_nodes,
        nodes,
        meshes,
        materials,
    })
}

fn parse_buffers(root: &Object, directory: &Path) -> Result<Vec<Vec<u8>>, ParseError> {
    let Some(buffers_json) = root.get("buffers") else {
        return Ok(Vec::new());
    };
    let buffers_json = array(buffers_json, "buffers")?;
    let mut buffers = Vec::with_capacity(buffers_json.len());
    for buffer_json in buffers_json {
        let buffer_json = object(buffer_json, "buffer")?;
        let Some(uri) = buffer_json.get("uri") else {
            return Err(ParseError::Unsupported(
                "buffers without a uri (GLB binary chunks)".to_string(),
            ));
        };
        let uri = string(uri, "buffer uri")?;
        if uri.starts_with("data:") {
            return Err(ParseError::Unsupported("data: URI buffers".to_string()));
        }
        let byte_length = index(field(buffer_json, "byteLength", "buffer")?, "byteLength")?;
        let bin_path = directory.join(uri);
        let bytes = fs::read(&bin_path).map_err(|source| ParseError::Read {
            path: bin_path.clone(),
            source,
        })?;
        if bytes.len() < byte_length {
            return Err(ParseError::Invalid(format!(
                "buffer {uri} is shorter than its declared byteLength"
            )));
        }
        buffers.push(bytes);
    }
    Ok(buffers)
}

struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
}

fn parse_buffer_views(root: &Object) -> Result<Vec<BufferView>, ParseError> {
    let Some(views_json) = root.get("bufferViews") else {
        return Ok(Vec::new());
    };
    let views_json = array(views_json, "bufferViews")?;
    let mut views = Vec::with_capacity(views_json.len());
    for view_json in views_json {
        let view_json = object(view_json, "bufferView")?;
        if view_json.contains_key("byteStride") {
            return Err(ParseError::Unsupported(
                "interleaved (byteStride) buffer views".to_string(),
            ));
        }
        views.push(BufferView {
            buffer: index(field(view_json, "buffer", "bufferView")?, "buffer")?,
            byte_offset: optional_index(view_json, "byteOffset")?.unwrap_or(0),
            byte_length: index(field(view_json, "byteLength", "bufferView")?, "byteLength")?,
        });
    }
    Ok(views)
}

struct Accessor {
    buffer_view: usize,
    byte_offset: usize,
    component_type: u32,
    count: usize,
    components: usize,
}

fn parse_accessors(root: &Object) -> Result<Vec<Accessor>, ParseError> {
    let Some(accessors_json) = root.get("accessors") else {
        return Ok(Vec::new());
    };
    let accessors_json = array(accessors_json, "accessors")?;
    let mut accessors = Vec::with_capacity(accessors_json.len());
    for accessor_json in accessors_json {
        let accessor_json = object(accessor_json, "accessor")?;
        let Some(buffer_view) = accessor_json.get("bufferView") else {
            return Err(ParseError::Unsupported("sparse accessors".to_string()));
        };
        let components = match string(field(accessor_json, "type", "accessor")?, "type")?.as_str() {
            "SCALAR" => 1,
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" => 4,
            other => {
                return Err(ParseError::Invalid(format!(
                    "unexpected accessor type \"{other}\""
                )))
            }
        };
        accessors.push(Accessor {
            buffer_view: index(buffer_view, "bufferView")?,
            byte_offset: optional_index(accessor_json, "byteOffset")?.unwrap_or(0),
            component_type: index(
                field(accessor_json, "componentType", "accessor")?,
                "componentType",
            )? as u32,
            count: index(field(accessor_json, "count", "accessor")?, "count")?,
            components,
        });
    }
    Ok(accessors)
}

fn component_size(component_type: u32) -> Result<usize, ParseError> {
    match component_type {
        COMPONENT_U8 => Ok(1),
        COMPONENT_U16 => Ok(2),
        COMPONENT_U32 | COMPONENT_F32 => Ok(4),
        other => Err(ParseError::Invalid(format!(
            "unknown accessor componentType {other}"
        ))),
    }
}

/// Bounds-checked byte range of one accessor within its buffer.
fn accessor_bytes<'a>(
    accessor: &Accessor,
    views: &[BufferView],
    buffers: &'a [Vec<u8>],
) -> Result<&'a [u8], ParseError> {
    let view = views
        .get(accessor.buffer_view)
        .ok_or_else(|| ParseError::Invalid("accessor bufferView index out of range".to_string()))?;
    let buffer = buffers
        .get(view.buffer)
        .ok_or_else(|| ParseError::Invalid("bufferView buffer index out of range".to_string()))?;
    let element_size = component_size(accessor.component_type)? * accessor.components;
    let start = view.byte_offset + accessor.byte_offset;
    let end = start + accessor.count * element_size;
    if end > view.byte_offset + view.byte_length || end > buffer.len() {
        return Err(ParseError::Invalid(
            "accessor range reaches past its buffer".to_string(),
        ));
    }
    Ok(&buffer[start..end])
}

fn read_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

fn read_vec3s(
    accessor: &Accessor,
    views: &[BufferView],
    buffers: &[Vec<u8>],
    what: &str,
) -> Result<Vec<[f32; 3]>, ParseError> {
    if accessor.component_type != COMPONENT_F32 || accessor.components != 3 {
        return Err(ParseError::Invalid(format!("{what} must be float VEC3")));
    }
    let floats = read_f32s(accessor_bytes(accessor, views, buffers)?);
    Ok(floats
        .chunks_exact(3)
        .map(|v| [v[0], v[1], v[2]])
        .collect())
}

fn read_vec2s(
    accessor: &Accessor,
    views: &[BufferView],
    buffers: &[Vec<u8>],
    what: &str,
) -> Result<Vec<[f32; 2]>, ParseError> {
    if accessor.component_type != COMPONENT_F32 || accessor.components != 2 {
        return Err(ParseError::Invalid(format!("{what} must be float VEC2")));
    }
    let floats = read_f32s(accessor_bytes(accessor, views, buffers)?);
    Ok(floats.chunks_exact(2).map(|v| [v[0], v[1]]).collect())
}

/// Reads an index accessor, widening u8/u16 indices to the u32 the meshes
/// use throughout.
fn read_indices(
    accessor: &Accessor,
    views: &[BufferView],
    buffers: &[Vec<u8>],
) -> Result<Vec<u32>, ParseError> {
    if accessor.components != 1 {
        return Err(ParseError::Invalid("indices must be SCALAR".to_string()));
    }
    let bytes = accessor_bytes(accessor, views, buffers)?;
    let indices = match accessor.component_type {
        COMPONENT_U8 => bytes.iter().map(|&byte| byte as u32).collect(),
        COMPONENT_U16 => bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes(chunk.try_into().unwrap()) as u32)
            .collect(),
        COMPONENT_U32 => bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
            .collect(),
        other => {
            return Err(ParseError::Invalid(format!(
                "indices have non-integer componentType {other}"
            )))
        }
    };
    Ok(indices)
}

/// File path (relative to the asset) behind each entry of the glTF
/// `textures` array, or None for embedded images.
fn parse_texture_paths(root: &Object) -> Result<Vec<Option<String>>, ParseError> {
    let image_uris: Vec<Option<String>> = match root.get("images") {
        Some(images_json) => array(images_json, "images")?
            .iter()
            .map(|image_json| {
                let image_json = object(image_json, "image")?;
                Ok(match image_json.get("uri") {
                    Some(uri) => Some(string(uri, "image uri")?.clone()),
                    None => None,
                })
            })
            .collect::<Result<_, ParseError>>()?,
        None => Vec::new(),
    };
    let Some(textures_json) = root.get("textures") else {
        return Ok(Vec::new());
    };
    let mut paths = Vec::new();
    for texture_json in array(textures_json, "textures")? {
        let texture_json = object(texture_json, "texture")?;
        let path = match texture_json.get("source") {
            Some(source) => {
                let source = index(source, "texture source")?;
                image_uris
                    .get(source)
                    .ok_or_else(|| {
                        ParseError::Invalid("texture source index out of range".to_string())
                    })?
                    .clone()
            }
            None => None,
        };
        paths.push(path);
    }
    Ok(paths)
}

fn parse_materials(
    root: &Object,
    texture_paths: &[Option<String>],
) -> Result<Vec<Material>, ParseError> {
    let Some(materials_json) = root.get("materials") else {
        return Ok(Vec::new());
    };
    let mut materials = Vec::new();
    for material_json in array(materials_json, "materials")? {
        let material_json = object(material_json, "material")?;
        let mut material = Material::default();
        if let Some(pbr) = material_json.get("pbrMetallicRoughness") {
            let pbr = object(pbr, "pbrMetallicRoughness")?;
            if let Some(path) = texture_slot_path(pbr, "baseColorTexture", texture_paths)? {
                material.diffuse_textures.push(path);
            }
        }
        if let Some(extensions) = material_json.get("extensions") {
            let extensions = object(extensions, "material extensions")?;
            if let Some(specular) = extensions.get("KHR_materials_specular") {
                let specular = object(specular, "KHR_materials_specular")?;
                if let Some(path) =
                    texture_slot_path(specular, "specularColorTexture", texture_paths)?
                {
                    material.specular_textures.push(path);
                }
            }
        }
        materials.push(material);
    }
    Ok(materials)
}

/// Resolves one `{ "index": n }` texture slot to the image path behind it.
/// Slots backed by embedded images are skipped with a warning; losing a
/// texture is not worth failing the whole asset.
fn texture_slot_path(
    parent: &Object,
    slot: &str,
    texture_paths: &[Option<String>],
) -> Result<Option<String>, ParseError> {
    let Some(slot_json) = parent.get(slot) else {
        return Ok(None);
    };
    let slot_json = object(slot_json, slot)?;
    let texture = index(field(slot_json, "index", slot)?, "texture index")?;
    let path = texture_paths
        .get(texture)
        .ok_or_else(|| ParseError::Invalid(format!("{slot} texture index out of range")))?;
    if path.is_none() {
        log::warn!("{slot} references an embedded image; skipping that texture");
    }
    Ok(path.clone())
}

fn parse_meshes(
    root: &Object,
    accessors: &[Accessor],
    views: &[BufferView],
    buffers: &[Vec<u8>],
    material_count: usize,
    options: LoadOptions,
) -> Result<Vec<Mesh>, ParseError> {
    let Some(meshes_json) = root.get("meshes") else {
        return Ok(Vec::new());
    };
    let mut meshes = Vec::new();
    for mesh_json in array(meshes_json, "meshes")? {
        let mesh_json = object(mesh_json, "mesh")?;
        let primitives_json = array(field(mesh_json, "primitives", "mesh")?, "primitives")?;
        let mut primitives = Vec::with_capacity(primitives_json.len());
        for primitive_json in primitives_json {
            primitives.push(parse_primitive(
                object(primitive_json, "primitive")?,
                accessors,
                views,
                buffers,
                material_count,
                options,
            )?);
        }
        meshes.push(Mesh { primitives });
    }
    Ok(meshes)
}

fn accessor_for<'a>(
    accessors: &'a [Accessor],
    json: &JsonValue,
    what: &str,
) -> Result<&'a Accessor, ParseError> {
    accessors
        .get(index(json, what)?)
        .ok_or_else(|| ParseError::Invalid(format!("{what} accessor index out of range")))
}

fn parse_primitive(
    primitive_json: &Object,
    accessors: &[Accessor],
    views: &[BufferView],
    buffers: &[Vec<u8>],
    material_count: usize,
    options: LoadOptions,
) -> Result<Primitive, ParseError> {
    let attributes = object(
        field(primitive_json, "attributes", "primitive")?,
        "attributes",
    )?;

    let Some(position_json) = attributes.get("POSITION") else {
        return Err(ParseError::Invalid(
            "primitive has no POSITION attribute".to_string(),
        ));
    };
    let positions = read_vec3s(
        accessor_for(accessors, position_json, "POSITION")?,
        views,
        buffers,
        "POSITION",
    )?;

    let texcoords = match attributes.get("TEXCOORD_0") {
        Some(json) => {
            let texcoords = read_vec2s(
                accessor_for(accessors, json, "TEXCOORD_0")?,
                views,
                buffers,
                "TEXCOORD_0",
            )?;
            if texcoords.len() != positions.len() {
                return Err(ParseError::Invalid(
                    "TEXCOORD_0 count differs from POSITION count".to_string(),
                ));
            }
            Some(texcoords)
        }
        None => None,
    };

    let mut indices = match primitive_json.get("indices") {
        Some(json) => read_indices(accessor_for(accessors, json, "indices")?, views, buffers)?,
        // Non-indexed primitives draw through the same indexed path.
        None => (0..positions.len() as u32).collect(),
    };

    let mode = optional_index(primitive_json, "mode")?.unwrap_or(MODE_TRIANGLES);
    match mode {
        MODE_TRIANGLES => {}
        MODE_TRIANGLE_STRIP if options.triangulate => indices = triangulate_strip(&indices),
        MODE_TRIANGLE_FAN if options.triangulate => indices = triangulate_fan(&indices),
        MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN => {
            return Err(ParseError::Unsupported(
                "triangle strips and fans require triangulation".to_string(),
            ))
        }
        other => {
            return Err(ParseError::Unsupported(format!(
                "primitive mode {other} cannot be triangulated"
            )))
        }
    }
    if indices.len() % 3 != 0 {
        return Err(ParseError::Invalid(format!(
            "{} indices do not form whole triangles",
            indices.len()
        )));
    }
    if let Some(&out_of_range) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(ParseError::Invalid(format!(
            "index {out_of_range} is out of range for {} vertices",
            positions.len()
        )));
    }

    let normals = match attributes.get("NORMAL") {
        Some(json) => {
            let normals = read_vec3s(
                accessor_for(accessors, json, "NORMAL")?,
                views,
                buffers,
                "NORMAL",
            )?;
            if normals.len() != positions.len() {
                return Err(ParseError::Invalid(
                    "NORMAL count differs from POSITION count".to_string(),
                ));
            }
            normals
        }
        None if options.generate_normals => generate_normals(&positions, &indices),
        None => vec![[0.0; 3]; positions.len()],
    };

    let material = match primitive_json.get("material") {
        Some(json) => {
            let material = index(json, "material")?;
            if material >= material_count {
                return Err(ParseError::Invalid(
                    "primitive material index out of range".to_string(),
                ));
            }
            Some(material)
        }
        None => None,
    };

    Ok(Primitive {
        positions,
        normals,
        texcoords,
        indices,
        material,
    })
}

fn parse_nodes(root: &Object, mesh_count: usize) -> Result<(Vec<usize>, Vec<Node>), ParseError> {
    let mut nodes = Vec::new();
    if let Some(nodes_json) = root.get("nodes") {
        for node_json in array(nodes_json, "nodes")? {
            let node_json = object(node_json, "node")?;
            let children = match node_json.get("children") {
                Some(children) => array(children, "children")?
                    .iter()
                    .map(|child| index(child, "child node index"))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            let mesh = match node_json.get("mesh") {
                Some(mesh) => {
                    let mesh = index(mesh, "node mesh index")?;
                    if mesh >= mesh_count {
                        return Err(ParseError::Invalid(
                            "node mesh index out of range".to_string(),
                        ));
                    }
                    Some(mesh)
                }
                None => None,
            };
            nodes.push(Node { mesh, children });
        }
    }
    for node in &nodes {
        if node.children.iter().any(|&child| child >= nodes.len()) {
            return Err(ParseError::Invalid(
                "node child index out of range".to_string(),
            ));
        }
    }

    let Some(scenes_json) = root.get("scenes") else {
        return Err(ParseError::Invalid("document has no scenes".to_string()));
    };
    let scenes_json = array(scenes_json, "scenes")?;
    let scene = optional_index(root, "scene")?.unwrap_or(0);
    let scene_json = scenes_json
        .get(scene)
        .ok_or_else(|| ParseError::Invalid("scene index out of range".to_string()))?;
    let root_nodes = match object(scene_json, "scene")?.get("nodes") {
        Some(roots) => array(roots, "scene nodes")?
            .iter()
            .map(|root| index(root, "root node index"))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    if root_nodes.is_empty() {
        return Err(ParseError::Invalid(
            "scene has no root nodes".to_string(),
        ));
    }
    if root_nodes.iter().any(|&root| root >= nodes.len()) {
        return Err(ParseError::Invalid(
            "root node index out of range".to_string(),
        ));
    }
    Ok((root_nodes, nodes))
}

/// Smooth per-vertex normals from triangle geometry. The cross product's
/// length is twice the triangle area, so each face contributes in proportion
/// to its size.
fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let edge1 = Vec3::from(positions[b]) - Vec3::from(positions[a]);
        let edge2 = Vec3::from(positions[c]) - Vec3::from(positions[a]);
        let face_normal = edge1.cross(edge2);
        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }
    normals
        .into_iter()
        .map(|normal| normal.normalize_or_zero().to_array())
        .collect()
}

fn triangulate_strip(indices: &[u32]) -> Vec<u32> {
    let mut triangles = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 2..indices.len() {
        // Every other triangle is flipped to keep the winding consistent.
        if i % 2 == 0 {
            triangles.extend([indices[i - 2], indices[i - 1], indices[i]]);
        } else {
            triangles.extend([indices[i - 1], indices[i - 2], indices[i]]);
        }
    }
    triangles
}

fn triangulate_fan(indices: &[u32]) -> Vec<u32> {
    let mut triangles = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for i in 2..indices.len() {
        triangles.extend([indices[0], indices[i - 1], indices[i]]);
    }
    triangles
}

fn object<'a>(value: &'a JsonValue, what: &str) -> Result<&'a Object, ParseError> {
    value
        .get()
        .ok_or_else(|| ParseError::Invalid(format!("{what} is not an object")))
}

fn array<'a>(value: &'a JsonValue, what: &str) -> Result<&'a Vec<JsonValue>, ParseError> {
    value
        .get()
        .ok_or_else(|| ParseError::Invalid(format!("{what} is not an array")))
}

fn string<'a>(value: &'a JsonValue, what: &str) -> Result<&'a String, ParseError> {
    value
        .get()
        .ok_or_else(|| ParseError::Invalid(format!("{what} is not a string")))
}

fn index(value: &JsonValue, what: &str) -> Result<usize, ParseError> {
    let number: &f64 = value
        .get()
        .ok_or_else(|| ParseError::Invalid(format!("{what} is not a number")))?;
    if *number < 0.0 || number.fract() != 0.0 {
        return Err(ParseError::Invalid(format!(
            "{what} is not a non-negative integer"
        )));
    }
    Ok(*number as usize)
}

fn optional_index(parent: &Object, key: &str) -> Result<Option<usize>, ParseError> {
    parent.get(key).map(|value| index(value, key)).transpose()
}

fn field<'a>(parent: &'a Object, key: &str, what: &str) -> Result<&'a JsonValue, ParseError> {
    parent
        .get(key)
        .ok_or_else(|| ParseError::Invalid(format!("{what} is missing \"{key}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALL_PREPROCESSING: LoadOptions = LoadOptions {
        triangulate: true,
        generate_normals: true,
    };

    /// Unique scratch directory for one test's fixture files.
    struct FixtureDir {
        path: PathBuf,
    }

    impl FixtureDir {
        fn new() -> FixtureDir {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let path = std::env::temp_dir().join(format!(
                "crate-scene-test-{}-{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::Relaxed),
            ));
            fs::create_dir_all(&path).unwrap();
            FixtureDir { path }
        }

        fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
            let path = self.path.join(name);
            fs::write(&path, bytes).unwrap();
            path
        }
    }

    impl Drop for FixtureDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    const TRIANGLE_POSITIONS: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    const TRIANGLE_NORMALS: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    const TRIANGLE_TEXCOORDS: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];

    /// positions at 0, normals at 36, texcoords at 72, u16 indices at 96.
    fn triangle_bin() -> Vec<u8> {
        let mut bin = Vec::new();
        bin.extend_from_slice(bytemuck::cast_slice(&TRIANGLE_POSITIONS));
        bin.extend_from_slice(bytemuck::cast_slice(&TRIANGLE_NORMALS));
        bin.extend_from_slice(bytemuck::cast_slice(&TRIANGLE_TEXCOORDS));
        bin.extend_from_slice(bytemuck::cast_slice(&TRIANGLE_INDICES));
        bin
    }

    /// A single-triangle asset; `attributes` and `extra_primitive_fields`
    /// are spliced into the one primitive.
    fn triangle_gltf(attributes: &str, extra_primitive_fields: &str) -> String {
        format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "scene": 0,
                "scenes": [{{"nodes": [0]}}],
                "nodes": [{{"mesh": 0}}],
                "meshes": [{{"primitives": [{{"attributes": {attributes}{extra_primitive_fields}}}]}}],
                "materials": [{{"pbrMetallicRoughness": {{"baseColorTexture": {{"index": 0}}}}}}],
                "textures": [{{"source": 0}}],
                "images": [{{"uri": "base.png"}}],
                "accessors": [
                    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}},
                    {{"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3"}},
                    {{"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2"}},
                    {{"bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR"}}
                ],
                "bufferViews": [
                    {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
                    {{"buffer": 0, "byteOffset": 36, "byteLength": 36}},
                    {{"buffer": 0, "byteOffset": 72, "byteLength": 24}},
                    {{"buffer": 0, "byteOffset": 96, "byteLength": 6}}
                ],
                "buffers": [{{"uri": "triangle.bin", "byteLength": 102}}]
            }}"#
        )
    }

    const FULL_ATTRIBUTES: &str = r#"{"POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2}"#;

    fn load_triangle(attributes: &str, extra_primitive_fields: &str) -> Result<Scene, LoadError> {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf = dir.write(
            "triangle.gltf",
            triangle_gltf(attributes, extra_primitive_fields).as_bytes(),
        );
        load_scene(&gltf, ALL_PREPROCESSING)
    }

    #[test]
    fn loads_a_minimal_triangle() {
        let scene = load_triangle(FULL_ATTRIBUTES, r#", "indices": 3, "material": 0"#).unwrap();
        assert_eq!(scene.root_nodes, vec![0]);
        assert_eq!(scene.nodes, vec![Node { mesh: Some(0), children: vec![] }]);
        let primitive = &scene.meshes[0].primitives[0];
        assert_eq!(
            primitive.positions,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
        assert_eq!(primitive.normals, vec![[0.0, 0.0, 1.0]; 3]);
        assert_eq!(
            primitive.texcoords,
            Some(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
        );
        // u16 indices widen to u32.
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.material, Some(0));
        assert_eq!(scene.materials[0].diffuse_textures, vec!["base.png"]);
    }

    #[test]
    fn loading_twice_is_deterministic() {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf = dir.write(
            "triangle.gltf",
            triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#).as_bytes(),
        );
        let first = load_scene(&gltf, ALL_PREPROCESSING).unwrap();
        let second = load_scene(&gltf, ALL_PREPROCESSING).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = FixtureDir::new();
        let result = load_scene(&dir.path.join("nope.gltf"), ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }

    #[test]
    fn garbage_is_invalid() {
        let dir = FixtureDir::new();
        let gltf = dir.write("garbage.gltf", b"\x00\x01not json at all");
        let result = load_scene(&gltf, ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::InvalidGltf { .. })));
    }

    #[test]
    fn document_without_scenes_is_invalid() {
        let dir = FixtureDir::new();
        let gltf = dir.write("empty.gltf", br#"{"asset": {"version": "2.0"}}"#);
        let result = load_scene(&gltf, ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::InvalidGltf { .. })));
    }

    #[test]
    fn missing_uv_channel_is_not_an_error() {
        let scene =
            load_triangle(r#"{"POSITION": 0, "NORMAL": 1}"#, r#", "indices": 3"#).unwrap();
        assert_eq!(scene.meshes[0].primitives[0].texcoords, None);
    }

    #[test]
    fn missing_normals_are_generated() {
        let scene = load_triangle(r#"{"POSITION": 0}"#, r#", "indices": 3"#).unwrap();
        // Counter-clockwise triangle in the XY plane faces +Z.
        assert_eq!(
            scene.meshes[0].primitives[0].normals,
            vec![[0.0, 0.0, 1.0]; 3]
        );
    }

    #[test]
    fn missing_indices_are_synthesized() {
        let scene = load_triangle(FULL_ATTRIBUTES, "").unwrap();
        let primitive = &scene.meshes[0].primitives[0];
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.indices.len() % 3, 0);
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let dir = FixtureDir::new();
        let mut bin = triangle_bin();
        // Corrupt the index buffer to point past the vertex count.
        let last_index = bin.len() - 2;
        bin[last_index..].copy_from_slice(&9u16.to_le_bytes());
        dir.write("triangle.bin", &bin);
        let gltf = dir.write(
            "triangle.gltf",
            triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#).as_bytes(),
        );
        let result = load_scene(&gltf, ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::InvalidGltf { .. })));
    }

    #[test]
    fn partial_triangles_are_invalid() {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf_text = triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#).replace(
            r#"{"bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR"}"#,
            r#"{"bufferView": 3, "componentType": 5123, "count": 2, "type": "SCALAR"}"#,
        );
        let gltf = dir.write("triangle.gltf", gltf_text.as_bytes());
        let result = load_scene(&gltf, ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::InvalidGltf { .. })));
    }

    #[test]
    fn strips_triangulate_without_flipped_winding() {
        assert_eq!(triangulate_strip(&[0, 1, 2, 3]), vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(triangulate_strip(&[4, 5]), Vec::<u32>::new());
    }

    #[test]
    fn fans_triangulate_around_the_first_vertex() {
        assert_eq!(triangulate_fan(&[0, 1, 2, 3, 4]), vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
    }

    #[test]
    fn strip_mode_without_triangulation_is_unsupported() {
        let result = load_triangle(
            FULL_ATTRIBUTES,
            r#", "indices": 3, "mode": 5"#,
        );
        // The default load path triangulates; check the raw path too.
        assert!(result.is_ok());
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf = dir.write(
            "triangle.gltf",
            triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3, "mode": 5"#).as_bytes(),
        );
        let raw = load_scene(
            &gltf,
            LoadOptions {
                triangulate: false,
                generate_normals: true,
            },
        );
        assert!(matches!(raw, Err(LoadError::Unsupported { .. })));
    }

    #[test]
    fn line_primitives_are_unsupported() {
        let result = load_triangle(FULL_ATTRIBUTES, r#", "indices": 3, "mode": 1"#);
        assert!(matches!(result, Err(LoadError::Unsupported { .. })));
    }

    #[test]
    fn byte_stride_views_are_unsupported() {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf_text = triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#).replace(
            r#"{"buffer": 0, "byteOffset": 0, "byteLength": 36}"#,
            r#"{"buffer": 0, "byteOffset": 0, "byteLength": 36, "byteStride": 12}"#,
        );
        let gltf = dir.write("triangle.gltf", gltf_text.as_bytes());
        let result = load_scene(&gltf, ALL_PREPROCESSING);
        assert!(matches!(result, Err(LoadError::Unsupported { .. })));
    }

    #[test]
    fn materials_sharing_an_image_share_the_path() {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf_text = triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#).replace(
            r#""materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}]"#,
            r#""materials": [
                {"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}},
                {"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}
            ]"#,
        );
        let gltf = dir.write("triangle.gltf", gltf_text.as_bytes());
        let scene = load_scene(&gltf, ALL_PREPROCESSING).unwrap();
        assert_eq!(scene.materials.len(), 2);
        assert_eq!(
            scene.materials[0].diffuse_textures,
            scene.materials[1].diffuse_textures
        );
    }

    #[test]
    fn specular_extension_textures_are_collected() {
        let dir = FixtureDir::new();
        dir.write("triangle.bin", &triangle_bin());
        let gltf_text = triangle_gltf(FULL_ATTRIBUTES, r#", "indices": 3"#)
            .replace(
                r#"{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}"#,
                r#"{
                    "pbrMetallicRoughness": {"baseColorTexture": {"index": 0}},
                    "extensions": {"KHR_materials_specular": {"specularColorTexture": {"index": 1}}}
                }"#,
            )
            .replace(
                r#""textures": [{"source": 0}]"#,
                r#""textures": [{"source": 0}, {"source": 1}]"#,
            )
            .replace(
                r#""images": [{"uri": "base.png"}]"#,
                r#""images": [{"uri": "base.png"}, {"uri": "spec.png"}]"#,
            );
        let gltf = dir.write("triangle.gltf", gltf_text.as_bytes());
        let scene = load_scene(&gltf, ALL_PREPROCESSING).unwrap();
        assert_eq!(scene.materials[0].diffuse_textures, vec!["base.png"]);
        assert_eq!(scene.materials[0].specular_textures, vec!["spec.png"]);
        assert_eq!(
            scene.materials[0].texture_paths(TextureKind::Specular),
            ["spec.png"]
        );
    }
}
