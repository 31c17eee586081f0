//! glTF 2.0 JSON schema types.
//!
//! Only the parts of the format this crate produces are modelled; unknown
//! members of documents read from elsewhere are ignored.

use crate::types::{AccessorType, ComponentType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Buffer view target: ARRAY_BUFFER (vertex data).
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
/// Buffer view target: ELEMENT_ARRAY_BUFFER (index data).
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Sampler filter: LINEAR.
pub const FILTER_LINEAR: u32 = 9729;
/// Sampler filter: LINEAR_MIPMAP_LINEAR.
pub const FILTER_LINEAR_MIPMAP_LINEAR: u32 = 9987;
/// Sampler wrap mode: REPEAT.
pub const WRAP_REPEAT: u32 = 10497;

/// Primitive mode: TRIANGLES.
pub const MODE_TRIANGLES: u32 = 4;

/// The sampler every fresh document starts with at index 0.
pub const DEFAULT_SAMPLER: Sampler = Sampler {
    mag_filter: Some(FILTER_LINEAR),
    min_filter: Some(FILTER_LINEAR_MIPMAP_LINEAR),
    wrap_s: WRAP_REPEAT,
    wrap_t: WRAP_REPEAT,
    name: None,
};

/// Root glTF object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gltf {
    /// Asset information.
    pub asset: Asset,
    /// Default scene index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    /// Scenes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    /// Nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    /// Meshes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    /// Materials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    /// Textures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    /// Images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    /// Samplers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    /// Accessors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    /// Buffer views.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    /// Buffers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
}

/// Asset metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Generator name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    /// Copyright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    /// glTF version.
    pub version: String,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            generator: None,
            copyright: None,
            version: "2.0".to_string(),
        }
    }
}

/// A scene containing root nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Scene name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Root node indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
}

/// A node in the scene graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// Node name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Mesh index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    /// Scale (TRS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    /// Rotation quaternion `[x, y, z, w]` (TRS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    /// Translation (TRS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    /// Child node indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
}

impl Node {
    /// Create an empty node with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// A mesh containing primitives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    /// Mesh name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Mesh primitives.
    pub primitives: Vec<Primitive>,
}

/// A mesh primitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Primitive {
    /// Vertex attributes (POSITION, TEXCOORD_0, NORMAL, COLOR_0).
    pub attributes: IndexMap<String, usize>,
    /// Index accessor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    /// Material index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    /// Rendering mode (0=POINTS, 1=LINES, 4=TRIANGLES, etc.).
    #[serde(default = "default_primitive_mode")]
    pub mode: u32,
}

fn default_primitive_mode() -> u32 {
    MODE_TRIANGLES
}

/// An accessor for typed buffer data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    /// Buffer view index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    /// Byte offset within buffer view.
    #[serde(default)]
    pub byte_offset: usize,
    /// Component type.
    pub component_type: ComponentType,
    /// Number of elements.
    pub count: usize,
    /// Maximum values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
    /// Minimum values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    /// Element type.
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
}

impl Accessor {
    /// Get the byte size of one element.
    pub fn element_size(&self) -> usize {
        self.accessor_type.element_size(self.component_type)
    }

    /// Get the number of components per element.
    pub fn component_count(&self) -> usize {
        self.accessor_type.component_count()
    }
}

/// A view into a buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    /// Buffer index.
    pub buffer: usize,
    /// Byte offset into buffer.
    #[serde(default)]
    pub byte_offset: usize,
    /// Byte length.
    pub byte_length: usize,
    /// Byte stride for vertex data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    /// Target (34962=ARRAY_BUFFER, 34963=ELEMENT_ARRAY_BUFFER).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// A buffer containing binary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    /// Byte length.
    pub byte_length: usize,
    /// URI (data URI or external file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Alpha mode of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    /// Fully opaque.
    #[default]
    Opaque,
    /// Masked (alpha test).
    Mask,
    /// Alpha blended.
    Blend,
}

/// A PBR material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Material name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Double-sided rendering.
    #[serde(default)]
    pub double_sided: bool,
    /// Alpha mode.
    #[serde(default)]
    pub alpha_mode: AlphaMode,
    /// PBR metallic-roughness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    /// Occlusion texture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    /// Normal texture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,
}

/// PBR metallic-roughness properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    /// Base color factor.
    #[serde(default = "default_base_color_factor")]
    pub base_color_factor: [f32; 4],
    /// Metallic factor.
    #[serde(default = "default_factor")]
    pub metallic_factor: f32,
    /// Roughness factor.
    #[serde(default = "default_factor")]
    pub roughness_factor: f32,
    /// Base color texture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    /// Metallic-roughness texture.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: default_base_color_factor(),
            metallic_factor: default_factor(),
            roughness_factor: default_factor(),
            base_color_texture: None,
            metallic_roughness_texture: None,
        }
    }
}

fn default_base_color_factor() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_factor() -> f32 {
    1.0
}

/// Texture reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    /// Texture index.
    pub index: usize,
    /// Texture coordinate set.
    #[serde(default)]
    pub tex_coord: u32,
}

/// Normal texture reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    /// Normal scale.
    #[serde(default = "default_factor")]
    pub scale: f32,
    /// Texture index.
    pub index: usize,
    /// Texture coordinate set.
    #[serde(default)]
    pub tex_coord: u32,
}

/// Occlusion texture reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    /// Texture index.
    pub index: usize,
    /// Texture coordinate set.
    #[serde(default)]
    pub tex_coord: u32,
}

/// A texture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    /// Sampler index.
    #[serde(default)]
    pub sampler: usize,
    /// Image source index.
    pub source: usize,
}

/// An image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Buffer view index (for embedded images).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// URI (data URI or external file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Image name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A texture sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    /// Magnification filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    /// Minification filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    /// S (U) wrap mode.
    #[serde(default = "default_wrap_mode")]
    pub wrap_s: u32,
    /// T (V) wrap mode.
    #[serde(default = "default_wrap_mode")]
    pub wrap_t: u32,
    /// Sampler name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for Sampler {
    fn default() -> Self {
        DEFAULT_SAMPLER
    }
}

fn default_wrap_mode() -> u32 {
    WRAP_REPEAT
}
