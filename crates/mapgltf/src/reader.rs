//! Decoding embedded data back out of a document.
//!
//! Only buffers embedded as `application/octet-stream` base64 data URIs are
//! readable; external references come back as `None`.

use crate::document::Document;
use crate::encode::DATA_URI_PREFIX;
use crate::error::{GltfError, Result};
use crate::schema::{AlphaMode, MODE_TRIANGLES};
use crate::types::{AccessorType, ComponentType};

use base64::{engine::general_purpose::STANDARD, Engine};
use glam::{Quat, Vec2, Vec3, Vec4};

/// Decode an embedded buffer URI.
///
/// Returns `Ok(None)` when `uri` is not an octet-stream base64 data URI.
pub fn decode_data_uri(uri: &str) -> Result<Option<Vec<u8>>> {
    match uri.strip_prefix(DATA_URI_PREFIX) {
        Some(data) => Ok(Some(STANDARD.decode(data)?)),
        None => Ok(None),
    }
}

/// Components of an accessor, typed by its component type.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessorValues {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

/// Decoded accessor contents, components flattened element by element.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorData {
    pub accessor_type: AccessorType,
    pub count: usize,
    pub values: AccessorValues,
}

impl AccessorData {
    /// Float components, if the accessor stores floats.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.values {
            AccessorValues::F32(values) => Some(values),
            _ => None,
        }
    }

    /// Unsigned components widened to `u32`, as used for indices.
    pub fn to_u32(&self) -> Option<Vec<u32>> {
        match &self.values {
            AccessorValues::U8(values) => Some(values.iter().map(|&v| u32::from(v)).collect()),
            AccessorValues::U16(values) => Some(values.iter().map(|&v| u32::from(v)).collect()),
            AccessorValues::U32(values) => Some(values.clone()),
            _ => None,
        }
    }

    fn floats(&self, shape: AccessorType) -> Result<&[f32]> {
        if self.accessor_type != shape {
            return Err(GltfError::invalid(format!(
                "expected {}, got {}",
                shape.tag(),
                self.accessor_type.tag()
            )));
        }
        self.as_f32()
            .ok_or_else(|| GltfError::invalid(format!("{} accessor is not FLOAT", shape.tag())))
    }

    /// `VEC2` float elements.
    pub fn to_vec2(&self) -> Result<Vec<Vec2>> {
        Ok(self.floats(AccessorType::Vec2)?.chunks_exact(2).map(Vec2::from_slice).collect())
    }

    /// `VEC3` float elements.
    pub fn to_vec3(&self) -> Result<Vec<Vec3>> {
        Ok(self.floats(AccessorType::Vec3)?.chunks_exact(3).map(Vec3::from_slice).collect())
    }

    /// `VEC4` float elements.
    pub fn to_vec4(&self) -> Result<Vec<Vec4>> {
        Ok(self.floats(AccessorType::Vec4)?.chunks_exact(4).map(Vec4::from_slice).collect())
    }
}

/// An embedded image resolved through a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// A material's PBR parameters with textures resolved to image bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSummary {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub base_color_texture: Option<TextureImage>,
    pub normal_texture: Option<TextureImage>,
    pub occlusion_texture: Option<TextureImage>,
}

/// One triangle primitive read back from a node's mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPrimitive {
    /// Node carrying the mesh.
    pub node: usize,
    pub mesh: usize,
    pub name: Option<String>,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub colors: Option<Vec<Vec4>>,
    pub indices: Vec<u32>,
    /// Node-local transform.
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub material: Option<usize>,
}

impl Document {
    /// Payload bytes of a landed buffer.
    ///
    /// Returns `Ok(None)` when the buffer points somewhere other than an
    /// embedded data URI.
    pub fn buffer_bytes(&self, buffer: usize) -> Result<Option<Vec<u8>>> {
        let entry = self
            .buffers()
            .get(buffer)
            .ok_or_else(|| GltfError::invalid(format!("invalid buffer {}", buffer)))?;
        let uri = entry
            .uri
            .as_deref()
            .ok_or_else(|| GltfError::invalid(format!("buffer {} has no data yet", buffer)))?;

        let data = decode_data_uri(uri)?;
        if data.is_none() {
            tracing::warn!(buffer, uri, "unsupported buffer uri");
        }
        Ok(data)
    }

    /// Exactly the byte range a buffer view covers.
    pub fn buffer_view_bytes(&self, view: usize) -> Result<Option<Vec<u8>>> {
        let entry = self
            .buffer_views()
            .get(view)
            .ok_or_else(|| GltfError::invalid(format!("invalid buffer view {}", view)))?;
        let Some(data) = self.buffer_bytes(entry.buffer)? else {
            return Ok(None);
        };

        let start = entry.byte_offset;
        let end = start
            .checked_add(entry.byte_length)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                GltfError::invalid(format!(
                    "buffer view {} (offset {}, length {}) out of bounds of buffer {} ({} bytes)",
                    view,
                    start,
                    entry.byte_length,
                    entry.buffer,
                    data.len()
                ))
            })?;
        Ok(Some(data[start..end].to_vec()))
    }

    /// Decode an accessor's elements, following the view's byte stride.
    pub fn read_accessor(&self, accessor: usize) -> Result<Option<AccessorData>> {
        let entry = self
            .accessors()
            .get(accessor)
            .ok_or_else(|| GltfError::invalid(format!("invalid accessor {}", accessor)))?;
        let view = entry
            .buffer_view
            .ok_or_else(|| GltfError::invalid(format!("accessor {} has no buffer view", accessor)))?;
        let Some(data) = self.buffer_view_bytes(view)? else {
            return Ok(None);
        };

        let element_size = entry.element_size();
        let stride = self
            .buffer_views()
            .get(view)
            .and_then(|v| v.byte_stride)
            .unwrap_or(element_size);

        // The last element must end inside the view before anything is allocated.
        let out_of_bounds = || GltfError::invalid(format!("accessor {} out of bounds of its view", accessor));
        if entry.count > 0 {
            let last_end = (entry.count - 1)
                .checked_mul(stride)
                .and_then(|offset| offset.checked_add(entry.byte_offset))
                .and_then(|start| start.checked_add(element_size))
                .ok_or_else(out_of_bounds)?;
            if last_end > data.len() {
                return Err(out_of_bounds());
            }
        }

        let mut packed = Vec::with_capacity(entry.count * element_size);
        for i in 0..entry.count {
            let start = entry.byte_offset + i * stride;
            packed.extend_from_slice(&data[start..start + element_size]);
        }

        let values = match entry.component_type {
            ComponentType::Byte => AccessorValues::I8(packed.iter().map(|&b| b as i8).collect()),
            ComponentType::UnsignedByte => AccessorValues::U8(packed),
            ComponentType::Short => AccessorValues::I16(
                packed.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect(),
            ),
            ComponentType::UnsignedShort => AccessorValues::U16(
                packed.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect(),
            ),
            ComponentType::UnsignedInt => AccessorValues::U32(
                packed
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ComponentType::Float => AccessorValues::F32(
                packed
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        };

        Ok(Some(AccessorData {
            accessor_type: entry.accessor_type,
            count: entry.count,
            values,
        }))
    }

    /// Resolve a texture to its image bytes and MIME type.
    ///
    /// Images stored outside the document resolve to `Ok(None)`.
    pub fn texture_image(&self, texture: usize) -> Result<Option<TextureImage>> {
        let source = self
            .textures()
            .get(texture)
            .ok_or_else(|| GltfError::invalid(format!("invalid texture {}", texture)))?
            .source;
        let image = self
            .images()
            .get(source)
            .ok_or_else(|| GltfError::invalid(format!("invalid image {}", source)))?;

        let data = match (image.buffer_view, image.uri.as_deref()) {
            (Some(view), _) => self.buffer_view_bytes(view)?,
            (None, Some(uri)) => decode_data_uri(uri)?,
            (None, None) => return Err(GltfError::invalid(format!("image {} has no data", source))),
        };

        Ok(data.map(|data| TextureImage {
            name: image.name.clone(),
            mime_type: image.mime_type.clone(),
            data,
        }))
    }

    /// Resolve a material's factors and textures.
    ///
    /// Absent PBR parameters take the glTF defaults.
    pub fn pbr_material(&self, material: usize) -> Result<MaterialSummary> {
        let entry = self
            .materials()
            .get(material)
            .ok_or_else(|| GltfError::invalid(format!("invalid material {}", material)))?;
        let pbr = entry.pbr_metallic_roughness.clone().unwrap_or_default();

        let resolve = |index: Option<usize>| -> Result<Option<TextureImage>> {
            match index {
                Some(index) => self.texture_image(index),
                None => Ok(None),
            }
        };

        Ok(MaterialSummary {
            name: entry.name.clone(),
            base_color_factor: pbr.base_color_factor,
            metallic_factor: pbr.metallic_factor,
            roughness_factor: pbr.roughness_factor,
            alpha_mode: entry.alpha_mode,
            double_sided: entry.double_sided,
            base_color_texture: resolve(pbr.base_color_texture.as_ref().map(|info| info.index))?,
            normal_texture: resolve(entry.normal_texture.as_ref().map(|info| info.index))?,
            occlusion_texture: resolve(entry.occlusion_texture.as_ref().map(|info| info.index))?,
        })
    }

    /// Decode every triangle primitive reachable from a node, in node order.
    ///
    /// Primitives without readable positions or not in triangle mode are
    /// skipped; other attributes stored outside the document come back empty.
    pub fn read_geometry(&self) -> Result<Vec<DecodedPrimitive>> {
        let mut decoded = Vec::new();

        for (node_index, node) in self.nodes().iter().enumerate() {
            let Some(mesh_index) = node.mesh else {
                continue;
            };
            let mesh = self.meshes().get(mesh_index).ok_or_else(|| {
                GltfError::invalid(format!("node {} references invalid mesh {}", node_index, mesh_index))
            })?;

            for primitive in &mesh.primitives {
                if primitive.mode != MODE_TRIANGLES {
                    continue;
                }
                let Some(&position) = primitive.attributes.get("POSITION") else {
                    continue;
                };
                let Some(positions) = self.read_accessor(position)? else {
                    continue;
                };
                let positions = positions.to_vec3()?;

                let attribute = |semantic: &str| -> Result<Option<AccessorData>> {
                    match primitive.attributes.get(semantic) {
                        Some(&accessor) => self.read_accessor(accessor),
                        None => Ok(None),
                    }
                };
                let uvs = match attribute("TEXCOORD_0")? {
                    Some(data) => data.to_vec2()?,
                    None => Vec::new(),
                };
                let normals = match attribute("NORMAL")? {
                    Some(data) => data.to_vec3()?,
                    None => Vec::new(),
                };
                let colors = attribute("COLOR_0")?.map(|data| data.to_vec4()).transpose()?;

                let stored_indices = match primitive.indices {
                    Some(accessor) => self.read_accessor(accessor)?.map(|data| (accessor, data)),
                    None => None,
                };
                let indices = match stored_indices {
                    Some((accessor, data)) => data.to_u32().ok_or_else(|| {
                        GltfError::invalid(format!("index accessor {} is not unsigned", accessor))
                    })?,
                    None if primitive.indices.is_some() => continue,
                    None => (0..positions.len() as u32).collect(),
                };

                decoded.push(DecodedPrimitive {
                    node: node_index,
                    mesh: mesh_index,
                    name: mesh.name.clone(),
                    positions,
                    uvs,
                    normals,
                    colors,
                    indices,
                    translation: node.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO),
                    rotation: node.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY),
                    scale: node.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE),
                    material: primitive.material,
                });
            }
        }

        tracing::debug!(primitives = decoded.len(), "decoded geometry");
        Ok(decoded)
    }
}
