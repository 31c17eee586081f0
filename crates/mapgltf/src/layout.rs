//! Interleaved vertex buffer layout.
//!
//! One primitive becomes two buffers: a `u32` index buffer and a vertex
//! buffer holding `[position.xyz, uv.xy, normal.xyz, (color.rgba)]` per
//! vertex. Each attribute gets its own buffer view over the vertex buffer,
//! sharing the record size as `byteStride` and differing only in
//! `byteOffset`. Those views run from their offset to the end of the buffer,
//! so readers must go by stride and count rather than view length.

use crate::document::Document;
use crate::options::BoundsMode;
use crate::schema::{Accessor, BufferView, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER};
use crate::types::{AccessorType, ComponentType};

use glam::{Vec2, Vec3, Vec4};
use indexmap::IndexMap;

/// Fixed position bound per axis.
pub const POSITION_BOUND: f32 = 1000.0;

/// A vertex attribute stored in the interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    TexCoord,
    Normal,
    Color,
}

impl VertexAttribute {
    /// Record order inside the vertex buffer.
    pub const ORDER: [VertexAttribute; 4] = [
        VertexAttribute::Position,
        VertexAttribute::TexCoord,
        VertexAttribute::Normal,
        VertexAttribute::Color,
    ];

    /// glTF attribute semantic.
    pub const fn semantic(self) -> &'static str {
        match self {
            VertexAttribute::Position => "POSITION",
            VertexAttribute::TexCoord => "TEXCOORD_0",
            VertexAttribute::Normal => "NORMAL",
            VertexAttribute::Color => "COLOR_0",
        }
    }

    /// Element shape of the attribute.
    pub const fn accessor_type(self) -> AccessorType {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => AccessorType::Vec3,
            VertexAttribute::TexCoord => AccessorType::Vec2,
            VertexAttribute::Color => AccessorType::Vec4,
        }
    }

    /// Bytes taken by this attribute in one record.
    pub const fn byte_size(self) -> usize {
        self.accessor_type().element_size(ComponentType::Float)
    }

    /// Placeholder `(min, max)` bounds, if the attribute carries any.
    fn fixed_bounds(self) -> Option<(Vec<f32>, Vec<f32>)> {
        match self {
            VertexAttribute::Position => {
                Some((vec![-POSITION_BOUND; 3], vec![POSITION_BOUND; 3]))
            }
            VertexAttribute::Normal => Some((vec![-1.0; 3], vec![1.0; 3])),
            VertexAttribute::Color => Some((vec![0.0; 4], vec![1.0; 4])),
            VertexAttribute::TexCoord => None,
        }
    }
}

/// Per-vertex input streams of one primitive.
///
/// All streams are expected to have the same length; the position count is
/// authoritative and missing entries of the other streams are written as zeros.
#[derive(Debug, Clone, Copy)]
pub struct VertexStreams<'a> {
    pub positions: &'a [Vec3],
    pub uvs: &'a [Vec2],
    pub normals: &'a [Vec3],
    pub colors: Option<&'a [Vec4]>,
}

impl<'a> VertexStreams<'a> {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Attributes present in each record, in record order.
    pub fn attributes(&self) -> impl Iterator<Item = VertexAttribute> {
        let has_color = self.colors.is_some();
        VertexAttribute::ORDER
            .into_iter()
            .filter(move |attribute| has_color || *attribute != VertexAttribute::Color)
    }

    /// Size of one interleaved record: 32 bytes, or 48 with colors.
    pub fn record_size(&self) -> usize {
        self.attributes().map(VertexAttribute::byte_size).sum()
    }

    /// Interleave the streams into little-endian `f32` records.
    pub fn interleave(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.len() * self.record_size());
        for (i, position) in self.positions.iter().enumerate() {
            let uv = self.uvs.get(i).copied().unwrap_or_default();
            let normal = self.normals.get(i).copied().unwrap_or_default();

            extend_f32(&mut data, &position.to_array());
            extend_f32(&mut data, &uv.to_array());
            extend_f32(&mut data, &normal.to_array());
            if let Some(colors) = self.colors {
                let color = colors.get(i).copied().unwrap_or_default();
                extend_f32(&mut data, &color.to_array());
            }
        }
        data
    }

    /// Component-wise `(min, max)` of one attribute over all vertices.
    fn computed_bounds(&self, attribute: VertexAttribute) -> Option<(Vec<f32>, Vec<f32>)> {
        let values: Vec<Vec<f32>> = match attribute {
            VertexAttribute::Position => self.positions.iter().map(|v| v.to_array().to_vec()).collect(),
            VertexAttribute::Normal => (0..self.len())
                .map(|i| self.normals.get(i).copied().unwrap_or_default().to_array().to_vec())
                .collect(),
            VertexAttribute::Color => {
                let colors = self.colors?;
                (0..self.len())
                    .map(|i| colors.get(i).copied().unwrap_or_default().to_array().to_vec())
                    .collect()
            }
            VertexAttribute::TexCoord => return None,
        };

        let width = attribute.accessor_type().component_count();
        let mut min = vec![f32::MAX; width];
        let mut max = vec![f32::MIN; width];
        for value in &values {
            for (axis, component) in value.iter().enumerate() {
                min[axis] = min[axis].min(*component);
                max[axis] = max[axis].max(*component);
            }
        }

        if values.is_empty() {
            None
        } else {
            Some((min, max))
        }
    }
}

fn extend_f32(data: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
}

/// Accessors created for one primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveLayout {
    /// Attribute semantic to accessor index.
    pub attributes: IndexMap<String, usize>,
    /// Index accessor.
    pub indices: usize,
}

impl Document {
    /// Build the buffers, buffer views and accessors of one indexed primitive.
    pub fn create_primitive(&mut self, indices: &[u32], streams: &VertexStreams<'_>) -> PrimitiveLayout {
        let index_data: Vec<u8> = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
        let vertex_data = streams.interleave();

        let index_byte_length = index_data.len();
        let vertex_byte_length = vertex_data.len();
        let byte_stride = streams.record_size();

        let index_buffer = self.create_buffer(index_data);
        let vertex_buffer = self.create_buffer(vertex_data);

        let index_view = self.create_buffer_view(BufferView {
            buffer: index_buffer,
            byte_offset: 0,
            byte_length: index_byte_length,
            byte_stride: None,
            target: Some(TARGET_ELEMENT_ARRAY_BUFFER),
        });

        let mut attribute_views = Vec::with_capacity(4);
        let mut byte_offset = 0;
        for attribute in streams.attributes() {
            let view = self.create_buffer_view(BufferView {
                buffer: vertex_buffer,
                byte_offset,
                byte_length: vertex_byte_length.saturating_sub(byte_offset),
                byte_stride: Some(byte_stride),
                target: Some(TARGET_ARRAY_BUFFER),
            });
            attribute_views.push((attribute, view));
            byte_offset += attribute.byte_size();
        }

        let index_accessor = self.create_accessor(Accessor {
            buffer_view: Some(index_view),
            byte_offset: 0,
            component_type: ComponentType::UnsignedInt,
            count: indices.len(),
            max: None,
            min: None,
            accessor_type: AccessorType::Scalar,
        });

        let bounds_mode = self.options.bounds;
        let mut attributes = IndexMap::new();
        for (attribute, view) in attribute_views {
            let bounds = match bounds_mode {
                BoundsMode::Fixed => attribute.fixed_bounds(),
                BoundsMode::Computed => streams.computed_bounds(attribute),
            };
            let (min, max) = match bounds {
                Some((min, max)) => (Some(min), Some(max)),
                None => (None, None),
            };

            let accessor = self.create_accessor(Accessor {
                buffer_view: Some(view),
                byte_offset: 0,
                component_type: ComponentType::Float,
                count: streams.len(),
                max,
                min,
                accessor_type: attribute.accessor_type(),
            });
            attributes.insert(attribute.semantic().to_string(), accessor);
        }

        tracing::debug!(
            vertices = streams.len(),
            indices = indices.len(),
            byte_stride,
            "created primitive"
        );

        PrimitiveLayout {
            attributes,
            indices: index_accessor,
        }
    }
}
