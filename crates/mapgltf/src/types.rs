//! glTF component and element type registry.
//!
//! Maps symbolic component kinds to their numeric codes and byte lengths,
//! and element shapes to their component counts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric code and byte length of a component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    /// glTF `componentType` code.
    pub code: u32,
    /// Size of one component in bytes.
    pub byte_length: usize,
}

/// Tag and component count of an element shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    /// glTF `type` string.
    pub tag: &'static str,
    /// Number of components per element.
    pub component_count: usize,
}

/// Accessor component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

const COMPONENT_TABLE: [(ComponentType, ComponentInfo); 6] = [
    (ComponentType::Byte, ComponentInfo { code: 5120, byte_length: 1 }),
    (ComponentType::UnsignedByte, ComponentInfo { code: 5121, byte_length: 1 }),
    (ComponentType::Short, ComponentInfo { code: 5122, byte_length: 2 }),
    (ComponentType::UnsignedShort, ComponentInfo { code: 5123, byte_length: 2 }),
    (ComponentType::UnsignedInt, ComponentInfo { code: 5125, byte_length: 4 }),
    (ComponentType::Float, ComponentInfo { code: 5126, byte_length: 4 }),
];

impl ComponentType {
    /// Look up the code and byte length of this component kind.
    pub const fn info(self) -> ComponentInfo {
        COMPONENT_TABLE[self as usize].1
    }

    /// glTF `componentType` code.
    pub const fn code(self) -> u32 {
        self.info().code
    }

    /// Size of one component in bytes.
    pub const fn byte_length(self) -> usize {
        self.info().byte_length
    }

    /// Resolve a numeric code back to its component kind.
    pub fn from_code(code: u32) -> Option<Self> {
        COMPONENT_TABLE
            .iter()
            .find(|(_, info)| info.code == code)
            .map(|(kind, _)| *kind)
    }
}

impl From<ComponentType> for u32 {
    fn from(kind: ComponentType) -> Self {
        kind.code()
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = UnknownCode;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownCode(code))
    }
}

/// A `componentType` code outside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown component type code {0}")]
pub struct UnknownCode(pub u32);

/// Accessor element shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

const TYPE_TABLE: [(AccessorType, TypeInfo); 7] = [
    (AccessorType::Scalar, TypeInfo { tag: "SCALAR", component_count: 1 }),
    (AccessorType::Vec2, TypeInfo { tag: "VEC2", component_count: 2 }),
    (AccessorType::Vec3, TypeInfo { tag: "VEC3", component_count: 3 }),
    (AccessorType::Vec4, TypeInfo { tag: "VEC4", component_count: 4 }),
    (AccessorType::Mat2, TypeInfo { tag: "MAT2", component_count: 4 }),
    (AccessorType::Mat3, TypeInfo { tag: "MAT3", component_count: 9 }),
    (AccessorType::Mat4, TypeInfo { tag: "MAT4", component_count: 16 }),
];

impl AccessorType {
    /// Look up the tag and component count of this shape.
    pub const fn info(self) -> TypeInfo {
        TYPE_TABLE[self as usize].1
    }

    /// Number of components per element.
    pub const fn component_count(self) -> usize {
        self.info().component_count
    }

    /// glTF `type` string.
    pub const fn tag(self) -> &'static str {
        self.info().tag
    }

    /// Bytes occupied by one element made of `component` values.
    pub const fn element_size(self, component: ComponentType) -> usize {
        self.component_count() * component.byte_length()
    }
}
