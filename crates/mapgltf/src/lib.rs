//! mapgltf: glTF 2.0 export for legacy map geometry and materials.
//!
//! Builds a self-contained `.gltf` document (node hierarchy, meshes,
//! materials, embedded textures and buffers) from a legacy scene
//! description, and reads embedded data back out of such documents.
//!
//! # Quick Start
//!
//! ```ignore
//! use mapgltf::{export_scene, ExportOptions, PassthroughCodec, SceneDescription};
//!
//! let description: SceneDescription = serde_json::from_str(&legacy_json)?;
//! let text = export_scene(&description, &PassthroughCodec, ExportOptions::default()).await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! SceneDescription ─> scene ─┬─> material ─┐
//!                            └─> layout  ──┼─> Document ─> encode ─> JSON text
//!                                          │   (pools)     (buffer URIs)
//!                              reader <────┘
//! ```
//!
//! Every binary payload is reserved as a buffer slot immediately and filled
//! with its base64 data URI by a [`BufferEncoder`]. Serialization waits until
//! every slot has landed, however many were reserved and in whatever order
//! they complete.

pub mod document;
pub mod encode;
pub mod error;
pub mod layout;
pub mod material;
pub mod options;
pub mod reader;
pub mod scene;
pub mod schema;
pub mod types;

pub use document::{Blob, Document, GLTF_MIME_TYPE, ROOT_NODE};
pub use encode::{host_encoder, BufferEncoder, BufferFinalizer, DeferredEncoder, Encoding, InlineEncoder};
pub use error::{GltfError, Result};
pub use layout::{PrimitiveLayout, VertexAttribute, VertexStreams};
pub use material::{LegacyMaterial, LegacyTexture, PassthroughCodec, PixelFormat, TextureCodec, TextureFormat};
pub use options::{BoundsMode, ExportOptions};
pub use reader::{decode_data_uri, AccessorData, AccessorValues, DecodedPrimitive, MaterialSummary, TextureImage};
pub use scene::{euler_degrees_to_quat, MeshData, ObjectGroup, ObjectKind, SceneDescription, SceneObject};
pub use types::{AccessorType, ComponentType};

/// Export a legacy scene to glTF JSON text.
///
/// Resolves once every embedded buffer has been encoded.
///
/// # Example
///
/// ```ignore
/// let text = mapgltf::export_scene(&description, &codec, ExportOptions::new().compact()).await?;
/// std::fs::write("map.gltf", text)?;
/// ```
pub async fn export_scene(
    description: &SceneDescription,
    codec: &dyn TextureCodec,
    options: ExportOptions,
) -> Result<String> {
    let mut document = Document::from_scene(description, codec, options)?;
    tracing::info!(
        nodes = document.nodes().len(),
        meshes = document.meshes().len(),
        buffers = document.buffers().len(),
        "exporting scene"
    );
    document.to_json_string().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn description() -> SceneDescription {
        let triangle = SceneObject::mesh(
            "ramp",
            MeshData {
                vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                normals: vec![Vec3::Z; 3],
                indices: vec![0, 1, 2],
                ..Default::default()
            },
        );
        SceneDescription::new().with_group("level", ObjectGroup::new(vec![triangle]))
    }

    #[tokio::test]
    async fn test_export_scene() {
        let text = export_scene(&description(), &PassthroughCodec, ExportOptions::default())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["asset"]["version"], "2.0");
        assert_eq!(value["scenes"][0]["name"], "Scene");
        assert_eq!(value["nodes"][0]["name"], "Map");
        assert_eq!(value["meshes"].as_array().unwrap().len(), 1);

        let buffers = value["buffers"].as_array().unwrap();
        assert_eq!(buffers.len(), 2);
        assert!(buffers
            .iter()
            .all(|b| b["uri"].as_str().unwrap().starts_with(encode::DATA_URI_PREFIX)));
        assert!(text.contains("\n\t\"asset\""));
    }

    #[tokio::test]
    async fn test_export_compact() {
        let text = export_scene(&description(), &PassthroughCodec, ExportOptions::new().compact())
            .await
            .unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_export_on_current_thread_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let text = runtime
            .block_on(export_scene(&description(), &PassthroughCodec, ExportOptions::default()))
            .unwrap();

        let document = Document::from_blob(&Blob::new(GLTF_MIME_TYPE, text)).unwrap();
        let geometry = document.read_geometry().unwrap();
        assert_eq!(geometry[0].name.as_deref(), Some("ramp"));
        assert_eq!(geometry[0].indices, [0, 1, 2]);
    }
}
