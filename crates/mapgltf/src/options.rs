//! Export configuration.

use serde::{Deserialize, Serialize};

/// How position, normal and color accessors get their `min`/`max` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsMode {
    /// Fixed conservative bounds: ±1000 for positions, ±1 for normals, [0, 1] for colors.
    #[default]
    Fixed,
    /// Bounds computed from the vertex data.
    Computed,
}

/// Options for building and serializing a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// `asset.generator` of new documents.
    pub generator: String,
    /// `asset.copyright` of new documents.
    pub copyright: Option<String>,
    /// Name of the scene root node.
    pub root_name: String,
    /// Name of the default scene.
    pub scene_name: String,
    /// MIME type recorded on embedded texture images.
    pub image_mime_type: String,
    /// Accessor bounds policy.
    pub bounds: BoundsMode,
    /// Tab-indent the serialized JSON.
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            generator: concat!("mapgltf v", env!("CARGO_PKG_VERSION")).to_string(),
            copyright: None,
            root_name: "Map".to_string(),
            scene_name: "Scene".to_string(),
            image_mime_type: "image/png".to_string(),
            bounds: BoundsMode::Fixed,
            pretty: true,
        }
    }
}

impl ExportOptions {
    /// Create default export options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generator string.
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// Set the copyright notice.
    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = Some(copyright.into());
        self
    }

    /// Set the scene root node name.
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = name.into();
        self
    }

    /// Override the MIME type of embedded images.
    pub fn with_image_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.image_mime_type = mime_type.into();
        self
    }

    /// Set the accessor bounds policy.
    pub fn with_bounds(mut self, bounds: BoundsMode) -> Self {
        self.bounds = bounds;
        self
    }

    /// Emit compact JSON.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}
