//! The append-only glTF document.
//!
//! Every `create_*` call appends to its pool and returns the new index;
//! nothing is ever removed or reordered, so returned indices stay valid for
//! the lifetime of the document. Node 0 is the scene root.

use crate::encode::{host_encoder, BufferEncoder, BufferFinalizer};
use crate::error::{GltfError, Result};
use crate::options::ExportOptions;
use crate::schema::{
    Accessor, Asset, Buffer, BufferView, Gltf, Image, Material, Mesh, Node, Sampler, Scene,
    Texture, DEFAULT_SAMPLER,
};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// MIME type of serialized documents.
pub const GLTF_MIME_TYPE: &str = "model/gltf+json";

/// Index of the scene root node.
pub const ROOT_NODE: usize = 0;

/// A binary container holding document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// MIME type of the contents.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl Blob {
    /// Wrap bytes with a MIME type.
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    fn holds_json(&self) -> bool {
        let essence = self.mime_type.split(';').next().unwrap_or("").trim();
        matches!(essence, "" | GLTF_MIME_TYPE | "application/json")
    }
}

/// An in-memory glTF document under construction.
#[derive(Debug)]
pub struct Document {
    pub(crate) gltf: Gltf,
    pub(crate) options: ExportOptions,
    finalizer: BufferFinalizer,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with default options.
    pub fn new() -> Self {
        Self::with_options(ExportOptions::default())
    }

    /// Create an empty document: one root node, one scene, one default sampler.
    pub fn with_options(options: ExportOptions) -> Self {
        let gltf = Gltf {
            asset: Asset {
                generator: Some(options.generator.clone()),
                copyright: options.copyright.clone(),
                version: "2.0".to_string(),
            },
            scene: Some(0),
            scenes: vec![Scene {
                name: Some(options.scene_name.clone()),
                nodes: vec![ROOT_NODE],
            }],
            nodes: vec![Node::named(options.root_name.clone())],
            samplers: vec![DEFAULT_SAMPLER],
            ..Default::default()
        };

        Self {
            gltf,
            options,
            finalizer: BufferFinalizer::new(host_encoder()),
        }
    }

    /// Wrap an already parsed JSON document.
    ///
    /// Fails with [`GltfError::MissingAssetSection`] when there is no `asset` block.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(GltfError::InvalidInputType(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        };
        if !object.contains_key("asset") {
            return Err(GltfError::MissingAssetSection);
        }

        let gltf: Gltf = serde_json::from_value(value)?;
        // Buffers read from a document already carry their payload.
        let completed = gltf.buffers.len();

        Ok(Self {
            gltf,
            options: ExportOptions::default(),
            finalizer: BufferFinalizer::with_completed(host_encoder(), completed),
        })
    }

    /// Read a document from a binary container holding UTF-8 JSON.
    pub fn from_blob(blob: &Blob) -> Result<Self> {
        if !blob.holds_json() {
            return Err(GltfError::InvalidInputType(format!(
                "blob of type {:?} is not a glTF JSON container",
                blob.mime_type
            )));
        }
        let text = std::str::from_utf8(&blob.data)
            .map_err(|e| GltfError::InvalidInputType(format!("blob is not UTF-8 text: {}", e)))?;
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    /// Use `encoder` for every buffer registered from now on.
    pub fn with_encoder(mut self, encoder: impl BufferEncoder + 'static) -> Self {
        self.finalizer.set_encoder(Box::new(encoder));
        self
    }

    /// Options this document was built with.
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// The raw glTF object graph.
    pub fn gltf(&self) -> &Gltf {
        &self.gltf
    }

    /// `asset.generator`.
    pub fn generator(&self) -> Option<&str> {
        self.gltf.asset.generator.as_deref()
    }

    /// `asset.copyright`.
    pub fn copyright(&self) -> Option<&str> {
        self.gltf.asset.copyright.as_deref()
    }

    /// `asset.version`.
    pub fn version(&self) -> &str {
        &self.gltf.asset.version
    }

    /// Node pool; index 0 is the scene root.
    pub fn nodes(&self) -> &[Node] {
        &self.gltf.nodes
    }

    /// Mesh pool.
    pub fn meshes(&self) -> &[Mesh] {
        &self.gltf.meshes
    }

    /// Material pool.
    pub fn materials(&self) -> &[Material] {
        &self.gltf.materials
    }

    /// Texture pool.
    pub fn textures(&self) -> &[Texture] {
        &self.gltf.textures
    }

    /// Image pool.
    pub fn images(&self) -> &[Image] {
        &self.gltf.images
    }

    /// Sampler pool.
    pub fn samplers(&self) -> &[Sampler] {
        &self.gltf.samplers
    }

    /// Accessor pool.
    pub fn accessors(&self) -> &[Accessor] {
        &self.gltf.accessors
    }

    /// Buffer view pool.
    pub fn buffer_views(&self) -> &[BufferView] {
        &self.gltf.buffer_views
    }

    /// Buffer pool, including slots still waiting on their encoder.
    pub fn buffers(&self) -> &[Buffer] {
        &self.gltf.buffers
    }

    /// The scene root node.
    pub fn root_node(&self) -> &Node {
        &self.gltf.nodes[ROOT_NODE]
    }

    /// Add a node and return its index.
    pub fn create_node(&mut self, node: Node) -> usize {
        push(&mut self.gltf.nodes, node)
    }

    /// Append `child` to the children of `parent`, or of the root when `None`.
    ///
    /// Unknown parents are ignored.
    pub fn attach(&mut self, parent: Option<usize>, child: usize) {
        let parent = parent.unwrap_or(ROOT_NODE);
        match self.gltf.nodes.get_mut(parent) {
            Some(node) => node.children.push(child),
            None => tracing::warn!(parent, child, "cannot attach node to a missing parent"),
        }
    }

    /// Add a mesh and return its index.
    pub fn create_mesh(&mut self, mesh: Mesh) -> usize {
        push(&mut self.gltf.meshes, mesh)
    }

    /// Add a material and return its index.
    pub fn create_material(&mut self, material: Material) -> usize {
        push(&mut self.gltf.materials, material)
    }

    /// Add a buffer view and return its index.
    pub fn create_buffer_view(&mut self, view: BufferView) -> usize {
        push(&mut self.gltf.buffer_views, view)
    }

    /// Add an accessor and return its index.
    pub fn create_accessor(&mut self, accessor: Accessor) -> usize {
        push(&mut self.gltf.accessors, accessor)
    }

    /// Add an image and return its index.
    pub fn create_image(&mut self, image: Image) -> usize {
        push(&mut self.gltf.images, image)
    }

    /// Add a texture and return its index.
    pub fn create_texture(&mut self, texture: Texture) -> usize {
        push(&mut self.gltf.textures, texture)
    }

    /// Reserve a buffer slot for `payload` and start embedding it.
    ///
    /// The index and byte length are fixed immediately; the data URI lands
    /// when the encoder finishes.
    pub fn create_buffer(&mut self, payload: Vec<u8>) -> usize {
        self.finalizer.reserve(&mut self.gltf.buffers, payload)
    }

    /// Index of the first material called `name`.
    pub fn material_by_name(&self, name: &str) -> Option<usize> {
        self.gltf
            .materials
            .iter()
            .position(|material| material.name.as_deref() == Some(name))
    }

    /// Index of the first mesh called `name`.
    pub fn mesh_by_name(&self, name: &str) -> Option<usize> {
        self.gltf
            .meshes
            .iter()
            .position(|mesh| mesh.name.as_deref() == Some(name))
    }

    /// Number of buffers whose payload has landed.
    pub fn loaded_buffer_count(&self) -> usize {
        self.finalizer.completed()
    }

    /// Whether every reserved buffer has landed.
    pub fn is_loaded(&self) -> bool {
        self.finalizer.completed() == self.gltf.buffers.len()
    }

    /// Land deferred buffers that finished since the last call.
    pub fn poll_buffers(&mut self) -> Result<usize> {
        self.finalizer.poll(&mut self.gltf.buffers)
    }

    /// Serialize now if every buffer has landed, without waiting.
    pub fn try_to_json_string(&mut self) -> Option<Result<String>> {
        if let Err(e) = self.poll_buffers() {
            return Some(Err(e));
        }
        self.is_loaded().then(|| self.render())
    }

    /// Serialize the document once every buffer has landed.
    ///
    /// Resolves right away when already loaded; otherwise it resolves when
    /// the last outstanding buffer lands, including buffers reserved after
    /// the encoders were started.
    pub async fn to_json_string(&mut self) -> Result<String> {
        self.finalizer.wait_all(&mut self.gltf.buffers).await?;
        self.render()
    }

    /// Serialize into a `model/gltf+json` container.
    pub async fn to_blob(&mut self) -> Result<Blob> {
        let text = self.to_json_string().await?;
        Ok(Blob::new(GLTF_MIME_TYPE, text.into_bytes()))
    }

    fn render(&self) -> Result<String> {
        let bytes = if self.options.pretty {
            let mut bytes = Vec::new();
            let formatter = PrettyFormatter::with_indent(b"\t");
            let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
            self.gltf.serialize(&mut serializer)?;
            bytes
        } else {
            serde_json::to_vec(&self.gltf)?
        };

        String::from_utf8(bytes)
            .map_err(|e| GltfError::invalid(format!("serializer produced invalid UTF-8: {}", e)))
    }
}

fn push<T>(pool: &mut Vec<T>, element: T) -> usize {
    pool.push(element);
    pool.len() - 1
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
