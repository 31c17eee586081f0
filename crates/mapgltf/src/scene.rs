//! Legacy scene description and node hierarchy construction.
//!
//! A scene description maps group names to lists of objects. Each group
//! becomes a node under the scene root and each object a node under its
//! group; objects with vertex data also get a mesh, shared by name.

use crate::document::Document;
use crate::error::Result;
use crate::layout::VertexStreams;
use crate::material::{LegacyMaterial, TextureCodec};
use crate::options::ExportOptions;
use crate::schema::{Mesh, Node, Primitive, MODE_TRIANGLES};

use glam::{Quat, Vec2, Vec3, Vec4};
use indexmap::IndexMap;
use serde::Deserialize;

/// Renderable data of an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub colors: Option<Vec<Vec4>>,
    pub material: Option<LegacyMaterial>,
}

impl MeshData {
    /// The per-vertex streams fed to the buffer layout.
    pub fn streams(&self) -> VertexStreams<'_> {
        VertexStreams {
            positions: &self.vertices,
            uvs: &self.uvs,
            normals: &self.normals,
            colors: self.colors.as_deref(),
        }
    }
}

/// What an object contributes besides its transform.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Vertex data to export as a mesh.
    Mesh(MeshData),
    /// A bare transform node.
    Transform,
}

/// One object of the legacy scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawObject")]
pub struct SceneObject {
    pub name: String,
    pub position: Vec3,
    /// Euler angles in degrees, `[roll, pitch, yaw]`.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub kind: ObjectKind,
}

impl SceneObject {
    /// A transform-only object at the origin.
    pub fn transform(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            kind: ObjectKind::Transform,
        }
    }

    /// An object carrying mesh data at the origin.
    pub fn mesh(name: impl Into<String>, data: MeshData) -> Self {
        Self {
            kind: ObjectKind::Mesh(data),
            ..Self::transform(name)
        }
    }
}

/// Object record as the legacy exporter writes it: every field optional.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    #[serde(default)]
    name: String,
    #[serde(default, alias = "vertecies")]
    vertices: Vec<Vec3>,
    #[serde(default)]
    uvs: Vec<Vec2>,
    #[serde(default)]
    normals: Vec<Vec3>,
    #[serde(default)]
    indices: Vec<u32>,
    #[serde(default, alias = "color")]
    colors: Option<Vec<Vec4>>,
    #[serde(default)]
    material: Option<LegacyMaterial>,
    #[serde(default)]
    position: Option<Vec3>,
    #[serde(default)]
    rotation: Option<Vec3>,
    #[serde(default)]
    scale: Option<Vec3>,
}

impl From<RawObject> for SceneObject {
    fn from(raw: RawObject) -> Self {
        let kind = if raw.vertices.is_empty() {
            ObjectKind::Transform
        } else {
            ObjectKind::Mesh(MeshData {
                vertices: raw.vertices,
                uvs: raw.uvs,
                normals: raw.normals,
                indices: raw.indices,
                colors: raw.colors,
                material: raw.material,
            })
        };

        Self {
            name: raw.name,
            position: raw.position.unwrap_or(Vec3::ZERO),
            rotation: raw.rotation.unwrap_or(Vec3::ZERO),
            scale: raw.scale.unwrap_or(Vec3::ONE),
            kind,
        }
    }
}

/// A named list of objects sharing a parent transform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawGroup")]
pub struct ObjectGroup {
    pub position: Vec3,
    /// Euler angles in degrees, `[roll, pitch, yaw]`.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub objects: Vec<SceneObject>,
}

impl ObjectGroup {
    /// A group at the origin.
    pub fn new(objects: Vec<SceneObject>) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            objects,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroup {
    List(Vec<SceneObject>),
    Placed {
        objects: Vec<SceneObject>,
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        rotation: Option<Vec3>,
        #[serde(default)]
        scale: Option<Vec3>,
    },
}

impl From<RawGroup> for ObjectGroup {
    fn from(raw: RawGroup) -> Self {
        match raw {
            RawGroup::List(objects) => Self::new(objects),
            RawGroup::Placed {
                objects,
                position,
                rotation,
                scale,
            } => Self {
                position: position.unwrap_or(Vec3::ZERO),
                rotation: rotation.unwrap_or(Vec3::ZERO),
                scale: scale.unwrap_or(Vec3::ONE),
                objects,
            },
        }
    }
}

/// The legacy scene: object groups in insertion order.
///
/// When deserialized from a JSON object, arrays and `{ "objects": [..] }`
/// records become groups and every other entry is skipped. A malformed
/// object inside a group fails the whole description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDescription {
    pub groups: IndexMap<String, ObjectGroup>,
}

impl SceneDescription {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group, keeping insertion order.
    pub fn with_group(mut self, name: impl Into<String>, group: ObjectGroup) -> Self {
        self.groups.insert(name.into(), group);
        self
    }
}

impl<'de> Deserialize<'de> for SceneDescription {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;

        let mut groups = IndexMap::new();
        for (name, value) in entries {
            let group = if value.is_array() {
                Vec::<SceneObject>::deserialize(value).map(ObjectGroup::new)
            } else if value.get("objects").is_some() {
                ObjectGroup::deserialize(value)
            } else {
                tracing::debug!(entry = %name, "skipping scene entry without objects");
                continue;
            };
            let group = group.map_err(|e| {
                <D::Error as serde::de::Error>::custom(format!("group {:?}: {}", name, e))
            })?;
            groups.insert(name, group);
        }
        Ok(Self { groups })
    }
}

/// Truncate toward negative infinity at five decimal places.
fn floor5(value: f64) -> f32 {
    ((value * 100_000.0).floor() / 100_000.0) as f32
}

/// Convert Euler angles in degrees (`[roll, pitch, yaw]`) to a quaternion.
///
/// The rotation is yaw about Z, then pitch about Y, then roll about X
/// (`q = yaw * pitch * roll`). Every component is floored at five decimals,
/// so negative components move away from zero.
pub fn euler_degrees_to_quat(rotation: Vec3) -> Quat {
    let roll = f64::from(rotation.x).to_radians();
    let pitch = f64::from(rotation.y).to_radians();
    let yaw = f64::from(rotation.z).to_radians();

    let (sy, cy) = (yaw * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sr, cr) = (roll * 0.5).sin_cos();

    let w = cy * cp * cr + sy * sp * sr;
    let x = cy * cp * sr - sy * sp * cr;
    let y = sy * cp * sr + cy * sp * cr;
    let z = sy * cp * cr - cy * sp * sr;

    Quat::from_xyzw(floor5(x), floor5(y), floor5(z), floor5(w))
}

/// Swap into the glTF up axis: `[x, y, z, w]` becomes `[x, z, -y, w]`.
pub fn remap_up_axis(rotation: Quat) -> [f32; 4] {
    [rotation.x, rotation.z, -rotation.y, rotation.w]
}

impl Document {
    /// Build a document from a legacy scene description.
    ///
    /// Each group becomes a node under the scene root, and each of its
    /// objects a node under the group.
    pub fn from_scene(
        description: &SceneDescription,
        codec: &dyn TextureCodec,
        options: ExportOptions,
    ) -> Result<Self> {
        let mut doc = Self::with_options(options);
        doc.add_scene(description, codec)?;
        Ok(doc)
    }

    /// Add every group of `description` under the scene root.
    pub fn add_scene(&mut self, description: &SceneDescription, codec: &dyn TextureCodec) -> Result<()> {
        for (name, group) in &description.groups {
            let parent = self.create_node(Node {
                name: Some(name.clone()),
                mesh: None,
                scale: Some(group.scale.to_array()),
                rotation: Some(euler_degrees_to_quat(group.rotation).to_array()),
                translation: Some(group.position.to_array()),
                children: Vec::new(),
            });
            self.attach(None, parent);

            for object in &group.objects {
                self.add_object(object, Some(parent), codec)?;
            }
            tracing::debug!(group = %name, objects = group.objects.len(), "added object group");
        }
        Ok(())
    }

    /// Add one object as a node under `parent` (the scene root if `None`).
    ///
    /// A mesh already registered under the object's name is reused, even for
    /// transform-only objects.
    pub fn add_object(
        &mut self,
        object: &SceneObject,
        parent: Option<usize>,
        codec: &dyn TextureCodec,
    ) -> Result<usize> {
        let mut mesh = self.mesh_by_name(&object.name);
        if let (None, ObjectKind::Mesh(data)) = (mesh, &object.kind) {
            if !data.vertices.is_empty() {
                mesh = Some(self.create_object_mesh(&object.name, data, codec)?);
            }
        }

        let node = self.create_node(Node {
            name: Some(object.name.clone()),
            mesh,
            scale: Some(object.scale.to_array()),
            rotation: Some(remap_up_axis(euler_degrees_to_quat(object.rotation))),
            translation: Some(object.position.to_array()),
            children: Vec::new(),
        });
        self.attach(parent, node);
        Ok(node)
    }

    /// Build the single-primitive mesh of an object.
    pub fn create_object_mesh(&mut self, name: &str, data: &MeshData, codec: &dyn TextureCodec) -> Result<usize> {
        let material = data
            .material
            .as_ref()
            .map(|material| self.convert_material(material, codec))
            .transpose()?;
        let layout = self.create_primitive(&data.indices, &data.streams());

        let index = self.create_mesh(Mesh {
            name: Some(name.to_string()),
            primitives: vec![Primitive {
                attributes: layout.attributes,
                indices: Some(layout.indices),
                material,
                mode: MODE_TRIANGLES,
            }],
        });
        tracing::debug!(index, name, "created mesh");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::InlineEncoder;
    use crate::material::PassthroughCodec;

    fn triangle(name: &str) -> SceneObject {
        SceneObject::mesh(
            name,
            MeshData {
                vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                normals: vec![Vec3::Z; 3],
                indices: vec![0, 1, 2],
                ..Default::default()
            },
        )
    }

    fn build(description: &SceneDescription) -> Document {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        doc.add_scene(description, &PassthroughCodec).unwrap();
        doc
    }

    #[test]
    fn test_identity_rotation() {
        let q = euler_degrees_to_quat(Vec3::ZERO);
        assert_eq!(q.to_array(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(remap_up_axis(q), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotation_truncates_downward() {
        // 90 degrees of yaw: z = w = sin(45°) = 0.7071067...
        let q = euler_degrees_to_quat(Vec3::new(0.0, 0.0, 90.0));
        assert_eq!(q.z, 0.70710);
        assert_eq!(q.w, 0.70710);

        // Negative components floor away from zero.
        let q = euler_degrees_to_quat(Vec3::new(0.0, 0.0, -90.0));
        assert_eq!(q.z, -0.70711);
        assert_eq!(q.w, 0.70710);
    }

    #[test]
    fn test_up_axis_remap() {
        let q = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        assert_eq!(remap_up_axis(q), [0.1, 0.3, -0.2, 0.9]);
    }

    #[test]
    fn test_single_triangle_scene() {
        let description =
            SceneDescription::new().with_group("props", ObjectGroup::new(vec![triangle("crate")]));
        let doc = build(&description);

        assert_eq!(doc.meshes().len(), 1);
        let primitive = &doc.meshes()[0].primitives[0];
        assert!(primitive.indices.is_some());
        assert!(primitive.material.is_none());
        for semantic in ["POSITION", "TEXCOORD_0", "NORMAL"] {
            assert!(primitive.attributes.contains_key(semantic));
        }
        assert!(!primitive.attributes.contains_key("COLOR_0"));

        let position_view = doc.accessors()[primitive.attributes["POSITION"]].buffer_view.unwrap();
        assert_eq!(doc.buffer_views()[position_view].byte_stride, Some(32));

        // root -> props -> crate
        assert_eq!(doc.root_node().children, vec![1]);
        assert_eq!(doc.nodes()[1].name.as_deref(), Some("props"));
        assert_eq!(doc.nodes()[1].children, vec![2]);
        let node = &doc.nodes()[2];
        assert_eq!(node.mesh, Some(0));
        assert_eq!(node.rotation, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(node.scale, Some([1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_colored_triangle_stride() {
        let mut object = triangle("lamp");
        if let ObjectKind::Mesh(data) = &mut object.kind {
            data.colors = Some(vec![Vec4::ONE; 3]);
        }
        let description = SceneDescription::new().with_group("lights", ObjectGroup::new(vec![object]));
        let doc = build(&description);

        let primitive = &doc.meshes()[0].primitives[0];
        let color_view = doc.accessors()[primitive.attributes["COLOR_0"]].buffer_view.unwrap();
        assert_eq!(doc.buffer_views()[color_view].byte_stride, Some(48));
    }

    #[test]
    fn test_meshes_shared_by_name() {
        let mut moved = triangle("crate");
        moved.position = Vec3::new(5.0, 0.0, 0.0);
        let marker = SceneObject::transform("crate");
        let description = SceneDescription::new()
            .with_group("props", ObjectGroup::new(vec![triangle("crate"), moved, marker]));
        let doc = build(&description);

        assert_eq!(doc.meshes().len(), 1);
        assert_eq!(doc.buffers().len(), 2);
        let meshes: Vec<_> = doc.nodes()[2..].iter().map(|n| n.mesh).collect();
        assert_eq!(meshes, [Some(0), Some(0), Some(0)]);
        assert_eq!(doc.nodes()[3].translation, Some([5.0, 0.0, 0.0]));
    }

    #[test]
    fn test_transform_only_object() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let node = doc
            .add_object(&SceneObject::transform("spawn"), None, &PassthroughCodec)
            .unwrap();

        assert_eq!(doc.nodes()[node].mesh, None);
        assert_eq!(doc.root_node().children, vec![node]);
        assert!(doc.buffers().is_empty());
    }

    #[test]
    fn test_mesh_with_material() {
        let mut object = triangle("door");
        if let ObjectKind::Mesh(data) = &mut object.kind {
            data.material = Some(LegacyMaterial {
                name: "doors/oak".to_string(),
                ..Default::default()
            });
        }
        let description = SceneDescription::new().with_group("props", ObjectGroup::new(vec![object]));
        let doc = build(&description);

        assert_eq!(doc.meshes()[0].primitives[0].material, Some(0));
        assert_eq!(doc.materials()[0].name.as_deref(), Some("doors_oak"));
    }

    #[test]
    fn test_group_transform_is_not_remapped() {
        let group = ObjectGroup {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, 90.0, 0.0),
            scale: Vec3::splat(2.0),
            objects: Vec::new(),
        };
        let doc = build(&SceneDescription::new().with_group("world", group));

        let node = &doc.nodes()[1];
        assert_eq!(node.translation, Some([1.0, 2.0, 3.0]));
        assert_eq!(node.scale, Some([2.0, 2.0, 2.0]));
        assert_eq!(node.rotation, Some([0.0, 0.7071, 0.0, 0.7071]));
    }

    #[test]
    fn test_deserialize_description() {
        let json = r#"{
            "version": 3,
            "props": [
                {
                    "name": "crate",
                    "vertecies": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
                    "uvs": [[0, 0], [1, 0], [0, 1]],
                    "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]],
                    "indices": [0, 1, 2],
                    "position": [1, 2, 3],
                    "rotation": [0, 0, 0],
                    "scale": [1, 1, 1]
                },
                { "name": "spawn" }
            ],
            "lights": {
                "position": [0, 10, 0],
                "objects": []
            }
        }"#;

        let description: SceneDescription = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = description.groups.keys().map(String::as_str).collect();
        assert_eq!(names, ["props", "lights"]);

        let props = &description.groups["props"];
        assert!(matches!(props.objects[0].kind, ObjectKind::Mesh(_)));
        assert_eq!(props.objects[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(props.objects[1].kind, ObjectKind::Transform);
        assert_eq!(props.objects[1].scale, Vec3::ONE);
        assert_eq!(description.groups["lights"].position, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_malformed_object_fails_its_group() {
        let json = r#"{
            "props": [
                {
                    "name": "crate",
                    "vertecies": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
                    "indices": [0, 1, 2]
                },
                { "name": "bad", "vertecies": [[0, 0]] }
            ]
        }"#;

        let err = serde_json::from_str::<SceneDescription>(json).unwrap_err();
        assert!(err.to_string().contains("props"));
    }
}
