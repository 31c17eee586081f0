//! Legacy material conversion.
//!
//! Legacy materials carry raw texture pixels; each texture goes through a
//! [`TextureCodec`] and the resulting container is embedded as a buffer,
//! buffer view, image and texture. Materials are deduplicated by their
//! sanitized name.

use crate::document::Document;
use crate::error::Result;
use crate::schema::{
    AlphaMode, BufferView, Image, Material, NormalTextureInfo, OcclusionTextureInfo,
    PbrMetallicRoughness, Texture, TextureInfo,
};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Pixel layout of a legacy texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit RGBA.
    Rgba8,
    /// 8-bit RGB.
    Rgb8,
    /// BC1 blocks.
    Dxt1,
    /// BC2 blocks.
    Dxt3,
    /// BC3 blocks.
    Dxt5,
}

/// Pixel format and dimensions of a legacy texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureFormat {
    #[serde(rename = "type")]
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// A texture as stored by the legacy engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTexture {
    /// Raw pixel data in `format`.
    pub image_data: Vec<u8>,
    pub format: TextureFormat,
    /// RGB reflectivity; only meaningful on base textures.
    #[serde(default)]
    pub reflectivity: Vec3,
}

/// A material as stored by the legacy engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMaterial {
    pub name: String,
    /// Base color texture.
    #[serde(default)]
    pub texture: Option<LegacyTexture>,
    /// Secondary base texture, exported as occlusion.
    #[serde(default)]
    pub texture2: Option<LegacyTexture>,
    /// Bump map, exported as the normal texture.
    #[serde(default)]
    pub bumpmap: Option<LegacyTexture>,
    #[serde(default)]
    pub translucent: bool,
}

/// Turns raw legacy pixels into an embeddable image container.
pub trait TextureCodec {
    /// File extension of produced containers, used in image names.
    fn extension(&self) -> &str {
        "dds"
    }

    /// Build a compressed container from raw pixels.
    fn encode(&self, pixels: &[u8], format: PixelFormat, width: u32, height: u32) -> Result<Vec<u8>>;
}

/// Codec that embeds the pixel data unchanged.
///
/// Suitable when the legacy pixels are already a finished container.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl TextureCodec for PassthroughCodec {
    fn encode(&self, pixels: &[u8], _format: PixelFormat, _width: u32, _height: u32) -> Result<Vec<u8>> {
        Ok(pixels.to_vec())
    }
}

/// Replace path separators so the name is usable as a flat identifier.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Roughness derived from base-texture reflectivity.
pub fn roughness_from_reflectivity(reflectivity: Vec3) -> f32 {
    1.0 - (reflectivity.x + reflectivity.y + reflectivity.z) / 3.0
}

impl Document {
    /// Embed an already encoded image and return the new texture index.
    ///
    /// The image uses the document's image MIME type and sampler 0.
    pub fn create_embedded_texture(&mut self, container: Vec<u8>, name: impl Into<String>) -> usize {
        let byte_length = container.len();
        let buffer = self.create_buffer(container);
        let buffer_view = self.create_buffer_view(BufferView {
            buffer,
            byte_offset: 0,
            byte_length,
            byte_stride: None,
            target: None,
        });

        let source = self.create_image(Image {
            buffer_view: Some(buffer_view),
            mime_type: Some(self.options.image_mime_type.clone()),
            uri: None,
            name: Some(name.into()),
        });

        self.create_texture(Texture { sampler: 0, source })
    }

    /// Convert a legacy material, reusing an existing material of the same
    /// sanitized name.
    pub fn convert_material(&mut self, legacy: &LegacyMaterial, codec: &dyn TextureCodec) -> Result<usize> {
        let name = sanitize_name(&legacy.name);
        if let Some(existing) = self.material_by_name(&name) {
            return Ok(existing);
        }

        // Encode everything first so a codec failure leaves the pools untouched.
        let encode = |texture: &LegacyTexture| -> Result<Vec<u8>> {
            let format = texture.format;
            codec.encode(&texture.image_data, format.pixel_format, format.width, format.height)
        };
        let base = legacy.texture.as_ref().map(&encode).transpose()?;
        let bumpmap = legacy.bumpmap.as_ref().map(&encode).transpose()?;
        let secondary = legacy.texture2.as_ref().map(&encode).transpose()?;

        let roughness = legacy
            .texture
            .as_ref()
            .map_or(0.0, |texture| roughness_from_reflectivity(texture.reflectivity));

        let extension = codec.extension().to_string();
        let mut embed = |container: Option<Vec<u8>>, suffix: &str| {
            container.map(|container| {
                self.create_embedded_texture(container, format!("{name}_{suffix}.{extension}"))
            })
        };
        let base = embed(base, "texture");
        let bumpmap = embed(bumpmap, "normal_texture");
        let secondary = embed(secondary, "normal_texture2");

        let material = Material {
            name: Some(name.clone()),
            double_sided: true,
            alpha_mode: if legacy.translucent {
                AlphaMode::Mask
            } else {
                AlphaMode::Opaque
            },
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_factor: [1.0, 1.0, 1.0, 1.0],
                metallic_factor: 0.0,
                roughness_factor: roughness,
                base_color_texture: base.map(|index| TextureInfo { index, tex_coord: 0 }),
                metallic_roughness_texture: None,
            }),
            occlusion_texture: secondary.map(|index| OcclusionTextureInfo { index, tex_coord: 0 }),
            normal_texture: bumpmap.map(|index| NormalTextureInfo {
                scale: 1.0,
                index,
                tex_coord: 0,
            }),
        };

        let index = self.create_material(material);
        tracing::debug!(index, name = %name, "created material");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::InlineEncoder;
    use crate::error::GltfError;
    use std::cell::Cell;

    fn texture(bytes: &[u8], reflectivity: Vec3) -> LegacyTexture {
        LegacyTexture {
            image_data: bytes.to_vec(),
            format: TextureFormat {
                pixel_format: PixelFormat::Dxt1,
                width: 4,
                height: 4,
            },
            reflectivity,
        }
    }

    struct FailingCodec;

    impl TextureCodec for FailingCodec {
        fn encode(&self, _: &[u8], format: PixelFormat, _: u32, _: u32) -> Result<Vec<u8>> {
            Err(GltfError::codec(format!("unsupported format {:?}", format)))
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("maps/city/brick"), "maps_city_brick");
        assert_eq!(sanitize_name("maps\\wood"), "maps_wood");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[test]
    fn test_untextured_material() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let legacy = LegacyMaterial {
            name: "glass".to_string(),
            translucent: true,
            ..Default::default()
        };

        let index = doc.convert_material(&legacy, &PassthroughCodec).unwrap();
        let material = &doc.materials()[index];
        let pbr = material.pbr_metallic_roughness.as_ref().unwrap();

        assert_eq!(material.alpha_mode, AlphaMode::Mask);
        assert!(material.double_sided);
        assert_eq!(pbr.base_color_factor, [1.0; 4]);
        assert_eq!(pbr.metallic_factor, 0.0);
        assert_eq!(pbr.roughness_factor, 0.0);
        assert!(pbr.base_color_texture.is_none());
        assert!(doc.textures().is_empty());
        assert!(doc.buffers().is_empty());
    }

    #[test]
    fn test_textured_material() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let legacy = LegacyMaterial {
            name: "walls/brick".to_string(),
            texture: Some(texture(&[1, 2, 3, 4], Vec3::new(0.2, 0.4, 0.6))),
            texture2: Some(texture(&[5, 6], Vec3::ZERO)),
            bumpmap: Some(texture(&[7, 8, 9], Vec3::ZERO)),
            translucent: false,
        };

        let index = doc.convert_material(&legacy, &PassthroughCodec).unwrap();
        let material = &doc.materials()[index];
        let pbr = material.pbr_metallic_roughness.as_ref().unwrap();

        assert_eq!(material.name.as_deref(), Some("walls_brick"));
        assert_eq!(material.alpha_mode, AlphaMode::Opaque);
        assert!((pbr.roughness_factor - 0.6).abs() < 1e-6);

        // Textures are created base, bump map, secondary.
        assert_eq!(pbr.base_color_texture.as_ref().unwrap().index, 0);
        assert_eq!(material.normal_texture.as_ref().unwrap().index, 1);
        assert_eq!(material.normal_texture.as_ref().unwrap().scale, 1.0);
        assert_eq!(material.occlusion_texture.as_ref().unwrap().index, 2);

        let names: Vec<_> = doc.images().iter().map(|i| i.name.clone().unwrap()).collect();
        assert_eq!(
            names,
            [
                "walls_brick_texture.dds",
                "walls_brick_normal_texture.dds",
                "walls_brick_normal_texture2.dds"
            ]
        );
        assert!(doc.images().iter().all(|i| i.mime_type.as_deref() == Some("image/png")));
        assert!(doc.textures().iter().all(|t| t.sampler == 0));

        let sizes: Vec<_> = doc.buffers().iter().map(|b| b.byte_length).collect();
        assert_eq!(sizes, [4, 3, 2]);
        assert_eq!(doc.buffer_views()[0].byte_length, 4);
    }

    #[test]
    fn test_duplicate_names_share_one_material() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let first = LegacyMaterial {
            name: "props/crate".to_string(),
            texture: Some(texture(&[1, 2], Vec3::ONE)),
            ..Default::default()
        };
        let second = LegacyMaterial {
            name: "props_crate".to_string(),
            translucent: true,
            ..Default::default()
        };

        let a = doc.convert_material(&first, &PassthroughCodec).unwrap();
        let b = doc.convert_material(&second, &PassthroughCodec).unwrap();

        assert_eq!(a, b);
        assert_eq!(doc.materials().len(), 1);
        assert_eq!(doc.materials()[a].alpha_mode, AlphaMode::Opaque);
        assert_eq!(doc.textures().len(), 1);
    }

    #[test]
    fn test_image_mime_override() {
        let options = crate::options::ExportOptions::new().with_image_mime_type("image/vnd-ms.dds");
        let mut doc = Document::with_options(options).with_encoder(InlineEncoder);
        let legacy = LegacyMaterial {
            name: "sky".to_string(),
            texture: Some(texture(&[0; 8], Vec3::ZERO)),
            ..Default::default()
        };

        doc.convert_material(&legacy, &PassthroughCodec).unwrap();
        assert_eq!(doc.images()[0].mime_type.as_deref(), Some("image/vnd-ms.dds"));
    }

    #[test]
    fn test_codec_failure_propagates() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let legacy = LegacyMaterial {
            name: "broken".to_string(),
            texture: Some(texture(&[0; 8], Vec3::ZERO)),
            ..Default::default()
        };

        let err = doc.convert_material(&legacy, &FailingCodec).unwrap_err();
        assert!(matches!(err, GltfError::Codec(_)));
        assert!(doc.materials().is_empty());
    }

    /// Succeeds until `budget` encodes have been made.
    struct LimitedCodec {
        budget: Cell<usize>,
    }

    impl TextureCodec for LimitedCodec {
        fn encode(&self, pixels: &[u8], _: PixelFormat, _: u32, _: u32) -> Result<Vec<u8>> {
            match self.budget.get() {
                0 => Err(GltfError::codec("out of budget")),
                left => {
                    self.budget.set(left - 1);
                    Ok(pixels.to_vec())
                }
            }
        }
    }

    #[test]
    fn test_late_codec_failure_leaves_pools_untouched() {
        let mut doc = Document::new().with_encoder(InlineEncoder);
        let legacy = LegacyMaterial {
            name: "wall".to_string(),
            texture: Some(texture(&[1, 2, 3], Vec3::ZERO)),
            bumpmap: Some(texture(&[4, 5], Vec3::ZERO)),
            ..Default::default()
        };
        let codec = LimitedCodec { budget: Cell::new(1) };

        let err = doc.convert_material(&legacy, &codec).unwrap_err();
        assert!(matches!(err, GltfError::Codec(_)));
        assert!(doc.materials().is_empty());
        assert!(doc.textures().is_empty());
        assert!(doc.images().is_empty());
        assert!(doc.buffer_views().is_empty());
        assert!(doc.buffers().is_empty());

        // A retry with a working codec embeds each texture once.
        doc.convert_material(&legacy, &PassthroughCodec).unwrap();
        assert_eq!(doc.textures().len(), 2);
        assert_eq!(doc.buffers().len(), 2);
    }
}
