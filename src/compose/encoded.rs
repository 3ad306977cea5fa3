use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Cursor;

use crate::error::CompositeError;

/// A self-contained encoded image (PNG unless the host says otherwise).
///
/// This is the only image form that crosses a context boundary. Serialized as
/// a `data:image/png;base64,...` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.0))
    }

    /// Parses a base64 data URL. A bare base64 payload is accepted too.
    pub fn from_data_url(url: &str) -> Result<Self, CompositeError> {
        let payload = match url.strip_prefix("data:") {
            Some(rest) => match rest.split_once(";base64,") {
                Some((_mime, payload)) => payload,
                None => {
                    return Err(CompositeError::InvalidDataUrl(
                        "data URL is not base64-encoded".to_string(),
                    ));
                }
            },
            None => url,
        };
        STANDARD
            .decode(payload.trim())
            .map(Self)
            .map_err(|e| CompositeError::InvalidDataUrl(e.to_string()))
    }

    /// Decodes to RGBA pixels.
    pub fn decode(&self) -> Result<RgbaImage, CompositeError> {
        decode_rgba(&self.0).map_err(CompositeError::Decode)
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedImage({} bytes)", self.0.len())
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        Self::from_data_url(&url).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encodes pixels as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<EncodedImage, CompositeError> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(CompositeError::Encode)?;
    Ok(EncodedImage(bytes.into_inner()))
}
