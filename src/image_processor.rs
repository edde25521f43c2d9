use std::{fmt, path::Path};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder};
use log::{debug, warn};

use crate::{constants::MAX_IMAGE_BYTES, error::InputError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    fn from_format(format: ImageFormat) -> Result<Self, InputError> {
        match format {
            ImageFormat::Jpeg => Ok(MediaType::Jpeg),
            ImageFormat::Png => Ok(MediaType::Png),
            ImageFormat::WebP => Ok(MediaType::Webp),
            other => Err(InputError::UnsupportedMediaType(
                other.to_mime_type().to_string(),
            )),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// Validated image bytes ready to be sent for analysis.
///
/// Only [`ImageAcquirer`] and [`ImagePayload::from_frame`] construct one, so
/// holding a payload means the size and type checks already passed.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Bytes,
    media_type: MediaType,
    file_name: String,
}

impl ImagePayload {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the bytes, as the inference service expects inline data.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Encodes a captured camera frame as JPEG with a synthetic file name.
    pub fn from_frame(frame: &RgbImage, quality: u8) -> Result<Self, InputError> {
        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            encoder.encode_image(frame)?;
        }

        let file_name = format!("capture-{:016x}.jpg", rand::random::<u64>());
        debug!(
            "Encoded {}x{} frame as {} ({} bytes)",
            frame.width(),
            frame.height(),
            file_name,
            buffer.len()
        );

        Ok(Self {
            bytes: Bytes::from(buffer),
            media_type: MediaType::Jpeg,
            file_name,
        })
    }
}

/// A displayable `data:` URL of the submitted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview(String);

impl Preview {
    pub fn from_payload(payload: &ImagePayload) -> Self {
        Preview(format!(
            "data:{};base64,{}",
            payload.media_type.as_mime(),
            payload.to_base64()
        ))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }
}

/// Boundary that turns user-selected files into [`ImagePayload`]s.
#[derive(Debug, Clone)]
pub struct ImageAcquirer {
    max_bytes: usize,
}

impl Default for ImageAcquirer {
    fn default() -> Self {
        Self::new(MAX_IMAGE_BYTES)
    }
}

impl ImageAcquirer {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn acquire_path(&self, path: impl AsRef<Path>) -> Result<ImagePayload, InputError> {
        let path = path.as_ref();
        let len = tokio::fs::metadata(path).await?.len();
        if len > self.max_bytes as u64 {
            return Err(InputError::TooLarge {
                size: usize::try_from(len).unwrap_or(usize::MAX),
                limit: self.max_bytes,
            });
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let declared = ImageFormat::from_path(path)
            .ok()
            .map(|format| format.to_mime_type());

        self.acquire_bytes(file_name, declared, bytes)
    }

    /// Validates raw bytes. The type detected from the content wins over the
    /// declared one.
    pub fn acquire_bytes(
        &self,
        file_name: impl Into<String>,
        declared_type: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Result<ImagePayload, InputError> {
        let bytes = bytes.into();
        let file_name = file_name.into();

        if bytes.is_empty() {
            return Err(InputError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(InputError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let format = image::guess_format(&bytes).map_err(|_| InputError::UnrecognizedFormat)?;
        let media_type = MediaType::from_format(format)?;

        if let Some(declared) = declared_type {
            if MediaType::from_mime(declared) != Some(media_type) {
                warn!(
                    "{} declared as {} but content is {}; using {}",
                    file_name, declared, media_type, media_type
                );
            }
        }

        Ok(ImagePayload {
            bytes,
            media_type,
            file_name,
        })
    }
}
