//! Images embedded directly in a vision request as `data:` URLs.

use base64::Engine as _;

/// Formats the vision endpoint accepts inline, recognized by leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', ..] => Some(Self::Png),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// An attachment encoded for the `image_url` part of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    mime_type: String,
    data_url: String,
}

impl InlineImage {
    /// Encodes `bytes`, labelled with `declared_mime` when the host supplied one.
    ///
    /// Otherwise the type is sniffed; unknown payloads are sent as PNG.
    pub fn encode(bytes: &[u8], declared_mime: Option<&str>) -> Self {
        let mime_type = match declared_mime.map(str::trim).filter(|m| !m.is_empty()) {
            Some(declared) => declared.to_string(),
            None => match ImageFormat::sniff(bytes) {
                Some(format) => format.mime_type().to_string(),
                None => {
                    tracing::warn!(
                        "Unrecognized image header {:02X?}, sending as image/png",
                        &bytes[..bytes.len().min(4)]
                    );
                    ImageFormat::Png.mime_type().to_string()
                }
            },
        };

        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );
        Self {
            mime_type,
            data_url,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn into_parts(self) -> (String, String) {
        (self.mime_type, self.data_url)
    }
}
