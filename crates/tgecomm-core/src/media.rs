//! Human readable descriptions of message attachments

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of attachment carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Document,
    Video,
    Audio,
    Voice,
    Sticker,
    Contact,
    Location,
    Venue,
    Game,
    Poll,
    WebPage,
    /// Attachment type the session does not know a display name for
    Other(String),
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Photo => "Photo",
            MediaKind::Document => "Document",
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
            MediaKind::Voice => "Voice",
            MediaKind::Sticker => "Sticker",
            MediaKind::Contact => "Contact",
            MediaKind::Location => "Location",
            MediaKind::Venue => "Venue",
            MediaKind::Game => "Game",
            MediaKind::Poll => "Poll",
            MediaKind::WebPage => "WebPage",
            MediaKind::Other(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

/// Attachment metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    /// Size of the attached document in bytes, when known
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

impl Media {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            size_bytes: None,
            mime_type: None,
        }
    }

    pub fn document(size_bytes: u64, mime_type: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Document,
            size_bytes: Some(size_bytes),
            mime_type: Some(mime_type.into()),
        }
    }
}

/// Render an attachment as `[Media: Kind] Size: x.xx MB Type: mime`
pub fn format_media_info(media: &Media) -> String {
    let mut parts = vec![format!("[Media: {}]", media.kind)];

    if let Some(size) = media.size_bytes {
        parts.push(format!("Size: {:.2} MB", size as f64 / (1024.0 * 1024.0)));
    }
    if let Some(mime) = &media.mime_type {
        parts.push(format!("Type: {}", mime));
    }

    parts.join(" ")
}
