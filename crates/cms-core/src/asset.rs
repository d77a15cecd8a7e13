//! Media assets

use cms_git::RepositoryFile;
use serde::{Deserialize, Serialize};

/// Broad media category of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

/// Subtypes of `application/*` treated as documents
const DOCUMENT_SUBTYPES: [&str; 10] = [
    "pdf",
    "msword",
    "rtf",
    "vnd.ms-excel",
    "vnd.ms-powerpoint",
    "vnd.oasis.opendocument.text",
    "vnd.oasis.opendocument.spreadsheet",
    "vnd.oasis.opendocument.presentation",
    "vnd.openxmlformats-officedocument.wordprocessingml.document",
    "vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

impl AssetKind {
    /// Kind guessed from the file extension of `path`
    pub fn from_path(path: &str) -> Self {
        let Some(mime) = mime_guess::from_path(path).first() else {
            return Self::Other;
        };
        match mime.type_().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Document,
            "application"
                if DOCUMENT_SUBTYPES.contains(&mime.subtype().as_str())
                    || mime.subtype().as_str().starts_with("vnd.openxmlformats-officedocument") =>
            {
                Self::Document
            }
            _ => Self::Other,
        }
    }
}

/// A managed non-entry file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub path: String,
    pub name: String,
    pub sha: String,
    pub size: u64,
    pub kind: AssetKind,
    /// Collection whose media folder holds the asset, if not the global one
    pub collection: Option<String>,
}

impl Asset {
    pub fn from_file(file: &RepositoryFile, collection: Option<String>) -> Self {
        Self {
            path: file.path.clone(),
            name: file.name.clone(),
            sha: file.sha.clone(),
            size: file.size.unwrap_or_default(),
            kind: AssetKind::from_path(&file.path),
            collection,
        }
    }
}
