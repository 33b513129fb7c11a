use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Paste;

/// Form fields of a paste submission.
#[derive(Debug, Deserialize)]
pub struct PasteForm {
    #[serde(default)]
    pub paste: String,
    pub title: Option<String>,
    pub syntax: Option<String>,
}

#[derive(Serialize)]
pub struct UploadPaste {
    pub id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct PasteInfo {
    pub id: String,
    pub title: Option<String>,
    pub syntax: Option<String>,
    pub owner: String,
    pub time: DateTime<Utc>,
    pub size: usize,
}

impl From<&Paste> for PasteInfo {
    fn from(paste: &Paste) -> Self {
        PasteInfo {
            id: paste.id.to_string(),
            title: paste.title.clone(),
            syntax: paste.syntax.clone(),
            owner: paste.owner.clone(),
            time: paste.time,
            size: paste.data.len(),
        }
    }
}
