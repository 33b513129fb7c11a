use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::store::PasteId;

/// A paste as submitted, before it has an id or a timestamp.
#[derive(Debug, Clone, Default)]
pub struct NewPaste {
    pub data: Bytes,
    pub title: Option<String>,
    pub syntax: Option<String>,
}

impl NewPaste {
    pub fn new(data: impl Into<Bytes>) -> Self {
        NewPaste {
            data: data.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
impl NewPaste {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }
}

/// A paste as reconstructed from its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paste {
    pub id: PasteId,
    pub data: Bytes,
    pub title: Option<String>,
    pub syntax: Option<String>,
    pub owner: String,
    pub time: DateTime<Utc>,
}
