//! The cross-stage "current selection" record.
//!
//! Kept as JSON for the lifetime of one session, overwritten by each new
//! selection, and explicitly clearable. Every write bumps a version so
//! consumers can tell a stale read from a fresh one.

use serde::{Deserialize, Serialize};

use crate::search::ImageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    /// Picked from image search.
    Image,
    /// Uploaded from disk.
    Upload,
    /// Drawn in the sketch canvas.
    Drawing,
}

/// What the user chose as the silhouette source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub kind: SelectionKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Selection {
    pub fn upload(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Upload,
            url: url.into(),
            description: Some(file_name.into()),
            author: Some("Uploaded".into()),
        }
    }

    pub fn drawing(url: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Drawing,
            url: url.into(),
            description: None,
            author: None,
        }
    }

    pub fn from_record(record: &ImageRecord) -> Self {
        Self {
            kind: SelectionKind::Image,
            url: record.url.clone(),
            description: record.description.clone(),
            author: Some(record.author.clone()),
        }
    }

    /// Human-readable caption for the source panel.
    pub fn caption(&self) -> String {
        match self.kind {
            SelectionKind::Drawing => "Your drawing".into(),
            SelectionKind::Upload => self
                .description
                .clone()
                .unwrap_or_else(|| "Uploaded image".into()),
            SelectionKind::Image => self
                .description
                .clone()
                .unwrap_or_else(|| "Selected image".into()),
        }
    }
}

/// Session-scoped storage for the current [`Selection`].
#[derive(Debug, Default)]
pub struct SelectionStore {
    stored: Option<String>,
    version: u64,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, selection: &Selection) {
        match serde_json::to_string(selection) {
            Ok(json) => {
                self.stored = Some(json);
                self.version += 1;
            }
            Err(e) => log::warn!("selection not stored: {}", e),
        }
    }

    /// The stored selection; unreadable data loads as `None`.
    pub fn load(&self) -> Option<Selection> {
        let json = self.stored.as_deref()?;
        match serde_json::from_str(json) {
            Ok(selection) => Some(selection),
            Err(e) => {
                log::debug!("discarding unreadable selection: {}", e);
                None
            }
        }
    }

    pub fn clear(&mut self) {
        if self.stored.take().is_some() {
            self.version += 1;
        }
    }

    /// Incremented on every save and on every clear that removed something.
    pub fn version(&self) -> u64 {
        self.version
    }

    #[cfg(test)]
    fn store_raw(&mut self, raw: &str) {
        self.stored = Some(raw.to_string());
    }
}
