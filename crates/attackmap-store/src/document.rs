//! JSON document fallback backend.
//!
//! Used when the indexed backend cannot be initialised. The whole cache is
//! one serialized document stored at a single path:
//!
//! | Field | Type | Description |
//! |-------|------|-------------|
//! | `events` | Array | Every cached [`Event`], in arrival order |
//! | `last_cleanup` | Integer or null | Epoch ms of the last retention pass |
//! | `version` | Integer | Document layout version |
//!
//! The document is held in memory and rewritten in full after every
//! mutation. Every query is a scan.

use std::path::{Path, PathBuf};

use attackmap_types::Event;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Current document layout version.
pub const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the fallback cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    /// Cached events in arrival order.
    #[serde(default)]
    pub events: Vec<Event>,
    /// When retention cleanup last ran.
    #[serde(default)]
    pub last_cleanup: Option<i64>,
    /// Layout version.
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for EventDocument {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            last_cleanup: None,
            version: DOCUMENT_VERSION,
        }
    }
}

const fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// Handle to the document file and its in-memory copy.
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    doc: Mutex<EventDocument>,
}

impl DocumentStore {
    /// Open the document at `path`.
    ///
    /// A missing file starts an empty cache. A corrupt file is logged and
    /// replaced on the next write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the parent directory cannot be created
    /// or the file exists but cannot be read.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut doc = match tokio::fs::read_to_string(path).await {
            Ok(contents) => match serde_json::from_str::<EventDocument>(&contents) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Event document is corrupt, starting empty"
                    );
                    EventDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EventDocument::default(),
            Err(e) => return Err(e.into()),
        };

        let before = doc.events.len();
        doc.events.retain(|e| e.validate().is_ok());
        let invalid = before.saturating_sub(doc.events.len());
        if invalid > 0 {
            tracing::warn!(path = %path.display(), invalid, "Dropped invalid events from document");
        }

        tracing::info!(
            path = %path.display(),
            events = doc.events.len(),
            "Opened event document"
        );

        Ok(Self {
            path: path.to_owned(),
            doc: Mutex::new(doc),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and rewrite the document.
    ///
    /// The in-memory copy is rolled back if the write fails.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the write fails.
    pub async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().await;
        doc.events.push(event.clone());
        if let Err(e) = self.write(&doc).await {
            doc.events.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Events matching `pred`, in arrival order.
    pub async fn filter<F>(&self, pred: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let doc = self.doc.lock().await;
        doc.events.iter().filter(|e| pred(e)).cloned().collect()
    }

    /// Number of cached events.
    pub async fn count(&self) -> u64 {
        let doc = self.doc.lock().await;
        u64::try_from(doc.events.len()).unwrap_or(u64::MAX)
    }

    /// When retention cleanup last ran.
    pub async fn last_cleanup(&self) -> Option<i64> {
        self.doc.lock().await.last_cleanup
    }

    /// Drop events with `timestamp <= cutoff_ms`, then trim the oldest
    /// until at most `max_count` remain, and rewrite the document.
    ///
    /// Returns `(expired, evicted, remaining)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the rewrite fails. The in-memory copy
    /// keeps the cleaned state either way.
    pub async fn retain(
        &self,
        cutoff_ms: i64,
        max_count: usize,
        now_ms: i64,
    ) -> Result<(u64, u64, u64), StoreError> {
        let mut doc = self.doc.lock().await;

        let before = doc.events.len();
        doc.events.retain(|e| e.timestamp > cutoff_ms);
        let expired = before.saturating_sub(doc.events.len());

        let excess = doc.events.len().saturating_sub(max_count);
        if excess > 0 {
            doc.events.sort_by_key(|e| e.timestamp);
            doc.events.drain(..excess);
        }

        doc.last_cleanup = Some(now_ms);
        let remaining = doc.events.len();
        self.write(&doc).await?;

        Ok((as_u64(expired), as_u64(excess), as_u64(remaining)))
    }

    /// Drop every event and rewrite the document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the rewrite fails; the in-memory copy is
    /// left untouched in that case.
    pub async fn clear(&self) -> Result<u64, StoreError> {
        let mut doc = self.doc.lock().await;
        let emptied = EventDocument {
            events: Vec::new(),
            last_cleanup: doc.last_cleanup,
            version: DOCUMENT_VERSION,
        };
        self.write(&emptied).await?;
        let removed = doc.events.len();
        *doc = emptied;
        Ok(as_u64(removed))
    }

    /// Serialize `doc` to a sibling temp file and rename it into place.
    async fn write(&self, doc: &EventDocument) -> Result<(), StoreError> {
        let json = serde_json::to_vec(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
