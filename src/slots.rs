//! Photo Slot Manager - bounded, ordered photo selection
//!
//! Two distinct overflow policies live here. Toggling a manual selection past
//! capacity is rejected outright. An upload that would push the total past
//! capacity clears the whole selection and keeps only the new uploads.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::descriptor::PhotoRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEntry {
    Photo(PhotoRef),
    Empty,
}

impl SlotEntry {
    pub fn photo(&self) -> Option<&PhotoRef> {
        match self {
            Self::Photo(photo) => Some(photo),
            Self::Empty => None,
        }
    }
}

/// Exactly `capacity` entries, hero first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSlotAssignment {
    slots: Vec<SlotEntry>,
}

impl PhotoSlotAssignment {
    pub fn slots(&self) -> &[SlotEntry] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn hero(&self) -> Option<&PhotoRef> {
        self.slots.first().and_then(SlotEntry::photo)
    }

    pub fn photos(&self) -> impl Iterator<Item = &PhotoRef> {
        self.slots.iter().filter_map(SlotEntry::photo)
    }
}

/// Manual selections in selection order, then uploads in upload order,
/// truncated to `capacity` and padded with empty slots.
pub fn assign_slots(manual: &[PhotoRef], uploads: &[PhotoRef], capacity: usize) -> PhotoSlotAssignment {
    let mut slots: Vec<SlotEntry> = manual
        .iter()
        .chain(uploads)
        .take(capacity)
        .cloned()
        .map(SlotEntry::Photo)
        .collect();
    slots.resize(capacity, SlotEntry::Empty);
    PhotoSlotAssignment { slots }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    /// Selection is full; nothing was evicted.
    Rejected { capacity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Appended { accepted: usize },
    /// The previous selection was cleared and replaced by the new uploads.
    Replaced { cleared: usize, accepted: usize },
}

/// One item from the external "best photos" ranking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSuggestion {
    pub url: String,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f32>,
}

/// Editable selection state for one listing graphic.
#[derive(Debug, Clone)]
pub struct PhotoSelection {
    capacity: usize,
    manual: Vec<PhotoRef>,
    uploads: Vec<PhotoRef>,
}

impl PhotoSelection {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            manual: Vec::new(),
            uploads: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total(&self) -> usize {
        self.manual.len() + self.uploads.len()
    }

    pub fn manual(&self) -> &[PhotoRef] {
        &self.manual
    }

    pub fn uploads(&self) -> &[PhotoRef] {
        &self.uploads
    }

    /// Select or deselect a known photo.
    pub fn toggle(&mut self, photo: PhotoRef) -> ToggleOutcome {
        if let Some(pos) = self.manual.iter().position(|p| *p == photo) {
            self.manual.remove(pos);
            return ToggleOutcome::Deselected;
        }
        if self.total() >= self.capacity {
            return ToggleOutcome::Rejected { capacity: self.capacity };
        }
        self.manual.push(photo);
        ToggleOutcome::Selected
    }

    /// Add freshly uploaded photos.
    pub fn upload(&mut self, photos: Vec<PhotoRef>) -> UploadOutcome {
        if self.total() + photos.len() > self.capacity {
            let cleared = self.total();
            self.manual.clear();
            self.uploads = photos.into_iter().take(self.capacity).collect();
            debug!(cleared, accepted = self.uploads.len(), "upload overflow replaced selection");
            return UploadOutcome::Replaced {
                cleared,
                accepted: self.uploads.len(),
            };
        }
        let accepted = photos.len();
        self.uploads.extend(photos);
        UploadOutcome::Appended { accepted }
    }

    /// Replace the selection with ranked suggestions matched back to `local`.
    /// Returns the number of slots filled. When nothing matches the current
    /// selection is left alone.
    pub fn auto_select(&mut self, suggestions: &[PhotoSuggestion], local: &[PhotoRef]) -> usize {
        let matched = match_suggestions(suggestions, local, self.capacity);
        if matched.is_empty() {
            return 0;
        }
        self.uploads.clear();
        self.manual = matched;
        self.manual.len()
    }

    pub fn clear(&mut self) {
        self.manual.clear();
        self.uploads.clear();
    }

    pub fn assignment(&self) -> PhotoSlotAssignment {
        assign_slots(&self.manual, &self.uploads, self.capacity)
    }
}

/// Map ranked suggestions onto locally known photos, in rank order, without
/// duplicates, up to `limit`. Suggestions with no local counterpart are dropped.
pub fn match_suggestions(suggestions: &[PhotoSuggestion], local: &[PhotoRef], limit: usize) -> Vec<PhotoRef> {
    let mut matched: Vec<PhotoRef> = Vec::new();
    for suggestion in suggestions {
        if matched.len() >= limit {
            break;
        }
        let Some(key) = photo_identity_key(&suggestion.url) else {
            continue;
        };
        let found = local
            .iter()
            .find(|photo| !matched.contains(photo) && local_matches(photo, &key));
        match found {
            Some(photo) => matched.push(photo.clone()),
            None => debug!(url = %suggestion.url, key = %key, "suggestion has no local match"),
        }
    }
    matched
}

fn local_matches(photo: &PhotoRef, key: &str) -> bool {
    let Some(url) = photo.remote_url() else {
        return false;
    };
    photo_identity_key(url).as_deref() == Some(key) || url.contains(key)
}

/// Content-derived identity of a listing photo URL: the file stem of the last
/// path segment (`.../IMG-ABC123_4.jpg?w=800` -> `IMG-ABC123_4`). Proxy
/// wrappers are unwrapped first, so remote and proxied forms agree.
pub fn photo_identity_key(raw: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = if raw.starts_with('/') {
        base.join(raw).ok()?
    } else {
        Url::parse(raw).ok()?
    };
    if let Some((_, inner)) = url.query_pairs().find(|(key, _)| key == "url") {
        return photo_identity_key(&inner);
    }
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };
    (!stem.is_empty()).then(|| stem.to_string())
}
