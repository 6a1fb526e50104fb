/// Media catalog: files shared across all conversations
use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub sender_name: String,
    /// Conversation the file was shared in (reference only)
    pub source_conversation_id: String,
}

impl MediaFile {
    /// Human-readable size, e.g. "156 KB" or "2.4 MB"
    pub fn size_display(&self) -> String {
        format_size(self.size_bytes)
    }

    fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.sender_name.to_lowercase().contains(needle)
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{} B", b),
        // Switch units where rounding would print 1024 of the smaller one
        b if b < MB - KB / 2 => format!("{} KB", (b as f64 / KB as f64).round() as u64),
        b if b < GB - MB / 20 => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFilter {
    #[default]
    All,
    Images,
    Videos,
    Documents,
}

impl MediaFilter {
    pub fn accepts(self, kind: MediaKind) -> bool {
        match self {
            MediaFilter::All => true,
            MediaFilter::Images => kind == MediaKind::Image,
            MediaFilter::Videos => kind == MediaKind::Video,
            MediaFilter::Documents => kind == MediaKind::Document,
        }
    }
}

impl std::str::FromStr for MediaFilter {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "images" | "image" => Ok(Self::Images),
            "videos" | "video" => Ok(Self::Videos),
            "documents" | "document" | "docs" => Ok(Self::Documents),
            other => Err(ChatError::InvalidInput(format!("unknown media filter: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest first
    #[default]
    Date,
    /// A to Z, case-insensitive
    Name,
    /// Largest first
    Size,
}

impl SortKey {
    /// Total order; ties fall back to id so output is deterministic
    fn compare(self, a: &MediaFile, b: &MediaFile) -> Ordering {
        let primary = match self {
            SortKey::Date => b.created_at.cmp(&a.created_at),
            SortKey::Name => name_key(&a.name)
                .cmp(&name_key(&b.name))
                .then_with(|| a.name.cmp(&b.name)),
            SortKey::Size => b.size_bytes.cmp(&a.size_bytes),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl std::str::FromStr for SortKey {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "date" => Ok(Self::Date),
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            other => Err(ChatError::InvalidInput(format!("unknown sort key: {}", other))),
        }
    }
}

/// Per-kind totals shown on the media header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCounts {
    pub images: usize,
    pub videos: usize,
    pub documents: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MediaCatalog {
    files: HashMap<String, MediaFile>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: Vec<MediaFile>) -> Result<Self> {
        let mut catalog = Self::new();
        for f in files {
            catalog.insert(f)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, file: MediaFile) -> Result<()> {
        if self.files.contains_key(&file.id) {
            return Err(ChatError::InvalidInput(format!("duplicate media id: {}", file.id)));
        }
        self.files.insert(file.id.clone(), file);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&MediaFile> {
        self.files.get(id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn list(&self, search: &str, filter: MediaFilter, sort: SortKey) -> Vec<&MediaFile> {
        let needle = search.to_lowercase();
        let mut out: Vec<&MediaFile> = self
            .files
            .values()
            .filter(|f| f.matches(&needle) && filter.accepts(f.kind))
            .collect();
        out.sort_by(|a, b| sort.compare(a, b));
        debug!(
            "Media list q={:?} filter={:?} sort={:?}: {} files",
            search,
            filter,
            sort,
            out.len()
        );
        out
    }

    /// Delete a file record; absent ids are ignored
    pub fn remove(&mut self, id: &str) -> Option<MediaFile> {
        let removed = self.files.remove(id);
        if let Some(f) = &removed {
            info!("Removed media {} ({})", f.id, f.name);
        }
        removed
    }

    pub fn counts(&self) -> MediaCounts {
        let mut c = MediaCounts::default();
        for f in self.files.values() {
            match f.kind {
                MediaKind::Image => c.images += 1,
                MediaKind::Video => c.videos += 1,
                MediaKind::Document => c.documents += 1,
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(id: &str, name: &str, kind: MediaKind, size: u64, day: u32, sender: &str) -> MediaFile {
        MediaFile {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            size_bytes: size,
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            sender_name: sender.to_string(),
            source_conversation_id: "1".to_string(),
        }
    }

    fn catalog() -> MediaCatalog {
        MediaCatalog::from_files(vec![
            file("1", "design-mockups.pdf", MediaKind::Document, 2_400_000, 15, "Sarah Chen"),
            file("2", "team-photo.jpg", MediaKind::Image, 1_800_000, 14, "Design Team"),
            file("3", "project-demo.mp4", MediaKind::Video, 12_500_000, 13, "Jake Miller"),
            file("4", "Meeting-notes.docx", MediaKind::Document, 156_000, 12, "Product Updates"),
            file("5", "vacation-pics.jpg", MediaKind::Image, 3_200_000, 10, "Mom"),
            file("6", "code-review.zip", MediaKind::Document, 2_400_000, 15, "Sarah Chen"),
        ])
        .unwrap()
    }

    fn ids(list: &[&MediaFile]) -> Vec<String> {
        list.iter().map(|f| f.id.clone()).collect()
    }

    #[test]
    fn test_sort_by_date_newest_first_with_id_tiebreak() {
        let c = catalog();
        let out = c.list("", MediaFilter::All, SortKey::Date);
        assert_eq!(ids(&out), vec!["1", "6", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_sort_by_size_non_increasing() {
        let c = catalog();
        let out = c.list("", MediaFilter::All, SortKey::Size);
        assert!(out.windows(2).all(|w| w[0].size_bytes >= w[1].size_bytes));
        // equal sizes ordered by id
        assert_eq!(ids(&out), vec!["3", "5", "1", "6", "2", "4"]);
    }

    #[test]
    fn test_sort_by_name_non_decreasing() {
        let c = catalog();
        let out = c.list("", MediaFilter::All, SortKey::Name);
        assert!(out
            .windows(2)
            .all(|w| name_key(&w[0].name) <= name_key(&w[1].name)));
        assert_eq!(out[0].name, "code-review.zip");
        assert_eq!(out[2].name, "Meeting-notes.docx");
    }

    #[test]
    fn test_filter_and_search() {
        let c = catalog();
        assert_eq!(ids(&c.list("", MediaFilter::Images, SortKey::Date)), vec!["2", "5"]);
        assert_eq!(ids(&c.list("", MediaFilter::Videos, SortKey::Date)), vec!["3"]);
        assert_eq!(c.list("", MediaFilter::Documents, SortKey::Date).len(), 3);
        // sender match
        assert_eq!(ids(&c.list("sarah", MediaFilter::All, SortKey::Date)), vec!["1", "6"]);
        // name match, case-insensitive
        assert_eq!(ids(&c.list("PHOTO", MediaFilter::All, SortKey::Date)), vec!["2"]);
        assert!(c.list("sarah", MediaFilter::Videos, SortKey::Date).is_empty());
    }

    #[test]
    fn test_remove_and_counts() {
        let mut c = catalog();
        assert_eq!(
            c.counts(),
            MediaCounts {
                images: 2,
                videos: 1,
                documents: 3
            }
        );
        assert!(c.remove("3").is_some());
        assert!(c.remove("3").is_none());
        assert_eq!(c.len(), 5);
        assert_eq!(c.counts().videos, 0);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(156 * 1024), "156 KB");
        assert_eq!(format_size(2_516_582), "2.4 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_size(1024 * 1024 - 512 - 1), "1023 KB");
        assert_eq!(format_size(1024 * 1024 - 512), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024 - 1024), "1.0 GB");
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("size".parse::<SortKey>().unwrap(), SortKey::Size);
        assert_eq!("Videos".parse::<MediaFilter>().unwrap(), MediaFilter::Videos);
        assert!("color".parse::<SortKey>().is_err());
    }
}
