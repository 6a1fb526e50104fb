/// Initial snapshot supplied by the sync side: conversations, thread history,
/// media and linked devices. Loaded from a versioned JSON file or built in.
use crate::conversation_store::{Conversation, ConversationDirectory, ConversationKind};
use crate::error::{ChatError, Result};
use crate::media_catalog::{MediaCatalog, MediaFile, MediaKind};
use crate::message_thread::{Direction, Message, MessageStatus, MessageThread, Reaction};
use crate::settings::{Device, DeviceRegistry};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::info;

const SEED_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSnapshot {
    pub version: u8,
    pub conversations: Vec<Conversation>,
    /// Thread history keyed by conversation id
    #[serde(default)]
    pub threads: BTreeMap<String, Vec<Message>>,
    #[serde(default)]
    pub media: Vec<MediaFile>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Validated stores built from a snapshot
pub struct SeededStores {
    pub directory: ConversationDirectory,
    pub threads: HashMap<String, MessageThread>,
    pub catalog: MediaCatalog,
    pub devices: DeviceRegistry,
}

impl SeedSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let snapshot: SeedSnapshot = serde_json::from_str(&raw)?;
        if snapshot.version != SEED_VERSION {
            return Err(ChatError::Config(format!(
                "Unsupported seed file version: {}",
                snapshot.version
            )));
        }
        info!(
            "Loaded seed {:?}: {} conversations, {} media",
            path,
            snapshot.conversations.len(),
            snapshot.media.len()
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check every invariant and split into per-component stores
    pub fn into_stores(self, local_user: &str) -> Result<SeededStores> {
        let directory = ConversationDirectory::from_feed(self.conversations)?;

        let mut threads = HashMap::new();
        for (conversation_id, history) in self.threads {
            if directory.get(&conversation_id).is_none() {
                return Err(ChatError::InvalidInput(format!(
                    "thread for unknown conversation {}",
                    conversation_id
                )));
            }
            let thread = MessageThread::from_history(conversation_id.clone(), local_user, history)?;
            threads.insert(conversation_id, thread);
        }

        Ok(SeededStores {
            directory,
            threads,
            catalog: MediaCatalog::from_files(self.media)?,
            devices: DeviceRegistry::new(self.devices),
        })
    }

    /// The stock demo data set
    pub fn builtin() -> Self {
        Self::builtin_at(Utc::now())
    }

    pub fn builtin_at(now: DateTime<Utc>) -> Self {
        let conversations = vec![
            conversation("1", "Sarah Chen", "The project files are ready for review 🎉", now - Duration::minutes(2), 2, "SC", true, true, None),
            conversation("2", "Design Team", "Alex: New mockups uploaded to Figma", now - Duration::minutes(15), 0, "DT", false, false, Some(5)),
            conversation("3", "Mom", "Don't forget dinner this Sunday!", now - Duration::hours(1), 1, "M", true, true, None),
            conversation("4", "Product Updates", "Weekly sprint summary is available", now - Duration::hours(3), 0, "PU", false, false, Some(12)),
            conversation("5", "Jake Miller", "Thanks for the help with the code review!", now - Duration::days(1), 0, "JM", false, false, None),
        ];

        let base = now - Duration::minutes(17);
        let sarah_thread = vec![
            message("1", "Hey! How's the project coming along?", base, "sarah", Direction::Received, MessageStatus::Delivered, None),
            Message {
                reactions: vec![Reaction {
                    emoji: "👍".to_string(),
                    users: vec!["sarah".to_string()],
                }],
                ..message("2", "Going really well! Just finished the design system implementation 🎨", base + Duration::minutes(2), "me", Direction::Sent, MessageStatus::Read, None)
            },
            message("3", "That's awesome! Can't wait to see it", base + Duration::minutes(3), "sarah", Direction::Received, MessageStatus::Delivered, Some("2")),
            message("4", "The project files are ready for review 🎉", base + Duration::minutes(15), "sarah", Direction::Received, MessageStatus::Delivered, None),
        ];
        let mut threads = BTreeMap::new();
        threads.insert("1".to_string(), sarah_thread);

        let media = vec![
            media("1", "design-mockups.pdf", MediaKind::Document, 2_516_582, 15, "Sarah Chen", "1"),
            media("2", "team-photo.jpg", MediaKind::Image, 1_887_437, 14, "Design Team", "2"),
            media("3", "project-demo.mp4", MediaKind::Video, 13_107_200, 13, "Jake Miller", "5"),
            media("4", "meeting-notes.docx", MediaKind::Document, 159_744, 12, "Product Updates", "4"),
            media("5", "vacation-pics.jpg", MediaKind::Image, 3_355_443, 10, "Mom", "3"),
            media("6", "code-review.zip", MediaKind::Document, 4_928_307, 9, "Sarah Chen", "1"),
        ];

        let devices = vec![
            device("1", "iPhone 15 Pro", "iOS", "Active now", true, true),
            device("2", "MacBook Pro", "Desktop", "2 hours ago", false, true),
            device("3", "Chrome Browser", "Web", "1 week ago", false, false),
        ];

        Self {
            version: SEED_VERSION,
            conversations,
            threads,
            media,
            devices,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn conversation(
    id: &str,
    name: &str,
    preview: &str,
    at: DateTime<Utc>,
    unread: u32,
    avatar: &str,
    online: bool,
    pinned: bool,
    members: Option<u32>,
) -> Conversation {
    Conversation {
        id: id.to_string(),
        name: name.to_string(),
        last_message_preview: preview.to_string(),
        last_timestamp: at,
        unread_count: unread,
        avatar_label: avatar.to_string(),
        is_online: online,
        is_encrypted: true,
        is_pinned: pinned,
        kind: if members.is_some() {
            ConversationKind::Group
        } else {
            ConversationKind::Direct
        },
        member_count: members,
    }
}

fn message(
    id: &str,
    content: &str,
    at: DateTime<Utc>,
    sender: &str,
    direction: Direction,
    status: MessageStatus,
    reply_to: Option<&str>,
) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        timestamp: at,
        sender_id: sender.to_string(),
        direction,
        status,
        reactions: Vec::new(),
        reply_to: reply_to.map(str::to_string),
    }
}

fn media(
    id: &str,
    name: &str,
    kind: MediaKind,
    size_bytes: u64,
    day: u32,
    sender: &str,
    conversation_id: &str,
) -> MediaFile {
    MediaFile {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        size_bytes,
        created_at: Utc
            .with_ymd_and_hms(2024, 1, day, 9, 0, 0)
            .single()
            .unwrap_or_default(),
        sender_name: sender.to_string(),
        source_conversation_id: conversation_id.to_string(),
    }
}

fn device(id: &str, name: &str, platform: &str, last_active: &str, current: bool, verified: bool) -> Device {
    Device {
        id: id.to_string(),
        name: name.to_string(),
        platform: platform.to_string(),
        last_active: last_active.to_string(),
        is_current: current,
        verified,
    }
}
