/// Conversation directory: the inbox list and its search/filter view
///
/// Order is feed order as supplied by the sync side; the directory never
/// reorders it. Lookups go through an id -> position index.
use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    Direct,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub last_message_preview: String,
    pub last_timestamp: DateTime<Utc>,
    pub unread_count: u32,
    /// Initials shown in place of a picture ("SC")
    pub avatar_label: String,
    pub is_online: bool,
    /// Display flag only
    pub is_encrypted: bool,
    pub is_pinned: bool,
    pub kind: ConversationKind,
    /// Present iff `kind == Group`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
}

impl Conversation {
    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ChatError::InvalidInput("conversation id is empty".into()));
        }
        match (self.kind, self.member_count) {
            (ConversationKind::Group, None) => Err(ChatError::InvalidInput(format!(
                "group conversation {} has no member count",
                self.id
            ))),
            (ConversationKind::Direct, Some(_)) => Err(ChatError::InvalidInput(format!(
                "direct conversation {} has a member count",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.last_message_preview.to_lowercase().contains(needle)
    }
}

/// Inbox filter chips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationFilter {
    #[default]
    All,
    Unread,
    Pinned,
    Groups,
}

impl ConversationFilter {
    pub fn accepts(self, c: &Conversation) -> bool {
        match self {
            ConversationFilter::All => true,
            ConversationFilter::Unread => c.unread_count > 0,
            ConversationFilter::Pinned => c.is_pinned,
            ConversationFilter::Groups => c.is_group(),
        }
    }
}

impl std::str::FromStr for ConversationFilter {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "unread" => Ok(Self::Unread),
            "pinned" => Ok(Self::Pinned),
            "groups" | "group" => Ok(Self::Groups),
            other => Err(ChatError::InvalidInput(format!(
                "unknown conversation filter: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationDirectory {
    conversations: Vec<Conversation>,
    index: HashMap<String, usize>,
}

impl ConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a feed snapshot, rejecting duplicate ids and malformed records
    pub fn from_feed(feed: Vec<Conversation>) -> Result<Self> {
        let mut dir = Self::new();
        for c in feed {
            dir.insert(c)?;
        }
        Ok(dir)
    }

    /// Append a conversation at the end of the feed
    pub fn insert(&mut self, c: Conversation) -> Result<()> {
        c.validate()?;
        if self.index.contains_key(&c.id) {
            return Err(ChatError::InvalidInput(format!(
                "duplicate conversation id: {}",
                c.id
            )));
        }
        self.index.insert(c.id.clone(), self.conversations.len());
        self.conversations.push(c);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.index.get(id).map(|&i| &self.conversations[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.conversations[i]),
            None => {
                warn!("Conversation {} not in directory, ignoring", id);
                None
            }
        }
    }

    pub fn all(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Stable search + filter view in feed order
    pub fn list(&self, search: &str, filter: ConversationFilter) -> Vec<&Conversation> {
        let needle = search.to_lowercase();
        let out: Vec<&Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.matches(&needle) && filter.accepts(c))
            .collect();
        debug!(
            "Directory list q={:?} filter={:?}: {}/{}",
            search,
            filter,
            out.len(),
            self.conversations.len()
        );
        out
    }

    pub fn mark_read(&mut self, id: &str) {
        if let Some(c) = self.get_mut(id) {
            if c.unread_count > 0 {
                debug!("Marking {} read ({} unread)", id, c.unread_count);
            }
            c.unread_count = 0;
        }
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) {
        if let Some(c) = self.get_mut(id) {
            c.is_pinned = pinned;
            info!("Conversation {} pinned={}", id, pinned);
        }
    }

    pub fn set_online(&mut self, id: &str, online: bool) {
        if let Some(c) = self.get_mut(id) {
            c.is_online = online;
        }
    }

    /// Bump the unread badge for an incoming message
    pub fn increment_unread(&mut self, id: &str) {
        if let Some(c) = self.get_mut(id) {
            c.unread_count = c.unread_count.saturating_add(1);
        }
    }

    /// Refresh the preview line after a message lands; position is unchanged
    pub fn record_activity(&mut self, id: &str, preview: &str, at: DateTime<Utc>) {
        if let Some(c) = self.get_mut(id) {
            c.last_message_preview = preview.to_string();
            c.last_timestamp = at;
        }
    }
}

/// Compact inbox timestamp: "now", "2m", "1h", "1d", "3w"
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds().max(0);
    match secs {
        s if s < 60 => "now".to_string(),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s if s < 7 * 86_400 => format!("{}d", s / 86_400),
        s => format!("{}w", s / (7 * 86_400)),
    }
}
