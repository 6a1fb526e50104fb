/// Message thread: ordered history for one conversation plus composition state
///
/// Messages are append-only. Replies point at their target by id; a target
/// may be missing from a partially loaded thread, so resolution is an Option.
use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Static suggestions offered above the composer
pub const QUICK_REPLIES: [&str; 4] = ["👍", "Thanks!", "Sounds good", "On it!"];

/// Reply previews are cut to this many characters
const REPLY_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
}

/// Delivery status. Variant order is the only allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn next(self) -> Option<Self> {
        match self {
            MessageStatus::Sending => Some(MessageStatus::Sent),
            MessageStatus::Sent => Some(MessageStatus::Delivered),
            MessageStatus::Delivered => Some(MessageStatus::Read),
            MessageStatus::Read => None,
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            other => Err(ChatError::InvalidInput(format!("unknown status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    /// Reacting users in first-reaction order, no duplicates
    pub users: Vec<String>,
}

impl Reaction {
    pub fn count(&self) -> usize {
        self.users.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub direction: Direction,
    pub status: MessageStatus,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl Message {
    pub fn is_sent(&self) -> bool {
        self.direction == Direction::Sent
    }

    pub fn reaction(&self, emoji: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }
}

#[derive(Debug, Clone)]
pub struct MessageThread {
    conversation_id: String,
    local_user: String,
    messages: Vec<Message>,
    index: HashMap<String, usize>,
    draft: String,
    typing: bool,
}

impl MessageThread {
    pub fn new(conversation_id: impl Into<String>, local_user: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            local_user: local_user.into(),
            messages: Vec::new(),
            index: HashMap::new(),
            draft: String::new(),
            typing: false,
        }
    }

    /// Load existing history in order, checking ids and reply targets
    pub fn from_history(
        conversation_id: impl Into<String>,
        local_user: impl Into<String>,
        history: Vec<Message>,
    ) -> Result<Self> {
        let mut thread = Self::new(conversation_id, local_user);
        for msg in history {
            thread.append(msg)?;
        }
        Ok(thread)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.index.get(id).map(|&i| &self.messages[i])
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ChatError::NotFound(format!("message {}", id)))
    }

    // ─── Composition ─────────────────────────────────────────────────────────

    pub fn compose(&mut self, text: &str) {
        self.draft = text.to_string();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Copy quick reply `i` into the draft
    pub fn use_quick_reply(&mut self, i: usize) -> Option<&str> {
        let reply = QUICK_REPLIES.get(i).copied()?;
        self.draft = reply.to_string();
        Some(reply)
    }

    pub fn set_typing(&mut self, active: bool) {
        self.typing = active;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    // ─── Send / reply ────────────────────────────────────────────────────────

    pub fn send(&mut self, text: &str) -> Result<&Message> {
        self.push_outgoing(text, None)
    }

    /// Send whatever is in the draft
    pub fn send_draft(&mut self) -> Result<&Message> {
        let text = self.draft.clone();
        self.push_outgoing(&text, None)
    }

    pub fn reply(&mut self, target_id: &str, text: &str) -> Result<&Message> {
        self.position(target_id)?;
        self.push_outgoing(text, Some(target_id.to_string()))
    }

    fn push_outgoing(&mut self, text: &str, reply_to: Option<String>) -> Result<&Message> {
        let content = text.trim();
        if content.is_empty() {
            warn!("Rejected empty message in {}", self.conversation_id);
            return Err(ChatError::InvalidInput("message text is empty".into()));
        }

        let msg = Message {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            sender_id: self.local_user.clone(),
            direction: Direction::Sent,
            status: MessageStatus::Sending,
            reactions: Vec::new(),
            reply_to,
        };
        info!(
            "Queued message {} in {} (reply_to={:?})",
            msg.id, self.conversation_id, msg.reply_to
        );

        self.draft.clear();
        self.typing = false;
        let at = self.messages.len();
        self.index.insert(msg.id.clone(), at);
        self.messages.push(msg);
        Ok(&self.messages[at])
    }

    /// Record an incoming message. Status is forced to `Delivered`.
    pub fn receive(&mut self, mut msg: Message) -> Result<&Message> {
        msg.direction = Direction::Received;
        msg.status = MessageStatus::Delivered;
        self.append(msg)
    }

    fn append(&mut self, msg: Message) -> Result<&Message> {
        if self.index.contains_key(&msg.id) {
            return Err(ChatError::InvalidInput(format!(
                "duplicate message id {} in {}",
                msg.id, self.conversation_id
            )));
        }
        if let Some(target) = &msg.reply_to {
            if target == &msg.id {
                return Err(ChatError::InvalidInput(format!(
                    "message {} replies to itself",
                    msg.id
                )));
            }
            if !self.index.contains_key(target) {
                return Err(ChatError::NotFound(format!("reply target {}", target)));
            }
        }
        let at = self.messages.len();
        self.index.insert(msg.id.clone(), at);
        self.messages.push(msg);
        Ok(&self.messages[at])
    }

    // ─── Status / reactions ──────────────────────────────────────────────────

    /// Advance a message's status. Returns whether it changed; a repeat of the
    /// current status is accepted as a no-op, a step backwards is rejected.
    pub fn update_status(&mut self, id: &str, status: MessageStatus) -> Result<bool> {
        let i = self.position(id)?;
        let msg = &mut self.messages[i];
        if status < msg.status {
            warn!("Status regression on {}: {:?} -> {:?}", id, msg.status, status);
            return Err(ChatError::InvalidTransition {
                from: msg.status,
                to: status,
            });
        }
        if status == msg.status {
            return Ok(false);
        }
        debug!("Message {} {:?} -> {:?}", id, msg.status, status);
        msg.status = status;
        Ok(true)
    }

    /// Add `user`'s `emoji` to a message. Returns false when already present.
    pub fn react(&mut self, id: &str, emoji: &str, user: &str) -> Result<bool> {
        if emoji.trim().is_empty() {
            return Err(ChatError::InvalidInput("emoji is empty".into()));
        }
        let i = self.position(id)?;
        let msg = &mut self.messages[i];

        match msg.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(r) if r.users.iter().any(|u| u == user) => return Ok(false),
            Some(r) => r.users.push(user.to_string()),
            None => msg.reactions.push(Reaction {
                emoji: emoji.to_string(),
                users: vec![user.to_string()],
            }),
        }
        debug!("{} reacted {} on {}", user, emoji, id);
        Ok(true)
    }

    // ─── Reply references ────────────────────────────────────────────────────

    pub fn reply_target(&self, id: &str) -> Option<&Message> {
        let target = self.get(id)?.reply_to.as_deref()?;
        self.get(target)
    }

    /// "Replying to: ..." line for a message, or None if it is not a reply or
    /// the target is not loaded
    pub fn reply_preview(&self, id: &str) -> Option<String> {
        let target = self.reply_target(id)?;
        let cut: String = target.content.chars().take(REPLY_PREVIEW_CHARS).collect();
        Some(format!("{}...", cut))
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
