/// Shared types for the client facade and the messenger API
use crate::conversation_store::Conversation;
use crate::message_thread::{Message, MessageStatus};
use crate::onboarding::OnboardingStep;
use serde::{Deserialize, Serialize};

/// Transient confirmation shown by the renderer ("Message sent")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub duration_ms: u64,
}

impl Toast {
    pub fn message_sent() -> Self {
        Self {
            title: "Message sent".to_string(),
            description: "End-to-end encrypted".to_string(),
            duration_ms: 2000,
        }
    }

    pub fn reaction_added(emoji: &str) -> Self {
        Self {
            title: "Reaction added".to_string(),
            description: format!("{} sent", emoji),
            duration_ms: 1500,
        }
    }
}

/// Real-time events streamed over SSE (/events endpoint)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was sent locally or received
    MessageAdded {
        conversation_id: String,
        message: Message,
    },
    /// Delivery acknowledgment advanced a message
    StatusChanged {
        conversation_id: String,
        message_id: String,
        status: MessageStatus,
    },
    ReactionAdded {
        conversation_id: String,
        message_id: String,
        emoji: String,
        user_id: String,
    },
    PresenceChanged {
        conversation_id: String,
        online: bool,
    },
    ConversationRead {
        conversation_id: String,
    },
    Typing {
        conversation_id: String,
        active: bool,
    },
    OnboardingCompleted,
    Toast {
        toast: Toast,
    },
}

/// Everything the renderer needs to draw one thread
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub typing: bool,
    pub draft: String,
    pub quick_replies: Vec<String>,
}

/// Onboarding screen state
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingView {
    pub cursor: usize,
    pub total: usize,
    pub step: OnboardingStep,
    pub is_last: bool,
    pub completed: bool,
}
