/// Addressable views: "/", "/chat/:id", "/media", "/settings", catch-all
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "id", rename_all = "snake_case")]
pub enum Route {
    Inbox,
    Thread(String),
    Media,
    Settings,
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Inbox,
            "/media" => Route::Media,
            "/settings" => Route::Settings,
            _ => match trimmed.strip_prefix("/chat/") {
                Some(id) if !id.is_empty() && !id.contains('/') => Route::Thread(id.to_string()),
                _ => Route::NotFound,
            },
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Inbox => "/".to_string(),
            Route::Thread(id) => format!("/chat/{}", id),
            Route::Media => "/media".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::NotFound => "/404".to_string(),
        }
    }
}

/// What the renderer should draw after gating and lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Onboarding,
    Inbox,
    Thread { conversation_id: String },
    /// Display fallback for an unknown conversation id
    ChatNotFound { conversation_id: String },
    Media,
    Settings,
    NotFound,
}
