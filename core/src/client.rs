/// Client facade: composes onboarding, directory, threads, media and settings
///
/// Cheap to clone; all state sits behind one async RwLock. Onboarding gates
/// the user-facing operations. Sync-side inputs (status acks, incoming
/// messages, presence) are accepted regardless.
use crate::conversation_store::{Conversation, ConversationDirectory, ConversationFilter};
use crate::error::{ChatError, Result};
use crate::media_catalog::{MediaCatalog, MediaCounts, MediaFile, MediaFilter, SortKey};
use crate::message_thread::{Message, MessageStatus, MessageThread, QUICK_REPLIES};
use crate::messenger_types::{ChatEvent, OnboardingView, ThreadView, Toast};
use crate::notifier::{BroadcastNotifier, EventBus, Notifier};
use crate::onboarding::{OnboardingSequencer, Transition};
use crate::routes::{Route, View};
use crate::seed::SeedSnapshot;
use crate::session_store::OnboardingFlag;
use crate::settings::{Device, DeviceRegistry, PreferenceKey, Preferences};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

struct ClientState {
    local_user: String,
    /// Present until the first-run flow completes, then discarded
    sequencer: Option<OnboardingSequencer>,
    directory: ConversationDirectory,
    threads: HashMap<String, MessageThread>,
    catalog: MediaCatalog,
    devices: DeviceRegistry,
    preferences: Preferences,
    /// Thread currently on screen; incoming messages there do not count as unread
    open_conversation: Option<String>,
}

impl ClientState {
    fn ensure_onboarded(&self) -> Result<()> {
        if self.sequencer.is_some() {
            return Err(ChatError::OnboardingRequired);
        }
        Ok(())
    }

    fn thread_mut(&mut self, conversation_id: &str) -> Result<&mut MessageThread> {
        if self.directory.get(conversation_id).is_none() {
            return Err(ChatError::NotFound(format!("conversation {}", conversation_id)));
        }
        let local_user = &self.local_user;
        Ok(self
            .threads
            .entry(conversation_id.to_string())
            .or_insert_with(|| MessageThread::new(conversation_id, local_user.as_str())))
    }
}

#[derive(Clone)]
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    session: Arc<dyn OnboardingFlag>,
    bus: EventBus,
    notifier: Arc<dyn Notifier>,
}

impl Client {
    /// Build a client from a seed snapshot; toasts go out on the event bus
    pub fn new(
        seed: SeedSnapshot,
        session: impl OnboardingFlag + 'static,
        local_user: &str,
    ) -> Result<Self> {
        let bus = EventBus::new();
        let notifier = Arc::new(BroadcastNotifier::new(bus.clone()));
        Self::with_notifier(seed, session, local_user, bus, notifier)
    }

    pub fn with_notifier(
        seed: SeedSnapshot,
        session: impl OnboardingFlag + 'static,
        local_user: &str,
        bus: EventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let stores = seed.into_stores(local_user)?;
        let onboarded = session.is_onboarded()?;
        info!(
            "Client ready for {}: {} conversations, {} media, onboarded={}",
            local_user,
            stores.directory.len(),
            stores.catalog.len(),
            onboarded
        );

        let state = ClientState {
            local_user: local_user.to_string(),
            sequencer: (!onboarded).then(OnboardingSequencer::new),
            directory: stores.directory,
            threads: stores.threads,
            catalog: stores.catalog,
            devices: stores.devices,
            preferences: Preferences::default(),
            open_conversation: None,
        };

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            session: Arc::new(session),
            bus,
            notifier,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.bus.subscribe()
    }

    pub async fn local_user(&self) -> String {
        self.state.read().await.local_user.clone()
    }

    fn toast(&self, prefs: &Preferences, toast: Toast) {
        if prefs.notifications {
            self.notifier.notify(toast);
        }
    }

    // ─── Onboarding / routing ────────────────────────────────────────────────

    pub async fn is_onboarded(&self) -> bool {
        self.state.read().await.sequencer.is_none()
    }

    pub async fn onboarding(&self) -> Option<OnboardingView> {
        let state = self.state.read().await;
        state.sequencer.as_ref().map(|seq| OnboardingView {
            cursor: seq.cursor(),
            total: seq.len(),
            step: seq.current().clone(),
            is_last: seq.is_last(),
            completed: seq.is_completed(),
        })
    }

    /// Next / "Get Started". Completion persists the first-run flag once;
    /// if that write fails the sequencer stays on the last step.
    pub async fn advance_onboarding(&self) -> Result<Transition> {
        let mut state = self.state.write().await;
        let Some(seq) = state.sequencer.as_mut() else {
            return Ok(Transition::Unchanged);
        };
        if seq.is_last() && !seq.is_completed() {
            self.session.mark_onboarded()?;
        }
        let transition = seq.advance();
        if transition == Transition::Completed {
            state.sequencer = None;
            self.bus.emit(ChatEvent::OnboardingCompleted);
        }
        Ok(transition)
    }

    pub async fn retreat_onboarding(&self) -> Transition {
        let mut state = self.state.write().await;
        match state.sequencer.as_mut() {
            Some(seq) => seq.retreat(),
            None => Transition::Unchanged,
        }
    }

    /// Clear the first-run flag and start onboarding again
    pub async fn sign_out(&self) -> Result<()> {
        let mut state = self.state.write().await;
        self.session.reset()?;
        state.sequencer = Some(OnboardingSequencer::new());
        state.open_conversation = None;
        info!("Signed out");
        Ok(())
    }

    /// Map an address to the view to draw
    pub async fn resolve(&self, path: &str) -> View {
        let state = self.state.read().await;
        if state.sequencer.is_some() {
            return View::Onboarding;
        }
        match Route::parse(path) {
            Route::Inbox => View::Inbox,
            Route::Thread(id) if state.directory.get(&id).is_some() => {
                View::Thread { conversation_id: id }
            }
            Route::Thread(id) => View::ChatNotFound { conversation_id: id },
            Route::Media => View::Media,
            Route::Settings => View::Settings,
            Route::NotFound => View::NotFound,
        }
    }

    // ─── Directory ───────────────────────────────────────────────────────────

    pub async fn conversations(
        &self,
        search: &str,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>> {
        let state = self.state.read().await;
        state.ensure_onboarded()?;
        Ok(state.directory.list(search, filter).into_iter().cloned().collect())
    }

    pub async fn conversation(&self, id: &str) -> Option<Conversation> {
        self.state.read().await.directory.get(id).cloned()
    }

    pub async fn set_pinned(&self, id: &str, pinned: bool) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        state.directory.set_pinned(id, pinned);
        Ok(())
    }

    /// Presence update from the sync side
    pub async fn set_online(&self, id: &str, online: bool) {
        let mut state = self.state.write().await;
        let before = state.directory.get(id).map(|c| c.is_online);
        state.directory.set_online(id, online);
        if before.is_some_and(|b| b != online) {
            self.bus.emit(ChatEvent::PresenceChanged {
                conversation_id: id.to_string(),
                online,
            });
        }
    }

    // ─── Threads ─────────────────────────────────────────────────────────────

    /// Open a thread: marks the conversation read. `None` means the id is
    /// unknown and the caller should show the "chat not found" fallback.
    pub async fn open_thread(&self, id: &str) -> Result<Option<ThreadView>> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        if state.directory.get(id).is_none() {
            warn!("Open of unknown conversation {}", id);
            return Ok(None);
        }

        state.directory.mark_read(id);
        state.open_conversation = Some(id.to_string());
        self.bus.emit(ChatEvent::ConversationRead {
            conversation_id: id.to_string(),
        });

        let (messages, typing, draft) = {
            let thread = state.thread_mut(id)?;
            (thread.messages().to_vec(), thread.is_typing(), thread.draft().to_string())
        };
        let conversation = match state.directory.get(id) {
            Some(c) => c.clone(),
            None => return Ok(None),
        };
        Ok(Some(ThreadView {
            conversation,
            messages,
            typing,
            draft,
            quick_replies: QUICK_REPLIES.iter().map(|s| s.to_string()).collect(),
        }))
    }

    /// Leave a thread; a stale close for a thread no longer on screen is ignored
    pub async fn close_thread(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        if state.open_conversation.as_deref() != Some(id) {
            return false;
        }
        state.open_conversation = None;
        true
    }

    pub async fn compose(&self, conversation_id: &str, text: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        state.thread_mut(conversation_id)?.compose(text);
        Ok(())
    }

    pub async fn send(&self, conversation_id: &str, text: &str) -> Result<Message> {
        self.push_outgoing(conversation_id, None, text).await
    }

    pub async fn reply(&self, conversation_id: &str, target_id: &str, text: &str) -> Result<Message> {
        self.push_outgoing(conversation_id, Some(target_id), text)
            .await
    }

    async fn push_outgoing(
        &self,
        conversation_id: &str,
        reply_to: Option<&str>,
        text: &str,
    ) -> Result<Message> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;

        let msg = {
            let thread = state.thread_mut(conversation_id)?;
            match reply_to {
                Some(target) => thread.reply(target, text)?.clone(),
                None => thread.send(text)?.clone(),
            }
        };
        state
            .directory
            .record_activity(conversation_id, &msg.content, msg.timestamp);

        self.bus.emit(ChatEvent::MessageAdded {
            conversation_id: conversation_id.to_string(),
            message: msg.clone(),
        });
        self.toast(&state.preferences, Toast::message_sent());
        Ok(msg)
    }

    pub async fn react(
        &self,
        conversation_id: &str,
        message_id: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;

        let added = state.thread_mut(conversation_id)?.react(message_id, emoji, user_id)?;
        if added {
            self.bus.emit(ChatEvent::ReactionAdded {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                emoji: emoji.to_string(),
                user_id: user_id.to_string(),
            });
        }
        self.toast(&state.preferences, Toast::reaction_added(emoji));
        Ok(added)
    }

    pub async fn set_typing(&self, conversation_id: &str, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        state.thread_mut(conversation_id)?.set_typing(active);
        self.bus.emit(ChatEvent::Typing {
            conversation_id: conversation_id.to_string(),
            active,
        });
        Ok(())
    }

    /// Delivery / read acknowledgment from the transport side
    pub async fn update_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let changed = state
            .thread_mut(conversation_id)?
            .update_status(message_id, status)?;
        if changed {
            self.bus.emit(ChatEvent::StatusChanged {
                conversation_id: conversation_id.to_string(),
                message_id: message_id.to_string(),
                status,
            });
        }
        Ok(changed)
    }

    /// Incoming message from the sync side
    pub async fn receive_message(&self, conversation_id: &str, message: Message) -> Result<Message> {
        let mut state = self.state.write().await;
        let msg = state.thread_mut(conversation_id)?.receive(message)?.clone();

        state
            .directory
            .record_activity(conversation_id, &msg.content, msg.timestamp);
        if state.open_conversation.as_deref() != Some(conversation_id) {
            state.directory.increment_unread(conversation_id);
        }

        self.bus.emit(ChatEvent::MessageAdded {
            conversation_id: conversation_id.to_string(),
            message: msg.clone(),
        });
        Ok(msg)
    }

    /// Resolve the reply target of a message, if it is loaded
    pub async fn reply_target(&self, conversation_id: &str, message_id: &str) -> Option<Message> {
        let state = self.state.read().await;
        state
            .threads
            .get(conversation_id)?
            .reply_target(message_id)
            .cloned()
    }

    pub async fn reply_preview(&self, conversation_id: &str, message_id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.threads.get(conversation_id)?.reply_preview(message_id)
    }

    // ─── Media ───────────────────────────────────────────────────────────────

    pub async fn media(
        &self,
        search: &str,
        filter: MediaFilter,
        sort: SortKey,
    ) -> Result<Vec<MediaFile>> {
        let state = self.state.read().await;
        state.ensure_onboarded()?;
        Ok(state
            .catalog
            .list(search, filter, sort)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn media_counts(&self) -> MediaCounts {
        self.state.read().await.catalog.counts()
    }

    pub async fn remove_media(&self, id: &str) -> Result<Option<MediaFile>> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        Ok(state.catalog.remove(id))
    }

    // ─── Settings ────────────────────────────────────────────────────────────

    pub async fn preferences(&self) -> Preferences {
        self.state.read().await.preferences
    }

    pub async fn set_preference(&self, key: PreferenceKey, value: bool) -> Result<Preferences> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        state.preferences.set(key, value);
        Ok(state.preferences)
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.state.read().await.devices.devices().to_vec()
    }

    pub async fn remove_device(&self, id: &str) -> Result<Device> {
        let mut state = self.state.write().await;
        state.ensure_onboarded()?;
        state.devices.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_thread::Direction;
    use crate::session_store::SessionStore;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Flag store whose first write fails
    #[derive(Default)]
    struct FlakyFlag {
        failed_once: AtomicBool,
        saved: AtomicBool,
    }

    impl OnboardingFlag for Arc<FlakyFlag> {
        fn is_onboarded(&self) -> Result<bool> {
            Ok(self.saved.load(Ordering::SeqCst))
        }

        fn mark_onboarded(&self) -> Result<()> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(ChatError::Storage("disk full".to_string()));
            }
            self.saved.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn reset(&self) -> Result<()> {
            self.saved.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn onboarded_client() -> Client {
        let client =
            Client::new(SeedSnapshot::builtin(), SessionStore::temporary().unwrap(), "me").unwrap();
        while client.advance_onboarding().await.unwrap() != Transition::Completed {}
        client
    }

    #[tokio::test]
    async fn test_gated_until_onboarded() {
        let session = SessionStore::temporary().unwrap();
        let client = Client::new(SeedSnapshot::builtin(), session.clone(), "me").unwrap();

        assert_eq!(client.resolve("/media").await, View::Onboarding);
        assert!(matches!(
            client.conversations("", ConversationFilter::All).await,
            Err(ChatError::OnboardingRequired)
        ));

        let mut rx = client.subscribe();
        for _ in 0..3 {
            assert!(matches!(
                client.advance_onboarding().await.unwrap(),
                Transition::Moved { .. }
            ));
        }
        assert_eq!(client.advance_onboarding().await.unwrap(), Transition::Completed);
        assert_eq!(client.advance_onboarding().await.unwrap(), Transition::Unchanged);

        assert!(session.is_onboarded().unwrap());
        assert_eq!(rx.recv().await.unwrap(), ChatEvent::OnboardingCompleted);
        assert_eq!(client.resolve("/media").await, View::Media);
    }

    #[tokio::test]
    async fn test_failed_flag_write_keeps_last_step() {
        let flag = Arc::new(FlakyFlag::default());
        let client = Client::new(SeedSnapshot::builtin(), flag.clone(), "me").unwrap();
        for _ in 0..3 {
            client.advance_onboarding().await.unwrap();
        }

        assert!(matches!(
            client.advance_onboarding().await,
            Err(ChatError::Storage(_))
        ));
        let view = client.onboarding().await.unwrap();
        assert!(view.is_last);
        assert!(!view.completed);
        assert!(!client.is_onboarded().await);

        // Retry succeeds and completes exactly once
        assert_eq!(client.advance_onboarding().await.unwrap(), Transition::Completed);
        assert!(flag.saved.load(Ordering::SeqCst));
        assert!(client.is_onboarded().await);
        assert_eq!(client.advance_onboarding().await.unwrap(), Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_pin_and_unpin() {
        let client = onboarded_client().await;
        let pinned_ids = |convs: Vec<Conversation>| -> Vec<String> {
            convs.into_iter().map(|c| c.id).collect()
        };
        let before = pinned_ids(client.conversations("", ConversationFilter::Pinned).await.unwrap());
        assert!(!before.contains(&"4".to_string()));

        client.set_pinned("4", true).await.unwrap();
        let after = pinned_ids(client.conversations("", ConversationFilter::Pinned).await.unwrap());
        assert!(after.contains(&"4".to_string()));
        assert_eq!(after.len(), before.len() + 1);

        client.set_pinned("4", false).await.unwrap();
        let reset = pinned_ids(client.conversations("", ConversationFilter::Pinned).await.unwrap());
        assert_eq!(reset, before);
    }

    #[tokio::test]
    async fn test_compose_shows_in_thread_draft() {
        let client = onboarded_client().await;
        client.compose("2", "half a thought").await.unwrap();
        let view = client.open_thread("2").await.unwrap().unwrap();
        assert_eq!(view.draft, "half a thought");

        assert!(matches!(
            client.compose("missing", "x").await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_chat_falls_back() {
        let client = onboarded_client().await;
        assert_eq!(
            client.resolve("/chat/1").await,
            View::Thread {
                conversation_id: "1".to_string()
            }
        );
        assert_eq!(
            client.resolve("/chat/404").await,
            View::ChatNotFound {
                conversation_id: "404".to_string()
            }
        );
        assert_eq!(client.resolve("/elsewhere").await, View::NotFound);
        assert!(client.open_thread("404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_thread_marks_read() {
        let client = onboarded_client().await;
        assert_eq!(client.conversation("1").await.unwrap().unread_count, 2);

        let view = client.open_thread("1").await.unwrap().unwrap();
        assert_eq!(view.messages.len(), 4);
        assert_eq!(view.conversation.unread_count, 0);
        assert_eq!(view.quick_replies.len(), 4);

        client.open_thread("1").await.unwrap();
        assert_eq!(client.conversation("1").await.unwrap().unread_count, 0);

        // Conversation with no history gets an empty thread
        let empty = client.open_thread("5").await.unwrap().unwrap();
        assert!(empty.messages.is_empty());
    }

    #[tokio::test]
    async fn test_send_updates_preview_and_notifies() {
        let client = onboarded_client().await;
        let mut rx = client.subscribe();

        let msg = client.send("3", "See you Sunday").await.unwrap();
        assert_eq!(msg.status, MessageStatus::Sending);
        let conv = client.conversation("3").await.unwrap();
        assert_eq!(conv.last_message_preview, "See you Sunday");

        // Order unchanged
        let ids: Vec<String> = client
            .conversations("", ConversationFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        assert!(matches!(rx.recv().await.unwrap(), ChatEvent::MessageAdded { .. }));
        match rx.recv().await.unwrap() {
            ChatEvent::Toast { toast } => assert_eq!(toast, Toast::message_sent()),
            other => panic!("unexpected event: {:?}", other),
        }

        assert!(matches!(
            client.send("3", "   ").await,
            Err(ChatError::InvalidInput(_))
        ));
        assert!(matches!(
            client.send("missing", "hi").await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_notifications_preference_suppresses_toasts() {
        let client = onboarded_client().await;
        client
            .set_preference(PreferenceKey::Notifications, false)
            .await
            .unwrap();
        let mut rx = client.subscribe();

        client.send("1", "quiet").await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), ChatEvent::MessageAdded { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reply_and_react() {
        let client = onboarded_client().await;
        let d = client.reply("1", "2", "ok").await.unwrap();
        assert_eq!(d.reply_to.as_deref(), Some("2"));
        assert_eq!(
            client.reply_target("1", &d.id).await.unwrap().id,
            "2".to_string()
        );
        assert!(matches!(
            client.reply("1", "missing-id", "x").await,
            Err(ChatError::NotFound(_))
        ));

        assert!(client.react("1", "4", "👍", "me").await.unwrap());
        assert!(!client.react("1", "4", "👍", "me").await.unwrap());
        let view = client.open_thread("1").await.unwrap().unwrap();
        assert_eq!(view.messages.len(), 5);
        let reacted = view.messages.iter().find(|m| m.id == "4").unwrap();
        assert_eq!(reacted.reaction("👍").unwrap().users, vec!["me"]);
    }

    #[tokio::test]
    async fn test_status_updates_and_regression() {
        let client = onboarded_client().await;
        let msg = client.send("2", "hello team").await.unwrap();

        assert!(client
            .update_status("2", &msg.id, MessageStatus::Delivered)
            .await
            .unwrap());
        assert!(matches!(
            client.update_status("2", &msg.id, MessageStatus::Sent).await,
            Err(ChatError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_receive_bumps_unread_unless_open() {
        let client = onboarded_client().await;
        let incoming = |id: &str| Message {
            id: id.to_string(),
            content: "ping".to_string(),
            timestamp: Utc::now(),
            sender_id: "jake".to_string(),
            direction: Direction::Received,
            status: MessageStatus::Delivered,
            reactions: Vec::new(),
            reply_to: None,
        };

        client.receive_message("5", incoming("r1")).await.unwrap();
        assert_eq!(client.conversation("5").await.unwrap().unread_count, 1);

        client.open_thread("5").await.unwrap();
        client.receive_message("5", incoming("r2")).await.unwrap();
        assert_eq!(client.conversation("5").await.unwrap().unread_count, 0);

        assert!(!client.close_thread("1").await);
        assert!(client.close_thread("5").await);
        client.receive_message("5", incoming("r3")).await.unwrap();
        assert_eq!(client.conversation("5").await.unwrap().unread_count, 1);
    }

    #[tokio::test]
    async fn test_presence_and_media() {
        let client = onboarded_client().await;
        let mut rx = client.subscribe();
        client.set_online("5", true).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::PresenceChanged {
                conversation_id: "5".to_string(),
                online: true
            }
        );
        // Same value again: no event
        client.set_online("5", true).await;
        assert!(rx.try_recv().is_err());

        let files = client.media("", MediaFilter::All, SortKey::Size).await.unwrap();
        assert_eq!(files[0].name, "project-demo.mp4");
        assert!(client.remove_media("3").await.unwrap().is_some());
        assert!(client.remove_media("3").await.unwrap().is_none());
        assert_eq!(client.media_counts().await.videos, 0);
    }

    #[tokio::test]
    async fn test_sign_out_restarts_onboarding() {
        let client = onboarded_client().await;
        client.sign_out().await.unwrap();
        assert!(!client.is_onboarded().await);
        assert_eq!(client.onboarding().await.unwrap().cursor, 0);
        assert_eq!(client.resolve("/").await, View::Onboarding);
    }
}
