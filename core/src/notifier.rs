/// Outbound collaborators: toast notifications and the event bus
use crate::messenger_types::{ChatEvent, Toast};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Surface a transient confirmation to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Logs toasts only; used when no renderer is attached
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        info!("{}: {}", toast.title, toast.description);
    }
}

/// Fan-out of `ChatEvent`s to any number of subscribers (SSE clients, tests)
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ChatEvent) {
        // No subscribers is fine
        if self.tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivers toasts as `ChatEvent::Toast` on the bus
#[derive(Clone)]
pub struct BroadcastNotifier {
    bus: EventBus,
}

impl BroadcastNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, toast: Toast) {
        self.bus.emit(ChatEvent::Toast { toast });
    }
}
