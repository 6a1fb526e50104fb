/// Simulated transport: acknowledges locally sent messages over time
///
/// Listens on the event bus for outgoing messages and feeds sent, delivered
/// and read acknowledgments back through `Client::update_status`.
use crate::client::Client;
use crate::message_thread::{Direction, MessageStatus};
use crate::messenger_types::ChatEvent;
use rand::Rng;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct DeliverySimulator {
    /// Mean gap between acknowledgments
    pub step_delay: Duration,
}

impl Default for DeliverySimulator {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(800),
        }
    }
}

impl DeliverySimulator {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    /// Spawn the listener. It holds a client clone, so the bus never closes
    /// under it; abort the returned handle to stop it.
    pub fn start(self, client: Client) -> JoinHandle<()> {
        let mut rx = client.subscribe();
        info!("Delivery simulator running (step ~{:?})", self.step_delay);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ChatEvent::MessageAdded {
                        conversation_id,
                        message,
                    }) if message.direction == Direction::Sent => {
                        self.track(client.clone(), conversation_id, message.id);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!("Delivery simulator lagged {} events", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn jittered(&self) -> Duration {
        let base = self.step_delay.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base / 2 + jitter)
    }

    /// Walk one message through the remaining statuses
    pub fn track(&self, client: Client, conversation_id: String, message_id: String) -> JoinHandle<()> {
        let delays: Vec<Duration> = (0..3).map(|_| self.jittered()).collect();
        tokio::spawn(async move {
            let mut status = MessageStatus::Sending;
            for delay in delays {
                let Some(next) = status.next() else { break };
                tokio::time::sleep(delay).await;
                match client.update_status(&conversation_id, &message_id, next).await {
                    Ok(_) => status = next,
                    Err(e) => {
                        // Someone else already advanced it further
                        debug!("Dropping ack {:?} for {}: {}", next, message_id, e);
                        break;
                    }
                }
            }
        })
    }
}
