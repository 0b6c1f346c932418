//! Event sink trait with recording and logging implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::OrderEvent;
use tokio::sync::{Notify, RwLock};

use crate::error::{Result, ServiceError};

/// Receives events after the change that produced them has committed.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: OrderEvent) -> Result<()>;
}

/// Sink that only writes a log line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn publish(&self, event: OrderEvent) -> Result<()> {
        tracing::info!(
            event_type = event.event_type(),
            order_id = %event.order_id(),
            "order event published"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryEventState {
    events: Vec<OrderEvent>,
    fail_on_publish: bool,
}

/// Sink that records events for inspection in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSink {
    state: Arc<RwLock<InMemoryEventState>>,
    published: Arc<Notify>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every publish to fail.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    pub async fn events(&self) -> Vec<OrderEvent> {
        self.state.read().await.events.clone()
    }

    /// Waits until at least `count` events were recorded or `timeout` elapses,
    /// then returns what was recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<OrderEvent> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                // Registered before the count check so a publish in between still wakes us.
                let notified = self.published.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.state.read().await.events.len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.events().await
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn publish(&self, event: OrderEvent) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(ServiceError::collaborator("event sink", "publish failed"));
        }
        state.events.push(event);
        drop(state);
        self.published.notify_waiters();
        Ok(())
    }
}
