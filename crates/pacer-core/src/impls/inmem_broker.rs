//! InMemoryBroker - 開発・テスト用のブローカー
//!
//! RabbitMQ の default exchange + durable queue を最小限まねたもの。
//!
//! # 実装詳細
//! - tokio の Mutex + Notify（lock を跨いで await しない）
//! - 配送ごとに delivery tag を採番し、ack されるまで unacked に保持
//! - `restart()` で broker 再起動を再現: non-durable queue は消え、unacked は先頭に戻る
//! - 再起動・到達不能化で既存の接続（publisher / subscriber）は無効になる
//! - `close()` された接続は数えておき、以後の操作は拒否する

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{AlertMessage, DeliveryTag, QueueError, QueueMessage};
use crate::ports::{AlertPublisher, AlertSubscription};

const HOST: &str = "in-memory";

#[derive(Debug, Default)]
struct QueueSlot {
    durable: bool,
    ready: VecDeque<Vec<u8>>,
    unacked: BTreeMap<u64, Vec<u8>>,
    acked: Vec<DeliveryTag>,
}

impl QueueSlot {
    fn durable() -> Self {
        Self {
            durable: true,
            ..Self::default()
        }
    }

    /// Put unacked deliveries back at the head, oldest first.
    fn requeue_unacked(&mut self) {
        let unacked = std::mem::take(&mut self.unacked);
        for (_, body) in unacked.into_iter().rev() {
            self.ready.push_front(body);
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    queues: HashMap<String, QueueSlot>,
    next_tag: u64,
    reachable: bool,
    /// Bumped on restart / loss of reachability; older connections are dead.
    generation: u64,
    closed_connections: usize,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
            next_tag: 1,
            reachable: true,
            generation: 0,
            closed_connections: 0,
        }
    }

    fn allocate_tag(&mut self) -> u64 {
        let tag = self.next_tag;
        self.next_tag += 1;
        tag
    }
}

/// Shared in-process broker. Clones share the same queues.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Open a producer connection bound to `queue`.
    pub async fn publisher(&self, queue: impl Into<String>) -> InMemoryPublisher {
        let generation = self.state.lock().await.generation;
        InMemoryPublisher {
            broker: self.clone(),
            queue: queue.into(),
            generation,
            closed: false,
        }
    }

    /// Open a consumer connection bound to `queue`. Call `subscribe` before `next`.
    pub async fn subscriber(&self, queue: impl Into<String>) -> InMemorySubscriber {
        let generation = self.state.lock().await.generation;
        InMemorySubscriber {
            broker: self.clone(),
            queue: queue.into(),
            generation,
            subscribed: false,
            owned: Vec::new(),
        }
    }

    /// Simulate the broker going away (or coming back).
    pub async fn set_reachable(&self, reachable: bool) {
        let mut state = self.state.lock().await;
        if state.reachable && !reachable {
            state.generation += 1;
        }
        state.reachable = reachable;
        drop(state);
        self.notify.notify_waiters();
    }

    /// Simulate a broker restart.
    pub async fn restart(&self) {
        let mut state = self.state.lock().await;
        state.queues.retain(|_, slot| slot.durable);
        for slot in state.queues.values_mut() {
            slot.requeue_unacked();
        }
        state.generation += 1;
        drop(state);
        self.notify.notify_waiters();
    }

    /// Declare a queue that does not survive [`restart`](Self::restart).
    pub async fn declare_transient(&self, queue: &str) {
        let mut state = self.state.lock().await;
        state.queues.entry(queue.to_string()).or_default();
    }

    /// Enqueue raw bytes, bypassing any publisher.
    pub async fn inject(&self, queue: &str, body: Vec<u8>) {
        let mut state = self.state.lock().await;
        state
            .queues
            .entry(queue.to_string())
            .or_insert_with(QueueSlot::durable)
            .ready
            .push_back(body);
        drop(state);
        self.notify.notify_waiters();
    }

    pub async fn ready_count(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |slot| slot.ready.len())
    }

    /// Publisher and subscriber connections closed by their owner.
    pub async fn closed_connections(&self) -> usize {
        self.state.lock().await.closed_connections
    }

    pub async fn unacked_count(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |slot| slot.unacked.len())
    }

    pub async fn acked_tags(&self, queue: &str) -> Vec<DeliveryTag> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|slot| slot.acked.clone())
            .unwrap_or_default()
    }

    /// Ready bodies decoded lossily, head first.
    pub async fn ready_texts(&self, queue: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|slot| {
                slot.ready
                    .iter()
                    .map(|body| String::from_utf8_lossy(body).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn connection_lost(queue: &str) -> String {
    format!("connection to the in-memory broker for '{queue}' was lost")
}

pub struct InMemoryPublisher {
    broker: InMemoryBroker,
    queue: String,
    generation: u64,
    closed: bool,
}

#[async_trait]
impl AlertPublisher for InMemoryPublisher {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn ensure_queue(&mut self) -> Result<(), QueueError> {
        let mut state = self.broker.state.lock().await;
        if !state.reachable || state.generation != self.generation {
            return Err(QueueError::Connection {
                host: HOST.to_string(),
                reason: connection_lost(&self.queue),
            });
        }
        state
            .queues
            .entry(self.queue.clone())
            .or_insert_with(QueueSlot::durable);
        Ok(())
    }

    async fn publish(&mut self, alert: &AlertMessage) -> Result<(), QueueError> {
        if self.closed {
            return Err(QueueError::Publish {
                queue: self.queue.clone(),
                reason: "connection is closed".to_string(),
            });
        }
        let mut state = self.broker.state.lock().await;
        if !state.reachable || state.generation != self.generation {
            return Err(QueueError::Publish {
                queue: self.queue.clone(),
                reason: connection_lost(&self.queue),
            });
        }
        let Some(slot) = state.queues.get_mut(&self.queue) else {
            return Err(QueueError::Publish {
                queue: self.queue.clone(),
                reason: "queue has not been declared".to_string(),
            });
        };
        slot.ready.push_back(alert.body().to_vec());
        drop(state);

        self.broker.notify.notify_waiters();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        if !self.closed {
            self.closed = true;
            self.broker.state.lock().await.closed_connections += 1;
        }
        Ok(())
    }
}

pub struct InMemorySubscriber {
    broker: InMemoryBroker,
    queue: String,
    generation: u64,
    subscribed: bool,
    /// Tags delivered to this subscriber and not yet acked.
    owned: Vec<u64>,
}

#[async_trait]
impl AlertSubscription for InMemorySubscriber {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn subscribe(&mut self) -> Result<(), QueueError> {
        let mut state = self.broker.state.lock().await;
        if !state.reachable || state.generation != self.generation {
            return Err(QueueError::Connection {
                host: HOST.to_string(),
                reason: connection_lost(&self.queue),
            });
        }
        state
            .queues
            .entry(self.queue.clone())
            .or_insert_with(QueueSlot::durable);
        self.subscribed = true;
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<QueueMessage>, QueueError> {
        if !self.subscribed {
            return Err(QueueError::Receive {
                queue: self.queue.clone(),
                reason: "not subscribed".to_string(),
            });
        }

        loop {
            // Register interest before checking, so a publish between the
            // check and the await is not missed.
            let notified = self.broker.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.broker.state.lock().await;
                if !state.reachable || state.generation != self.generation {
                    return Ok(None);
                }
                let tag = state.next_tag;
                if let Some(slot) = state.queues.get_mut(&self.queue)
                    && let Some(body) = slot.ready.pop_front()
                {
                    let durable = slot.durable;
                    slot.unacked.insert(tag, body.clone());
                    state.allocate_tag();
                    self.owned.push(tag);
                    return Ok(Some(QueueMessage::new(
                        body,
                        DeliveryTag::new(tag),
                        durable,
                    )));
                }
            }

            notified.await;
        }
    }

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut state = self.broker.state.lock().await;
        if !state.reachable || state.generation != self.generation {
            return Err(QueueError::Ack {
                queue: self.queue.clone(),
                tag,
                reason: connection_lost(&self.queue),
            });
        }
        let removed = state.queues.get_mut(&self.queue).and_then(|slot| {
            let body = slot.unacked.remove(&tag.get())?;
            slot.acked.push(tag);
            Some(body)
        });
        match removed {
            Some(_) => {
                self.owned.retain(|owned| *owned != tag.get());
                Ok(())
            }
            None => Err(QueueError::Ack {
                queue: self.queue.clone(),
                tag,
                reason: "unknown delivery tag".to_string(),
            }),
        }
    }

    /// Unacked deliveries go back to the head of the queue.
    async fn close(&mut self) -> Result<(), QueueError> {
        let was_open = std::mem::replace(&mut self.subscribed, false);
        let owned = std::mem::take(&mut self.owned);
        let mut state = self.broker.state.lock().await;
        if was_open {
            state.closed_connections += 1;
        }
        if state.generation != self.generation {
            return Ok(());
        }
        if let Some(slot) = state.queues.get_mut(&self.queue) {
            for tag in owned.into_iter().rev() {
                if let Some(body) = slot.unacked.remove(&tag) {
                    slot.ready.push_front(body);
                }
            }
        }
        drop(state);
        self.broker.notify.notify_waiters();
        Ok(())
    }
}
