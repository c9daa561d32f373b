//! In-process direct-exchange message broker
//!
//! Exchanges route a message to every queue bound with exactly the message's
//! routing key. Queues are bounded channels shared by any number of competing
//! consumers, each message going to one of them.
//!
//! Delivery is at-least-once: a [`Delivery`] that is dropped without being
//! acknowledged goes back onto its queue flagged as redelivered.
//! A redelivered message that is dropped again is discarded.

use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{MessagingError, MessagingResult};

#[derive(Debug, Clone)]
struct Message {
    body: Bytes,
    redelivered: bool,
}

struct Queue {
    sender: mpsc::Sender<Message>,
    receiver: Arc<Mutex<mpsc::Receiver<Message>>>,
}

/// routing key -> bound queue names
type Bindings = HashMap<String, HashSet<String>>;

struct BrokerInner {
    capacity: usize,
    exchanges: RwLock<HashMap<String, Bindings>>,
    queues: RwLock<HashMap<String, Queue>>,
    next_delivery_tag: Arc<AtomicU64>,
}

/// Cheaply cloneable handle to a shared broker
#[derive(Clone)]
pub struct MessageBroker {
    inner: Arc<BrokerInner>,
}

impl MessageBroker {
    /// Create a broker whose queues each hold at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                capacity: capacity.max(1),
                exchanges: RwLock::new(HashMap::new()),
                queues: RwLock::new(HashMap::new()),
                next_delivery_tag: Arc::new(AtomicU64::new(1)),
            }),
        }
    }

    /// Declare a direct exchange. Redeclaring an existing exchange is a no-op.
    pub async fn declare_exchange(&self, name: &str) {
        let mut exchanges = self.inner.exchanges.write().await;
        if !exchanges.contains_key(name) {
            debug!("Declared exchange '{}'", name);
            exchanges.insert(name.to_string(), Bindings::new());
        }
    }

    /// Declare a queue and return its name.
    ///
    /// An empty name asks the broker to generate a unique one, which is how
    /// exclusive per-subscriber queues are created.
    pub async fn declare_queue(&self, name: &str) -> String {
        let name = if name.is_empty() {
            format!("amq.gen-{}", Uuid::new_v4())
        } else {
            name.to_string()
        };

        let mut queues = self.inner.queues.write().await;
        queues.entry(name.clone()).or_insert_with(|| {
            debug!("Declared queue '{}'", name);
            let (sender, receiver) = mpsc::channel(self.inner.capacity);
            Queue {
                sender,
                receiver: Arc::new(Mutex::new(receiver)),
            }
        });

        name
    }

    pub async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> MessagingResult<()> {
        if !self.inner.queues.read().await.contains_key(queue) {
            return Err(MessagingError::QueueNotFound {
                queue: queue.to_string(),
            });
        }

        let mut exchanges = self.inner.exchanges.write().await;
        let bindings = exchanges
            .get_mut(exchange)
            .ok_or_else(|| MessagingError::ExchangeNotFound {
                exchange: exchange.to_string(),
            })?;

        bindings
            .entry(routing_key.to_string())
            .or_default()
            .insert(queue.to_string());

        debug!(
            "Bound queue '{}' to exchange '{}' with routing key '{}'",
            queue, exchange, routing_key
        );
        Ok(())
    }

    /// Route a message to every queue bound to `exchange` with `routing_key`.
    ///
    /// Returns the number of queues the message was enqueued on. A message
    /// with no matching binding is dropped and `Ok(0)` is returned. Waits when
    /// a target queue is full.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
    ) -> MessagingResult<usize> {
        let targets = self.route(exchange, routing_key).await?;
        let message = Message {
            body: body.into(),
            redelivered: false,
        };

        let mut routed = 0;
        for (queue, sender) in targets {
            sender
                .send(message.clone())
                .await
                .map_err(|_| MessagingError::QueueClosed { queue })?;
            routed += 1;
        }

        Ok(routed)
    }

    /// Like [`publish`](Self::publish), but fails with
    /// [`MessagingError::QueueFull`] instead of waiting for room.
    ///
    /// Queues listed before the full one keep their copy of the message.
    pub async fn try_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: impl Into<Bytes>,
    ) -> MessagingResult<usize> {
        let targets = self.route(exchange, routing_key).await?;
        let message = Message {
            body: body.into(),
            redelivered: false,
        };

        let mut routed = 0;
        for (queue, sender) in targets {
            sender.try_send(message.clone()).map_err(|e| match e {
                TrySendError::Full(_) => MessagingError::QueueFull { queue },
                TrySendError::Closed(_) => MessagingError::QueueClosed { queue },
            })?;
            routed += 1;
        }

        Ok(routed)
    }

    async fn route(
        &self,
        exchange: &str,
        routing_key: &str,
    ) -> MessagingResult<Vec<(String, mpsc::Sender<Message>)>> {
        let queue_names: Vec<String> = {
            let exchanges = self.inner.exchanges.read().await;
            let bindings = exchanges
                .get(exchange)
                .ok_or_else(|| MessagingError::ExchangeNotFound {
                    exchange: exchange.to_string(),
                })?;
            bindings
                .get(routing_key)
                .map(|queues| queues.iter().cloned().collect())
                .unwrap_or_default()
        };

        if queue_names.is_empty() {
            debug!(
                "No queue bound to exchange '{}' with routing key '{}', message dropped",
                exchange, routing_key
            );
            return Ok(Vec::new());
        }

        let queues = self.inner.queues.read().await;
        Ok(queue_names
            .into_iter()
            .filter_map(|name| {
                let sender = queues.get(&name)?.sender.clone();
                Some((name, sender))
            })
            .collect())
    }

    /// Attach a consumer to a queue. Consumers of the same queue compete.
    pub async fn consume(&self, queue: &str) -> MessagingResult<Consumer> {
        let queues = self.inner.queues.read().await;
        let handle = queues.get(queue).ok_or_else(|| MessagingError::QueueNotFound {
            queue: queue.to_string(),
        })?;

        Ok(Consumer {
            queue: queue.to_string(),
            receiver: handle.receiver.clone(),
            requeue: handle.sender.downgrade(),
            next_delivery_tag: self.inner.next_delivery_tag.clone(),
        })
    }

    /// Number of messages waiting on a queue
    pub async fn queue_depth(&self, queue: &str) -> MessagingResult<usize> {
        let queues = self.inner.queues.read().await;
        let handle = queues.get(queue).ok_or_else(|| MessagingError::QueueNotFound {
            queue: queue.to_string(),
        })?;
        Ok(handle.sender.max_capacity() - handle.sender.capacity())
    }

    /// Unbind and drop one queue. Its consumers drain what is already buffered
    /// and then see the end of their stream.
    pub async fn delete_queue(&self, queue: &str) -> MessagingResult<()> {
        let mut exchanges = self.inner.exchanges.write().await;
        let mut queues = self.inner.queues.write().await;

        queues
            .remove(queue)
            .ok_or_else(|| MessagingError::QueueNotFound {
                queue: queue.to_string(),
            })?;

        for bindings in exchanges.values_mut() {
            for bound in bindings.values_mut() {
                bound.remove(queue);
            }
            bindings.retain(|_, bound| !bound.is_empty());
        }

        debug!("Deleted queue '{}'", queue);
        Ok(())
    }

    /// Drop every queue and exchange
    pub async fn close(&self) {
        let mut exchanges = self.inner.exchanges.write().await;
        let mut queues = self.inner.queues.write().await;
        debug!("Closing broker with {} queue(s)", queues.len());
        exchanges.clear();
        queues.clear();
    }
}

/// Receiving end of a queue. Clones compete for the same messages.
#[derive(Clone)]
pub struct Consumer {
    queue: String,
    receiver: Arc<Mutex<mpsc::Receiver<Message>>>,
    requeue: mpsc::WeakSender<Message>,
    next_delivery_tag: Arc<AtomicU64>,
}

impl Consumer {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Wait for the next message. `None` once the queue has been closed and drained.
    ///
    /// Cancel safe: dropping the future never loses a message.
    pub async fn next(&self) -> Option<Delivery> {
        let message = self.receiver.lock().await.recv().await?;

        Some(Delivery {
            delivery_tag: self.next_delivery_tag.fetch_add(1, Ordering::Relaxed),
            queue: self.queue.clone(),
            message: Some(message),
            requeue: self.requeue.clone(),
        })
    }
}

/// A message handed to a consumer, awaiting acknowledgement
pub struct Delivery {
    delivery_tag: u64,
    queue: String,
    message: Option<Message>,
    requeue: mpsc::WeakSender<Message>,
}

impl Delivery {
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn body(&self) -> &[u8] {
        self.message.as_ref().map(|m| m.body.as_ref()).unwrap_or_default()
    }

    /// True when this message was handed out before and never acknowledged
    pub fn redelivered(&self) -> bool {
        self.message.as_ref().is_some_and(|m| m.redelivered)
    }

    /// Mark the message as processed; it will not be delivered again
    pub fn ack(mut self) {
        self.message.take();
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let Some(mut message) = self.message.take() else {
            return;
        };

        if message.redelivered {
            warn!(
                "Delivery {} from queue '{}' was dropped again after redelivery, discarding",
                self.delivery_tag, self.queue
            );
            return;
        }

        message.redelivered = true;
        let requeued = self
            .requeue
            .upgrade()
            .map(|sender| sender.try_send(message).is_ok())
            .unwrap_or(false);

        if requeued {
            warn!(
                "Delivery {} from queue '{}' was not acknowledged, requeued",
                self.delivery_tag, self.queue
            );
        } else {
            warn!(
                "Delivery {} from queue '{}' was not acknowledged and could not be requeued, \
                 discarding",
                self.delivery_tag, self.queue
            );
        }
    }
}
