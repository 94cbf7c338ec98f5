//! Broadcast dispatcher: the single consumer of the broadcast queue.
//!
//! Messages are taken in FIFO order and pushed onto every registered
//! session's outbound queue, so all sessions see broadcasts in the order
//! the dispatcher processed them.
//!
//! # Full queues
//!
//! With [`FanoutPolicy::Block`] the dispatcher waits for space in a full
//! queue. Fan-out is serialized, so one stalled client delays delivery to
//! every client behind it until its writer drains (the writer's socket
//! write timeout bounds the stall). [`FanoutPolicy::Disconnect`] fires the
//! stalled session's stop signal instead.
//!
//! # Joining sessions
//!
//! A broadcast stored in the transcript before a session registered may
//! still be in the queue when the session shows up in a snapshot. Such a
//! broadcast is part of the session's history replay and is skipped.

use tcpchat_protocol::Outbound;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FanoutPolicy;
use crate::registry::{RegistryHandle, SessionEntry};

/// One message on the broadcast queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub message: Outbound,

    /// Transcript offset of the stored record, if the message was stored
    pub offset: Option<u64>,
}

impl Broadcast {
    /// A message that was not stored in the transcript.
    pub fn live(message: Outbound) -> Self {
        Self {
            message,
            offset: None,
        }
    }

    /// Whether `entry` already saw this message in its history replay.
    pub fn replayed_to(&self, entry: &SessionEntry) -> bool {
        self.offset.is_some_and(|offset| offset < entry.history_end)
    }
}

/// Fans broadcast messages out to session queues.
pub struct Dispatcher {
    queue: mpsc::UnboundedReceiver<Broadcast>,
    registry: RegistryHandle,
    policy: FanoutPolicy,
}

impl Dispatcher {
    pub fn new(
        queue: mpsc::UnboundedReceiver<Broadcast>,
        registry: RegistryHandle,
        policy: FanoutPolicy,
    ) -> Self {
        Self {
            queue,
            registry,
            policy,
        }
    }

    /// Runs until every producer has been dropped.
    pub async fn run(mut self) {
        debug!(policy = ?self.policy, "Dispatcher starting");

        while let Some(broadcast) = self.queue.recv().await {
            let delivered = self.fan_out(&broadcast).await;
            debug!(delivered, message = %broadcast.message, "Broadcast dispatched");
        }

        info!("Dispatcher stopped");
    }

    /// Enqueues the message on every registered session that has not
    /// replayed it already. Returns how many queues accepted it.
    pub async fn fan_out(&self, broadcast: &Broadcast) -> usize {
        let mut delivered = 0;

        for entry in self.registry.snapshot().await {
            if broadcast.replayed_to(&entry) {
                debug!(session = %entry.id, "Already replayed, skipping");
                continue;
            }

            match entry.outbound.try_send(broadcast.message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(message)) => match self.policy {
                    FanoutPolicy::Block => {
                        debug!(session = %entry.id, "Outbound queue full, waiting");
                        if entry.outbound.send(message).await.is_ok() {
                            delivered += 1;
                        }
                    }
                    FanoutPolicy::Disconnect => {
                        warn!(
                            session = %entry.id,
                            name = %entry.name,
                            "Outbound queue full, disconnecting slow client"
                        );
                        entry.closed.cancel();
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    debug!(session = %entry.id, "Outbound queue closed, skipping");
                }
            }
        }

        delivered
    }
}

/// Spawns the dispatcher task.
pub fn spawn_dispatcher(
    queue: mpsc::UnboundedReceiver<Broadcast>,
    registry: RegistryHandle,
    policy: FanoutPolicy,
) -> JoinHandle<()> {
    tokio::spawn(Dispatcher::new(queue, registry, policy).run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tcpchat_core::{DisplayName, SessionId};
    use tokio_util::sync::CancellationToken;

    use crate::registry::{spawn_registry, SessionEntry};

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    async fn register(
        registry: &RegistryHandle,
        id: u64,
        who: &str,
        capacity: usize,
    ) -> (mpsc::Receiver<Outbound>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let closed = CancellationToken::new();
        let entry = SessionEntry::new(
            SessionId::new(id),
            name(who),
            "127.0.0.1:6000".parse().unwrap(),
            tx,
            closed.clone(),
        );
        registry.register(entry).await.unwrap();
        (rx, closed)
    }

    #[tokio::test]
    async fn test_every_session_receives_in_order() {
        let registry = spawn_registry();
        let mut queues = Vec::new();
        for (id, who) in ["a", "b", "c"].iter().enumerate() {
            queues.push(register(&registry, id as u64, who, 10).await.0);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_dispatcher(rx, registry.clone(), FanoutPolicy::Block);

        let first = Outbound::Joined(name("x"));
        let second = Outbound::Left(name("x"));
        tx.send(Broadcast::live(first.clone())).unwrap();
        tx.send(Broadcast::live(second.clone())).unwrap();
        drop(tx);
        handle.await.unwrap();

        for queue in &mut queues {
            assert_eq!(queue.recv().await, Some(first.clone()));
            assert_eq!(queue.recv().await, Some(second.clone()));
        }
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_space() {
        let registry = spawn_registry();
        let (mut slow, _closed) = register(&registry, 1, "slow", 1).await;
        let (_tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(rx, registry, FanoutPolicy::Block);

        let one = Broadcast::live(Outbound::Joined(name("one")));
        assert_eq!(dispatcher.fan_out(&one).await, 1);

        // Second message blocks until the first is consumed
        let two = Broadcast::live(Outbound::Joined(name("two")));
        let pending = dispatcher.fan_out(&two);
        tokio::pin!(pending);
        assert!(tokio::time::timeout(Duration::from_millis(50), &mut pending)
            .await
            .is_err());

        assert_eq!(slow.recv().await, Some(Outbound::Joined(name("one"))));
        assert_eq!(pending.await, 1);
        assert_eq!(slow.recv().await, Some(Outbound::Joined(name("two"))));
    }

    #[tokio::test]
    async fn test_disconnect_policy_kicks_slow_session() {
        let registry = spawn_registry();
        let (_slow, slow_closed) = register(&registry, 1, "slow", 1).await;
        let (mut fast, fast_closed) = register(&registry, 2, "fast", 10).await;
        let (_tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(rx, registry, FanoutPolicy::Disconnect);

        let one = Broadcast::live(Outbound::Joined(name("one")));
        let two = Broadcast::live(Outbound::Joined(name("two")));
        assert_eq!(dispatcher.fan_out(&one).await, 2);
        assert_eq!(dispatcher.fan_out(&two).await, 1);

        assert!(slow_closed.is_cancelled());
        assert!(!fast_closed.is_cancelled());
        assert_eq!(fast.recv().await, Some(Outbound::Joined(name("one"))));
        assert_eq!(fast.recv().await, Some(Outbound::Joined(name("two"))));
    }

    #[tokio::test]
    async fn test_closed_queue_is_skipped() {
        let registry = spawn_registry();
        let (gone, _closed) = register(&registry, 1, "gone", 10).await;
        drop(gone);
        let (_tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(rx, registry, FanoutPolicy::Block);

        assert_eq!(dispatcher.fan_out(&Broadcast::live(Outbound::Shutdown)).await, 0);
    }

    #[tokio::test]
    async fn test_replayed_broadcast_is_skipped() {
        let registry = spawn_registry();
        let (mut old, _) = register(&registry, 1, "old", 10).await;
        let (tx, mut new) = mpsc::channel(10);
        let entry = SessionEntry::new(
            SessionId::new(2),
            name("new"),
            "127.0.0.1:6000".parse().unwrap(),
            tx,
            CancellationToken::new(),
        )
        .with_history_end(100);
        registry.register(entry).await.unwrap();

        let (_tx, queue) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(queue, registry, FanoutPolicy::Block);

        let stored = Broadcast {
            message: Outbound::Joined(name("a")),
            offset: Some(60),
        };
        let after = Broadcast {
            message: Outbound::Joined(name("b")),
            offset: Some(100),
        };
        assert_eq!(dispatcher.fan_out(&stored).await, 1);
        assert_eq!(dispatcher.fan_out(&after).await, 2);
        let shutdown = Broadcast::live(Outbound::Shutdown);
        assert_eq!(dispatcher.fan_out(&shutdown).await, 2);

        assert_eq!(old.recv().await, Some(stored.message));
        assert_eq!(new.recv().await, Some(after.message));
        assert_eq!(new.recv().await, Some(Outbound::Shutdown));
    }
}
