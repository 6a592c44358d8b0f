//! Matching of unsolicited inbound lines to the virtual users waiting for them.
//!
//! Waiters are kept in registration order; a line is handed to the first waiter whose
//! predicate accepts it and that waiter is removed in the same step, so a waiter fires
//! at most once and a line is delivered at most once.

use log::{debug, trace};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::errors::SampleError;
use crate::types::WaiterId;

pub type LinePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Waiter {
    owner: String,
    predicate: LinePredicate,
    release: oneshot::Sender<String>,
}

#[derive(Default)]
pub struct CorrelationRegistry {
    waiters: Mutex<BTreeMap<WaiterId, Waiter>>,
    next_waiter_id: AtomicU64,
}

impl std::fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

/// Predicate used by virtual users: the line mentions the nick anywhere.
pub fn nick_predicate(nick: &str) -> LinePredicate {
    let nick = nick.to_owned();
    Box::new(move |line: &str| line.contains(&nick))
}

impl CorrelationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(CorrelationRegistry::default())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<WaiterId, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a waiter behind every waiter registered before it.
    pub fn register(
        self: &Arc<Self>,
        owner: impl Into<String>,
        predicate: LinePredicate,
    ) -> PendingReply {
        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (release, reply) = oneshot::channel();
        let owner = owner.into();
        trace!("waiter {id} registered for {owner}");
        self.lock().insert(
            id,
            Waiter {
                owner,
                predicate,
                release,
            },
        );
        PendingReply {
            id,
            registry: Arc::clone(self),
            reply,
        }
    }

    /// Hands the line to the first matching waiter. Waiters whose caller already gave up
    /// are dropped on the way and do not count as a match.
    pub fn offer(&self, line: &str) -> bool {
        let mut waiters = self.lock();
        loop {
            let Some(id) = waiters
                .iter()
                .find(|(_, waiter)| (waiter.predicate)(line))
                .map(|(id, _)| *id)
            else {
                return false;
            };
            let Some(waiter) = waiters.remove(&id) else {
                return false;
            };
            match waiter.release.send(line.to_owned()) {
                Ok(()) => {
                    trace!("waiter {id} of {} released", waiter.owner);
                    return true;
                }
                Err(_) => debug!("waiter {id} of {} was abandoned", waiter.owner),
            }
        }
    }

    fn remove(&self, id: WaiterId) {
        self.lock().remove(&id);
    }

    /// Drops every pending waiter; their callers see `SampleError::Cancelled`.
    pub fn clear(&self) -> usize {
        let mut waiters = self.lock();
        let dropped = waiters.len();
        waiters.clear();
        dropped
    }

    /// Drops the pending waiters of one virtual user.
    pub fn clear_owner(&self, owner: &str) -> usize {
        let mut waiters = self.lock();
        let before = waiters.len();
        waiters.retain(|_, waiter| waiter.owner != owner);
        before - waiters.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caller side of a registered waiter. Dropping it deregisters the waiter.
#[derive(Debug)]
pub struct PendingReply {
    id: WaiterId,
    registry: Arc<CorrelationRegistry>,
    reply: oneshot::Receiver<String>,
}

impl PendingReply {
    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Blocks until a line is matched, the waiter is cancelled or `timeout` expires.
    pub async fn wait(mut self, timeout: Duration) -> Result<String, SampleError> {
        match tokio::time::timeout(timeout, &mut self.reply).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(_)) => Err(SampleError::Cancelled),
            Err(_) => Err(SampleError::ReplyTimeout(timeout)),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_first_registered_waiter_wins() {
        let registry = CorrelationRegistry::new();
        let first = registry.register("a", Box::new(|line: &str| line.contains("bot")));
        let second = registry.register("b", Box::new(|line: &str| line.contains("bot")));

        assert!(registry.offer("hello bot"));
        assert_eq!(registry.len(), 1, "released waiter is removed");
        assert_eq!(first.wait(WAIT).await.unwrap(), "hello bot");

        assert!(registry.offer("bot again"));
        assert!(registry.is_empty());
        assert_eq!(second.wait(WAIT).await.unwrap(), "bot again");
    }

    #[tokio::test]
    async fn test_waiter_fires_once() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register("vu", nick_predicate("vu0000000"));
        assert!(registry.offer(":x PRIVMSG #c :vu0000000"));
        assert!(!registry.offer(":x PRIVMSG #c :vu0000000 again"));
        assert_eq!(pending.wait(WAIT).await.unwrap(), ":x PRIVMSG #c :vu0000000");
    }

    #[tokio::test]
    async fn test_unmatched_line_is_refused() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register("vu", nick_predicate("vu0000001"));
        assert!(!registry.offer("PRIVMSG #c :vu0000002"));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            pending.wait(Duration::from_millis(20)).await,
            Err(SampleError::ReplyTimeout(_))
        ));
        assert!(registry.is_empty(), "timed out waiter is deregistered");
    }

    #[test]
    fn test_padded_nicks_do_not_collide() {
        let short = nick_predicate("jmeterBot0000000");
        assert!(!short("PRIVMSG #c :jmeterBot0000001"));
        assert!(short("PRIVMSG #c :jmeterBot0000000"));
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_swallow_line() {
        let registry = CorrelationRegistry::new();
        let mut abandoned = registry.register("a", nick_predicate("bot"));
        let live = registry.register("b", nick_predicate("bot"));
        // receiver closed but entry still present, as during a racing drop
        abandoned.reply.close();
        assert!(registry.offer("bot"));
        assert!(registry.is_empty());
        assert_eq!(live.wait(WAIT).await.unwrap(), "bot");
        drop(abandoned);
    }

    #[tokio::test]
    async fn test_clear_cancels_pending_waiters() {
        let registry = CorrelationRegistry::new();
        let pending = registry.register("a", nick_predicate("a"));
        let other = registry.register("b", nick_predicate("b"));
        assert_eq!(registry.clear_owner("b"), 1);
        assert!(matches!(other.wait(WAIT).await, Err(SampleError::Cancelled)));
        assert_eq!(registry.clear(), 1);
        assert!(matches!(pending.wait(WAIT).await, Err(SampleError::Cancelled)));
    }
}
