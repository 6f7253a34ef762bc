//! Active-publisher discovery
//!
//! Room membership and publish activation are reported by two
//! independent server-side events, so a subscriber attaching right
//! after a publisher's join can legitimately observe
//! `publisher == false` for a brief window. A bounded poll absorbs
//! that window without the protocol exposing a blocking wait.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use roomcast_core::{
    Participant, ParticipantId, RoomId, DISCOVERY_INTERVAL_SECS, DISCOVERY_MAX_ATTEMPTS,
};

use crate::error::{ClientError, Result};
use crate::protocol::RoomChannel;

/// Bounds for one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total query rounds, the immediate one included.
    pub max_attempts: u32,
    /// Delay before every round after the first.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DISCOVERY_MAX_ATTEMPTS,
            interval: Duration::from_secs(DISCOVERY_INTERVAL_SECS),
        }
    }
}

/// Repeatedly run `query` until `pick` selects a result.
///
/// The first round runs immediately; each later round waits
/// `policy.interval` first. A query error is logged and consumes the
/// round. Returns `None` once `policy.max_attempts` rounds are spent.
pub async fn poll_until<T, U, Q, Fut, P>(policy: RetryPolicy, mut query: Q, mut pick: P) -> Option<T>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<U>>,
    P: FnMut(U) -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.interval).await;
        }
        match query().await {
            Ok(value) => {
                if let Some(hit) = pick(value) {
                    debug!("poll satisfied on round {}/{}", attempt, policy.max_attempts);
                    return Some(hit);
                }
            }
            Err(e) => {
                warn!(
                    "query failed on round {}/{}: {}",
                    attempt, policy.max_attempts, e
                );
            }
        }
    }
    None
}

/// Select a feed confirmed as publishing: the hinted participant when
/// the server reports it active, otherwise any confirmed publisher (a
/// confirmed-active stream beats a not-yet-active hint).
pub fn pick_active(
    participants: &[Participant],
    hint: Option<ParticipantId>,
) -> Option<ParticipantId> {
    if let Some(hint) = hint {
        if participants.iter().any(|p| p.id == hint && p.publisher) {
            return Some(hint);
        }
    }
    participants.iter().find(|p| p.publisher).map(|p| p.id)
}

/// Resolve a feed currently confirmed as publishing in `room`,
/// tolerating the joined-but-not-yet-active race.
pub async fn resolve_active_feed(
    channel: &RoomChannel,
    room: RoomId,
    hint: Option<ParticipantId>,
    policy: RetryPolicy,
) -> Result<ParticipantId> {
    let feed = poll_until(
        policy,
        || channel.list_participants(room),
        |participants| pick_active(&participants, hint),
    )
    .await;

    match feed {
        Some(feed) => {
            debug!("resolved active feed {} in room {}", feed, room);
            Ok(feed)
        }
        None => Err(ClientError::NoActivePublisher(room)),
    }
}
