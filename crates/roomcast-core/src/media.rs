//! Opaque media stream handles
//!
//! The client never touches raw media; capture and rendering live with
//! an external collaborator. What negotiation needs is an aggregate it
//! can append tracks to as they arrive, an "active" condition (at least
//! one live track), and a way to stop everything on teardown.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// A single media track handle.
///
/// Live until stopped; stopping is idempotent.
#[derive(Debug)]
pub struct MediaTrack {
    id: String,
    kind: MediaKind,
    live: AtomicBool,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            live: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Clonable aggregate of media tracks.
///
/// Clones share the same underlying track set, so the attachment's
/// event task and the caller observe one aggregate.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Arc<RwLock<Vec<Arc<MediaTrack>>>>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_track(&self, track: Arc<MediaTrack>) {
        self.tracks.write().push(track);
    }

    pub fn tracks(&self) -> Vec<Arc<MediaTrack>> {
        self.tracks.read().clone()
    }

    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }

    /// At least one track is still live.
    pub fn is_active(&self) -> bool {
        self.tracks.read().iter().any(|t| t.is_live())
    }

    /// Stop every track and empty the aggregate. Idempotent; safe to
    /// call on every cleanup delivery.
    pub fn stop_all(&self) {
        let mut tracks = self.tracks.write();
        for track in tracks.iter() {
            track.stop();
        }
        tracks.clear();
    }
}
