//! In-memory mountpoint table

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use roomcast_core::{time, ParticipantId, RoomId};

use crate::error::{RegistryError, Result};
use crate::MountpointRegistry;

/// A discoverability record advertising an active room/publisher pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mountpoint {
    pub id: u64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<ParticipantId>,
    /// Creation time, unix microseconds.
    pub created_at: u64,
}

/// Creation request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMountpoint {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<ParticipantId>,
}

impl CreateMountpoint {
    pub fn new(
        description: impl Into<String>,
        room_id: Option<RoomId>,
        publisher_id: Option<ParticipantId>,
    ) -> Self {
        Self {
            description: description.into(),
            room_id,
            publisher_id,
        }
    }
}

struct StoreInner {
    mountpoints: Vec<Mountpoint>,
    next_id: u64,
}

/// Serialized-access mountpoint table.
///
/// Ids are strictly increasing and never reused within the process
/// lifetime, even across deletions.
pub struct MountpointStore {
    inner: Mutex<StoreInner>,
}

impl MountpointStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                mountpoints: Vec::new(),
                next_id: 1,
            }),
        }
    }

    pub fn create(&self, request: CreateMountpoint) -> Result<Mountpoint> {
        if request.description.is_empty() {
            return Err(RegistryError::MissingDescription);
        }

        let mut inner = self.inner.lock();
        let mountpoint = Mountpoint {
            id: inner.next_id,
            description: request.description,
            room_id: request.room_id,
            publisher_id: request.publisher_id,
            created_at: time::now(),
        };
        inner.next_id += 1;
        inner.mountpoints.push(mountpoint.clone());

        debug!(
            "created mountpoint {} ({})",
            mountpoint.id, mountpoint.description
        );
        Ok(mountpoint)
    }

    pub fn list(&self) -> Vec<Mountpoint> {
        self.inner.lock().mountpoints.clone()
    }

    pub fn delete(&self, id: u64) -> Result<Mountpoint> {
        let mut inner = self.inner.lock();
        let index = inner
            .mountpoints
            .iter()
            .position(|mp| mp.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        let deleted = inner.mountpoints.remove(index);
        debug!("deleted mountpoint {} ({})", deleted.id, deleted.description);
        Ok(deleted)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().mountpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().mountpoints.is_empty()
    }
}

impl Default for MountpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MountpointRegistry for MountpointStore {
    async fn create(&self, request: CreateMountpoint) -> Result<Mountpoint> {
        MountpointStore::create(self, request)
    }

    async fn list(&self) -> Result<Vec<Mountpoint>> {
        Ok(MountpointStore::list(self))
    }

    async fn delete(&self, id: u64) -> Result<Mountpoint> {
        MountpointStore::delete(self, id)
    }
}
