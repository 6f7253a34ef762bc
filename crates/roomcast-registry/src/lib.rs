//! Roomcast Mountpoint Registry
//!
//! A mountpoint advertises that a given room/publisher pair has an
//! active stream. This crate provides:
//! - [`MountpointStore`] - serialized in-memory table with a monotonic,
//!   never-reused id sequence
//! - [`RegistryServer`] - HTTP REST API over the store
//! - [`RegistryClient`] - HTTP client speaking the same envelope
//! - [`MountpointRegistry`] - the capability trait both implement, so
//!   negotiation code takes an injected registry
//!
//! ## Protocol
//!
//! - `GET /mountpoints` → `{ success, data: [..], count }`
//! - `POST /mountpoints` body `{ description, roomId?, publisherId? }`
//!   → `201 { success, data }`; `400` when description is missing
//! - `DELETE /mountpoints?id=<int>` → `{ success, data }`; `400` on a
//!   missing or non-numeric id, `404` when no record matches

pub mod client;
pub mod error;
pub mod server;
pub mod store;

pub use client::RegistryClient;
pub use error::{RegistryError, Result};
pub use server::RegistryServer;
pub use store::{CreateMountpoint, Mountpoint, MountpointStore};

use async_trait::async_trait;

/// Registry capability consumed by the negotiation state machine.
#[async_trait]
pub trait MountpointRegistry: Send + Sync {
    async fn create(&self, request: CreateMountpoint) -> Result<Mountpoint>;
    async fn list(&self) -> Result<Vec<Mountpoint>>;
    async fn delete(&self, id: u64) -> Result<Mountpoint>;
}
