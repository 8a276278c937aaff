mod client;
mod memory;
mod store;

pub use client::{
    ConnectionParams, DiskClient, Resource, ResourceList, ResourceType, TransferLink,
};
pub use memory::{MemoryStore, StoreOp};
pub use store::{ApiErrorClass, EntryKind, RemoteEntry, RemoteStore, StoreError};
