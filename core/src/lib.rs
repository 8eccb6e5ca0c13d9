//! shardmap-core: the B+ tree ordered map, partition engine, record codec,
//! wire protocol, and ambient logging/error/channel types shared by the
//! `peer`, `router`, and `client` binaries.

pub mod arena;
pub mod channel;
pub mod client_stub;
pub mod error;
pub mod logging;
pub mod ordermap;
pub mod partition;
pub mod protocol;
pub mod record;
pub mod router;
pub mod storage_peer;

pub use client_stub::ClientStub;
pub use ordermap::OrderedMap;
pub use partition::PartitionEngine;
pub use record::{Record, RecordCodec};
pub use router::Router;
pub use storage_peer::StoragePeer;
