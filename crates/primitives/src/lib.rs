//! Shared types of the contract engine: identifiers, keys and key ranges, the
//! ordered region map, contracts, replica acks and table configuration.

pub mod ack;
pub mod config;
pub mod contract;
pub mod hash;
pub mod id;
pub mod region;
pub mod region_map;
pub mod version;

pub use ack::{AckError, AckState, ContractAck, RegionAck};
pub use config::{ConfigError, ShardConfig, TableConfig};
pub use contract::{Contract, InvariantViolation, Primary};
pub use id::{BranchId, ContractId, ServerId};
pub use region::{KeyRange, RegionError, RightBound, StoreKey};
pub use region_map::{RegionMap, RegionMapError};
pub use version::{StateTimestamp, Version};
