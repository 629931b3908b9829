//! # Core Module
//!
//! This module provides the fundamental building blocks shared by every other part
//! of the voxel world: the thread-safe resource container, the error type, logging
//! bootstrap and configuration.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `Error` / `Result`: Crate-wide error type for I/O, persistence and configuration failures
//! - `WorldConfig`: Seed, streaming distances, worker count and generator thresholds
//! - `logging::init`: `env_logger` setup used by the binary and by embedders
//!
//! ## Usage
//! ```ignore
//! use voxel_world::core::{MtResource, WorldConfig};
//!
//! voxel_world::core::logging::init();
//!
//! let config = WorldConfig::from_json_str(r#"{ "seed": 7 }"#)?;
//! let counter = MtResource::new(0);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod mt_resource;

// Re-export types for easier access
pub use config::{NoiseParams, StructureConfig, TerrainConfig, WorldConfig};
pub use error::{Error, Result};
pub use mt_resource::MtResource;
