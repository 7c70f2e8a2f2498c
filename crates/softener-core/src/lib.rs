// # softener-core
//
// Core library for a cloud-connected water softener integration.
//
// ## Architecture Overview
//
// - **RemoteClient**: Trait for the cloud service (pulls, push channel, writes)
// - **Coordinator**: Fuses scheduled pulls and pushed updates into one snapshot
// - **Entity**: Data-driven presentation entities reading that snapshot
// - **ClientRegistry**: Plugin-based registry for client implementations
// - **setup** / **diagnostics**: Device discovery and bug-report export
//
// ## Design Principles
//
// 1. **One snapshot**: Every update source replaces the whole device state
// 2. **One channel**: At most one push channel per coordinator, never reopened by itself
// 3. **Plugin-Based**: Clients are registered dynamically, no hard-coded if-else
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod entity;
pub mod error;
pub mod model;
pub mod registry;
pub mod setup;
pub mod traits;

// Re-export core types for convenience
pub use config::{ClientConfig, CoordinatorConfig, Credentials, SoftenerConfig};
pub use coordinator::{ChannelState, Coordinator, Update, UpdateSource};
pub use entity::{Entity, EntitySet, StateValue};
pub use error::{ClientError, Error, Result, SetupError};
pub use model::{DailyUsage, Device, DeviceSummary, ParameterUpdate, ParameterValue};
pub use registry::ClientRegistry;
pub use traits::{PushCallback, RemoteClient, RemoteClientFactory};
