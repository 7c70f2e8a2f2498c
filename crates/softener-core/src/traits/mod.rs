//! Core traits for the softener integration
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RemoteClient`]: Authenticated pull requests and the push-update channel
//! - [`RemoteClientFactory`]: Construct clients from configuration

pub mod remote_client;

pub use remote_client::{PushCallback, RemoteClient, RemoteClientFactory};
