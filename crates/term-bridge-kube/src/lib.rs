//! Kubernetes exec backend.
//!
//! Provides:
//! - `KubeBackend` - Pod lookup and exec over the cluster API
//! - `KubeConfig` - Cluster connection settings

pub mod backend;
pub mod config;
pub mod process;

pub use backend::KubeBackend;
pub use config::{KubeConfig, KubeError};
