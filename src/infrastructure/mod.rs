//! Infrastructure layer module
//!
//! This module contains the adapters and external integrations:
//! - kube-rs cluster state provider and credential resolution
//! - Filesystem and in-memory manifest sources
//! - Configuration management
//! - Logging infrastructure and the scenario log channel
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod cluster;
pub mod config;
pub mod logging;
pub mod manifests;
