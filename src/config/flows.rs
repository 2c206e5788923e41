//! Flow persistence configuration

use serde::Deserialize;

/// Flow store configuration.
///
/// The relational store is used only by the flow editing surface, never
/// by the core engine. When no URL is configured, flow definitions live
/// in process memory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowStoreConfig {
    /// Optional relational store URL for persisted flow definitions
    #[serde(default)]
    pub database_url: Option<String>,
}
