//! Host-environment descriptors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::HostEnvResolver;

/// Description of the host a session runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEnv {
    /// SDK name.
    pub sdk_name: String,
    /// SDK version.
    pub sdk_version: String,
    /// Operating-system family (e.g. `linux`). Absent when opted out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// CPU architecture (e.g. `x86_64`). Absent when opted out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Arbitrary extra fields a resolver wants to report.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl HostEnv {
    /// Minimal descriptor carrying only SDK identification.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            sdk_name: env!("CARGO_PKG_NAME").to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            os: None,
            arch: None,
            extra: HashMap::new(),
        }
    }
}

/// Resolver reporting the compile-time target and SDK version.
#[derive(Debug, Default, Clone)]
pub struct SystemHostEnv;

impl HostEnvResolver for SystemHostEnv {
    fn fingerprint(&self, opted_out: bool) -> HostEnv {
        let mut env = HostEnv::minimal();
        if !opted_out {
            env.os = Some(std::env::consts::OS.to_string());
            env.arch = Some(std::env::consts::ARCH.to_string());
        }
        env
    }
}
