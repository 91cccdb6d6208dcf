//! Orchestrator settings, deserialized from the `[orchestrator]` table.

use std::collections::BTreeMap;

use fleetgrid_control::HardwareSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Prepended to image names unless the caller asks for an exact reference.
    pub registry_prefix: String,
    /// Resource shape for Kubernetes-style containers.
    pub hardware: HardwareSpec,
    /// Tenant key (`tokens/{name}` or `users/{id}`) → pre-provisioned namespace.
    pub fixed_namespaces: BTreeMap<String, String>,
}

impl OrchestratorConfig {
    /// Full image reference for `image`.
    pub fn image_ref(&self, image: &str, exact: bool) -> String {
        if exact {
            image.to_string()
        } else {
            format!("{}{}", self.registry_prefix, image)
        }
    }
}
