// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine identifier and the record read back from the `machine:{id}:info`
//! hash (§3.3). Read-only here, like [`crate::worker`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash_codec::{self, HashDecodeError};

crate::define_id! {
    /// Unique identifier for a machine instance.
    pub struct MachineId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Starting,
    Ready,
    Offline,
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MachineStatus::Starting => "starting",
            MachineStatus::Ready => "ready",
            MachineStatus::Offline => "offline",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: MachineId,
    pub status: MachineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ram_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

impl Machine {
    /// Decodes a `machine:{id}:info` hash (§3.3, §6.3).
    pub fn from_hash(machine_id: &str, hash: &HashMap<String, String>) -> Result<Self, HashDecodeError> {
        Ok(Self {
            machine_id: MachineId::new(machine_id.to_string()),
            status: hash_codec::require_enum(hash, "status")?,
            hostname: hash_codec::opt_string(hash, "hostname"),
            os: hash_codec::opt_string(hash, "os"),
            cpu_cores: hash_codec::opt_u32(hash, "cpu_cores")?,
            total_ram_gb: hash_codec::opt_f64(hash, "total_ram_gb")?,
            gpu_count: hash_codec::opt_u32(hash, "gpu_count")?,
            gpu_models: hash_codec::opt_string_list(hash, "gpu_models")?,
            started_at: hash_codec::opt_string(hash, "started_at"),
            last_activity: hash_codec::opt_string(hash, "last_activity"),
        })
    }

    /// Encodes this record's mutable fields back to hash fields, used when
    /// the Admin Reconciler corrects a machine's status during a snapshot
    /// pass (§4.F).
    pub fn status_hash_fields(status: MachineStatus, last_activity: &str) -> Vec<(String, String)> {
        vec![
            ("status".to_string(), status.to_string()),
            ("last_activity".to_string(), last_activity.to_string()),
        ]
    }
}

/// Classification buckets for a `machine_startup_step` event (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupStepBucket {
    SharedSetup,
    CoreInfrastructure,
    AiServices,
    SupportingServices,
}

/// Classifies a startup step name into one of the four buckets by
/// string-prefix rule (§4.H). Falls back to `SupportingServices` for
/// anything unrecognized, since the spec names only these four buckets and
/// requires every step to land in one.
pub fn classify_startup_step(step_name: &str) -> StartupStepBucket {
    if step_name.starts_with("shared_setup") || step_name.starts_with("shared-setup") {
        StartupStepBucket::SharedSetup
    } else if step_name.starts_with("core_infrastructure") || step_name.starts_with("core-infrastructure")
    {
        StartupStepBucket::CoreInfrastructure
    } else if step_name.starts_with("ai_services") || step_name.starts_with("ai-services") {
        StartupStepBucket::AiServices
    } else {
        StartupStepBucket::SupportingServices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        assert_eq!(
            classify_startup_step("shared_setup_network"),
            StartupStepBucket::SharedSetup
        );
        assert_eq!(
            classify_startup_step("core_infrastructure_db"),
            StartupStepBucket::CoreInfrastructure
        );
        assert_eq!(
            classify_startup_step("ai_services_model_load"),
            StartupStepBucket::AiServices
        );
    }

    #[test]
    fn falls_back_to_supporting_services() {
        assert_eq!(
            classify_startup_step("mystery_step"),
            StartupStepBucket::SupportingServices
        );
    }
}
