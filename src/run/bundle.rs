//! Bundle assembly: feature selection and step deduplication.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use super::{RunError, RunScope};

/// One feature file or one step-definition file submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl Asset {
    pub fn new(name: Option<&str>, content: &str) -> Self {
        Self {
            name: name.map(str::to_owned),
            content: content.to_owned(),
        }
    }
}

/// The paired feature + step collection sent in one execution request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunBundle {
    #[serde(default)]
    pub features: Vec<Asset>,
    #[serde(default)]
    pub steps: Vec<Asset>,
}

impl RunBundle {
    /// Reject bundles a direct run request must not submit: an empty feature
    /// list, or any asset with blank content. Aggregated service runs skip
    /// this check (a service with no scenarios is a valid empty run).
    pub fn validate(&self) -> Result<(), RunError> {
        if self.features.is_empty() {
            return Err(RunError::Validation(
                "at least one feature is required".into(),
            ));
        }
        for asset in self.features.iter().chain(self.steps.iter()) {
            if asset.content.trim().is_empty() {
                return Err(RunError::Validation(
                    "asset content must not be blank".into(),
                ));
            }
        }
        Ok(())
    }
}

/// The feature/step assets of one stored scenario, in service iteration order.
#[derive(Debug, Clone, Default)]
pub struct ScenarioAssets {
    pub features: Vec<Asset>,
    pub steps: Vec<Asset>,
}

/// Stable content key over trimmed step text. Any well-distributed hash
/// works here; the contract is same content => same key.
fn content_key(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deduplicate step assets by normalized content, keeping the first asset
/// seen per key. Output order is first-seen order.
pub fn dedup_steps<I>(candidates: I) -> Vec<Asset>
where
    I: IntoIterator<Item = Asset>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for asset in candidates {
        if seen.insert(content_key(&asset.content)) {
            out.push(asset);
        }
    }
    out
}

/// Assemble the bundle for a service run.
///
/// Steps: the service-level step library wins if it has any entries;
/// otherwise the union of all per-scenario steps, in scenario order.
/// Features: an explicit non-empty list is used verbatim (scenario run);
/// otherwise every scenario's features are collected (full-service run).
pub fn assemble(
    explicit_features: Option<Vec<Asset>>,
    scenarios: &[ScenarioAssets],
    step_library: &[Asset],
) -> (RunBundle, RunScope) {
    let steps = if !step_library.is_empty() {
        dedup_steps(step_library.iter().cloned())
    } else {
        dedup_steps(scenarios.iter().flat_map(|sc| sc.steps.iter().cloned()))
    };

    let (features, scope) = match explicit_features {
        Some(features) if !features.is_empty() => (features, RunScope::Scenario),
        _ => (
            scenarios
                .iter()
                .flat_map(|sc| sc.features.iter().cloned())
                .collect(),
            RunScope::Service,
        ),
    };

    (RunBundle { features, steps }, scope)
}
