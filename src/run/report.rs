//! Typed executor report and run status classification.

use serde::{Deserialize, Serialize};

use super::executor::ExecutionEnvelope;
use super::RunStatus;

/// The executor's structured report. A well-formed report is a list of
/// feature entries; anything else the executor emits is kept opaque so the
/// raw document can still be persisted and forwarded.
///
/// Fields the classifier does not care about are collected into the
/// flattened `extra` maps so the document survives a round trip unchanged.
///
/// Parsing is all-or-nothing: an array whose entries carry wrong-typed
/// inner fields (say, a non-array `elements`) lands in `Other` as a whole
/// and classifies as `COMPLETED`, not as a partially parsed feature list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Features(Vec<FeatureEntry>),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ScenarioEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<StepEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<StepEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A step or a before/after hook; both carry the same result shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StepEntry {
    fn status_is(&self, wanted: &str) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.status.as_deref())
            .is_some_and(|s| s.eq_ignore_ascii_case(wanted))
    }
}

/// Classify one execution attempt.
///
/// Failure detection dominates and short-circuits; undefined/pending is a
/// softer signal checked only after the full scan confirms no failure, so an
/// undefined step is never hidden behind a passing scenario.
pub fn resolve_status(envelope: Option<&ExecutionEnvelope>) -> RunStatus {
    let Some(envelope) = envelope else {
        return RunStatus::Failed;
    };

    if envelope
        .error
        .as_deref()
        .is_some_and(|e| !e.trim().is_empty())
    {
        return RunStatus::Failed;
    }

    let Some(Report::Features(features)) = &envelope.report else {
        // The executor ran but produced no structured report.
        return RunStatus::Completed;
    };

    let mut any_undefined = false;
    for feature in features {
        for scenario in &feature.elements {
            let failed = scenario.steps.iter().any(|s| s.status_is("failed"))
                || scenario.before.iter().any(|h| h.status_is("failed"))
                || scenario.after.iter().any(|h| h.status_is("failed"));
            if failed {
                return RunStatus::Failed;
            }
            any_undefined = any_undefined
                || scenario
                    .steps
                    .iter()
                    .any(|s| s.status_is("undefined") || s.status_is("pending"));
        }
    }

    if any_undefined {
        RunStatus::Undefined
    } else {
        RunStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_with_report(report: serde_json::Value) -> ExecutionEnvelope {
        ExecutionEnvelope {
            report: Some(serde_json::from_value(report).unwrap()),
            ..Default::default()
        }
    }

    fn step(status: &str) -> serde_json::Value {
        serde_json::json!({ "result": { "status": status } })
    }

    #[test]
    fn absent_envelope_is_failed() {
        assert_eq!(resolve_status(None), RunStatus::Failed);
    }

    #[test]
    fn error_text_dominates_passing_report() {
        let mut env = envelope_with_report(serde_json::json!([
            { "elements": [ { "steps": [step("passed")] } ] }
        ]));
        env.error = Some("runner exploded".into());
        assert_eq!(resolve_status(Some(&env)), RunStatus::Failed);
    }

    #[test]
    fn blank_error_is_ignored() {
        let mut env = envelope_with_report(serde_json::json!([
            { "elements": [ { "steps": [step("passed")] } ] }
        ]));
        env.error = Some("   ".into());
        assert_eq!(resolve_status(Some(&env)), RunStatus::Passed);
    }

    #[test]
    fn missing_report_is_completed() {
        let env = ExecutionEnvelope {
            stdout: Some("ok".into()),
            ..Default::default()
        };
        assert_eq!(resolve_status(Some(&env)), RunStatus::Completed);
    }

    #[test]
    fn non_array_report_is_completed() {
        let env = envelope_with_report(serde_json::json!({ "summary": "n/a" }));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Completed);

        let env = envelope_with_report(serde_json::json!(["not", "features"]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Completed);
    }

    #[test]
    fn wrong_typed_feature_fields_demote_the_whole_report_to_opaque() {
        let env = envelope_with_report(serde_json::json!([ { "elements": 5 } ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Completed);
    }

    #[test]
    fn any_failed_step_fails_the_run() {
        // The failure sits behind a fully undefined scenario and must still win.
        let env = envelope_with_report(serde_json::json!([
            { "elements": [ { "steps": [step("undefined"), step("undefined")] } ] },
            { "elements": [ { "steps": [step("passed"), step("FAILED")] } ] }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Failed);
    }

    #[test]
    fn failed_hook_fails_the_run() {
        let env = envelope_with_report(serde_json::json!([
            { "elements": [ {
                "before": [step("failed")],
                "steps": [step("passed")]
            } ] }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Failed);

        let env = envelope_with_report(serde_json::json!([
            { "elements": [ {
                "steps": [step("passed")],
                "after": [step("failed")]
            } ] }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Failed);
    }

    #[test]
    fn pending_without_failure_is_undefined() {
        let env = envelope_with_report(serde_json::json!([
            { "elements": [ { "steps": [step("passed"), step("pending")] } ] },
            { "elements": [ { "steps": [step("passed")] } ] }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Undefined);
    }

    #[test]
    fn all_passed_is_passed() {
        let env = envelope_with_report(serde_json::json!([
            { "elements": [ { "steps": [step("passed"), step("Passed")] } ] }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Passed);
    }

    #[test]
    fn empty_report_array_is_passed() {
        let env = envelope_with_report(serde_json::json!([]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Passed);
    }

    #[test]
    fn report_round_trip_preserves_unknown_fields() {
        let raw = serde_json::json!([
            {
                "keyword": "Feature",
                "name": "Login",
                "uri": "login.feature",
                "elements": [ {
                    "line": 3,
                    "type": "scenario",
                    "steps": [ {
                        "keyword": "Given ",
                        "name": "a user",
                        "result": { "status": "passed", "duration": 120 }
                    } ]
                } ]
            }
        ]);
        let report: Report = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(report, Report::Features(_)));
        assert_eq!(serde_json::to_value(&report).unwrap(), raw);
    }

    #[test]
    fn scenario_without_steps_is_skipped() {
        let env = envelope_with_report(serde_json::json!([
            { "elements": [ {} ] },
            { "name": "no elements at all" }
        ]));
        assert_eq!(resolve_status(Some(&env)), RunStatus::Passed);
    }
}
