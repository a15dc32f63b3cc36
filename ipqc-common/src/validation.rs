//! Advisory checks on recorded readings
//!
//! The checksheet records out-of-spec readings rather than rejecting them.
//! Rules here only classify a reading so a front end can colour it; nothing
//! in the save or export path consults them.

use serde::Serialize;

use crate::catalog;
use crate::observation::ObservationValue;
use crate::record::AuditRecord;
use crate::stage::StageDefinition;

/// Advisory acceptance rule for a parameter's leaf readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvisoryRule {
    /// Inclusive numeric range
    Range { min: f64, max: f64 },
    /// Numeric lower bound (inclusive)
    AtLeast(f64),
    /// Numeric upper bound (inclusive)
    AtMost(f64),
    /// Accepted status words (case-insensitive)
    OneOf(&'static [&'static str]),
}

/// Classification of one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    /// Nothing entered yet
    Empty,
    WithinSpec,
    OutOfSpec,
    /// A numeric rule met text that is not a number
    Unparseable,
}

/// Classify one leaf reading against a rule
pub fn assess(rule: &AdvisoryRule, reading: &str) -> Assessment {
    let reading = reading.trim();
    if reading.is_empty() {
        return Assessment::Empty;
    }

    let number = reading.parse::<f64>().ok().filter(|v| v.is_finite());
    let within = match (rule, number) {
        (AdvisoryRule::OneOf(accepted), _) => {
            accepted.iter().any(|a| a.eq_ignore_ascii_case(reading))
        }
        (_, None) => return Assessment::Unparseable,
        (AdvisoryRule::Range { min, max }, Some(value)) => value >= *min && value <= *max,
        (AdvisoryRule::AtLeast(min), Some(value)) => value >= *min,
        (AdvisoryRule::AtMost(max), Some(value)) => value <= *max,
    };

    if within {
        Assessment::WithinSpec
    } else {
        Assessment::OutOfSpec
    }
}

/// One reading that did not meet its advisory rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub stage_id: u32,
    pub parameter_id: String,
    pub slot_key: String,
    /// Key path below the slot value (empty for leaf slots)
    pub path: Vec<String>,
    pub reading: String,
    pub assessment: Assessment,
    pub criteria: String,
}

/// Every out-of-spec or unparseable reading in the given stages
///
/// Fields computed by a derived rule (the potting ratio) are skipped; they
/// are not operator readings.
pub fn assess_stages(stages: &[StageDefinition]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for stage in stages {
        for parameter in &stage.parameters {
            let Some(spec) = catalog::parameter_spec(stage.id, &parameter.id) else {
                continue;
            };
            let Some(rule) = spec.advisory.as_ref() else {
                continue;
            };

            for slot in &parameter.observations {
                for (path, reading) in slot.value.leaves() {
                    if is_derived_field(spec, &path) {
                        continue;
                    }
                    let assessment = assess(rule, reading);
                    if matches!(assessment, Assessment::OutOfSpec | Assessment::Unparseable) {
                        findings.push(Finding {
                            stage_id: stage.id,
                            parameter_id: parameter.id.clone(),
                            slot_key: slot.slot_key.clone(),
                            path,
                            reading: reading.to_string(),
                            assessment,
                            criteria: parameter.criteria.clone(),
                        });
                    }
                }
            }
        }
    }

    findings
}

/// Findings for a whole record
pub fn assess_record(record: &AuditRecord) -> Vec<Finding> {
    assess_stages(&record.stages)
}

fn is_derived_field(spec: &catalog::ParameterSpec, path: &[String]) -> bool {
    match (&spec.derived, path.last()) {
        (Some(crate::ratio::DerivedRule::MixingRatio(fields)), Some(last)) => last == fields.ratio,
        _ => false,
    }
}

/// Classification of a single slot value's leaves, keyed by path
pub fn assess_value(rule: &AdvisoryRule, value: &ObservationValue) -> Vec<(Vec<String>, Assessment)> {
    value
        .leaves()
        .into_iter()
        .map(|(path, reading)| (path, assess(rule, reading)))
        .collect()
}
