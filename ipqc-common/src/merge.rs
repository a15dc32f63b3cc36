//! Observation updates
//!
//! Every edit produces a new record. Only the stage, parameter and slot on
//! the path to the edited value are rebuilt; everything else is carried over
//! as-is. An address that matches nothing leaves the record unchanged and
//! never creates entries.
//!
//! Values are not checked against the shape the stage factory built. The
//! caller supplies whatever shape it edits, which lets records saved under a
//! different line keep their keys.

use tracing::trace;

use crate::catalog;
use crate::observation::ObservationValue;
use crate::ratio::{compute_mixing_ratio, DerivedRule};
use crate::record::AuditRecord;
use crate::stage::StageDefinition;

/// Address of one observation slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAddress<'a> {
    pub stage_id: u32,
    pub parameter_id: &'a str,
    pub slot_key: &'a str,
}

impl<'a> SlotAddress<'a> {
    pub fn new(stage_id: u32, parameter_id: &'a str, slot_key: &'a str) -> Self {
        Self {
            stage_id,
            parameter_id,
            slot_key,
        }
    }
}

/// Replace the value of one slot
pub fn update(
    record: &AuditRecord,
    stage_id: u32,
    parameter_id: &str,
    slot_key: &str,
    new_value: ObservationValue,
) -> AuditRecord {
    let address = SlotAddress::new(stage_id, parameter_id, slot_key);
    match update_stages(&record.stages, address, new_value) {
        Some(stages) => AuditRecord {
            stages,
            ..record.clone()
        },
        None => record.clone(),
    }
}

/// Set one leaf inside a slot's value
///
/// Reads the slot's current value, applies the single field change and
/// writes the whole value back. When the parameter carries a derived rule
/// triggered by the edited field, the derived sibling is recomputed in the
/// same update.
pub fn update_field(
    record: &AuditRecord,
    stage_id: u32,
    parameter_id: &str,
    slot_key: &str,
    path: &[&str],
    text: &str,
) -> AuditRecord {
    let Some(current) = record.observation(stage_id, parameter_id, slot_key) else {
        trace!(stage_id, parameter_id, slot_key, "field edit on unknown slot ignored");
        return record.clone();
    };

    let mut value = current.with_field(path, text);
    if let Some((field, parent)) = path.split_last() {
        if let Some(rule) = catalog::parameter_spec(stage_id, parameter_id).and_then(|s| s.derived) {
            if rule.triggered_by(field) {
                value = apply_derived(&rule, value, parent);
            }
        }
    }

    update(record, stage_id, parameter_id, slot_key, value)
}

/// Recompute the derived field next to `parent`
fn apply_derived(rule: &DerivedRule, value: ObservationValue, parent: &[&str]) -> ObservationValue {
    match rule {
        DerivedRule::MixingRatio(fields) => {
            let field_path = |name: &'static str| {
                parent
                    .iter()
                    .copied()
                    .chain(std::iter::once(name))
                    .collect::<Vec<_>>()
            };
            let part_a = value.leaf_at(&field_path(fields.part_a));
            let part_b = value.leaf_at(&field_path(fields.part_b));
            let ratio = compute_mixing_ratio(part_a, part_b);
            value.with_field(&field_path(fields.ratio), ratio)
        }
    }
}

/// Stage list with one slot replaced, or None when the address misses
pub fn update_stages(
    stages: &[StageDefinition],
    address: SlotAddress<'_>,
    new_value: ObservationValue,
) -> Option<Vec<StageDefinition>> {
    let stage_index = stages.iter().position(|s| s.id == address.stage_id)?;
    let stage = &stages[stage_index];
    let param_index = stage
        .parameters
        .iter()
        .position(|p| p.id == address.parameter_id)?;
    let param = &stage.parameters[param_index];
    let slot_index = param
        .observations
        .iter()
        .position(|s| s.slot_key == address.slot_key)?;

    let mut param = param.clone();
    param.observations[slot_index].value = new_value;

    let mut stage = stage.clone();
    stage.parameters[param_index] = param;

    let mut updated = stages.to_vec();
    updated[stage_index] = stage;
    Some(updated)
}
