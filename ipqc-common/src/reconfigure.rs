//! Line reconfiguration
//!
//! Two entry points reconcile stage shapes with a line:
//!
//! - [`reconfigure`] runs when the active line changes. Every stage with a
//!   registry entry is rebuilt for the new line, and readings already
//!   entered are carried into the new shape wherever slot and key paths
//!   still exist. Other stages are returned untouched.
//! - [`merge_loaded_record`] runs when a saved record is loaded. Saved
//!   observation lists replace the fresh ones verbatim for every parameter
//!   id both sides share. Saved data is not reshaped to the fresh line's
//!   units, so a record saved under one line and loaded under another keeps
//!   its original keys; readers treat missing keys as blank.

use tracing::{debug, info};

use crate::line::ProductionLine;
use crate::observation::{ObservationMap, ObservationSlot, ObservationValue};
use crate::registry::StageConfigRegistry;
use crate::stage::{build_all_stages, build_stage, ParameterDefinition, StageDefinition};

/// Rebuild line-dependent stages for `line`
///
/// An empty stage list yields every catalog stage built for the line.
pub fn reconfigure(
    current_stages: &[StageDefinition],
    registry: &StageConfigRegistry,
    line: ProductionLine,
) -> Vec<StageDefinition> {
    if current_stages.is_empty() {
        debug!(%line, "no stages yet, building full checksheet");
        return build_all_stages(registry, line);
    }

    let mut rebuilt = 0usize;
    let stages: Vec<StageDefinition> = current_stages
        .iter()
        .map(|stage| {
            if registry.get_config(stage.id).is_none() {
                return stage.clone();
            }
            match build_stage(registry, stage.id, line) {
                Ok(fresh) => {
                    rebuilt += 1;
                    carry_over(fresh, stage)
                }
                // Stage no longer in the catalog; keep what the record has
                Err(_) => stage.clone(),
            }
        })
        .collect();

    info!(%line, rebuilt, "reconfigured stages for line");
    stages
}

/// Replace fresh observations with saved ones where parameter ids match
pub fn merge_loaded_record(
    fresh_stages: &[StageDefinition],
    saved_stages: &[StageDefinition],
) -> Vec<StageDefinition> {
    fresh_stages
        .iter()
        .map(|fresh| {
            let Some(saved) = saved_stages.iter().find(|s| s.id == fresh.id) else {
                return fresh.clone();
            };
            StageDefinition {
                parameters: fresh
                    .parameters
                    .iter()
                    .map(|param| match saved.parameter(&param.id) {
                        Some(saved_param) => ParameterDefinition {
                            observations: saved_param.observations.clone(),
                            ..param.clone()
                        },
                        None => param.clone(),
                    })
                    .collect(),
                ..fresh.clone()
            }
        })
        .collect()
}

/// Fresh stage with previous readings copied into overlapping slots
fn carry_over(mut fresh: StageDefinition, previous: &StageDefinition) -> StageDefinition {
    for param in &mut fresh.parameters {
        let Some(old) = previous.parameter(&param.id) else {
            continue;
        };
        param.observations = overlay_slots(&param.observations, &old.observations);
    }
    fresh
}

/// `fresh` with leaves taken from `previous` wherever the key path exists in both
///
/// The result always has `fresh`'s shape: keys only `previous` has are
/// dropped, and a leaf/map mismatch keeps the fresh side.
pub fn overlay(fresh: &ObservationValue, previous: &ObservationValue) -> ObservationValue {
    match (fresh, previous) {
        (ObservationValue::Leaf(_), ObservationValue::Leaf(text)) => {
            ObservationValue::Leaf(text.clone())
        }
        (ObservationValue::Node(fresh_map), ObservationValue::Node(old_map)) => {
            let merged: ObservationMap = fresh_map
                .iter()
                .map(|(key, value)| {
                    let value = match old_map.get(key) {
                        Some(old) => overlay(value, old),
                        None => value.clone(),
                    };
                    (key.clone(), value)
                })
                .collect();
            ObservationValue::Node(merged)
        }
        _ => fresh.clone(),
    }
}

/// Overlay applied slot by slot; slots without a previous counterpart stay fresh
pub fn overlay_slots(fresh: &[ObservationSlot], previous: &[ObservationSlot]) -> Vec<ObservationSlot> {
    fresh
        .iter()
        .map(|slot| match previous.iter().find(|p| p.slot_key == slot.slot_key) {
            Some(old) => ObservationSlot::new(slot.slot_key.clone(), overlay(&slot.value, &old.value)),
            None => slot.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{update, update_field};
    use crate::record::AuditRecord;

    #[test]
    fn test_overlay_keeps_fresh_shape() {
        let fresh = ObservationValue::empty_node(["Unit A", "Unit B"]);
        let previous = ObservationValue::empty_node(["Unit A", "Unit C"])
            .with_field(&["Unit A"], "55")
            .with_field(&["Unit C"], "60");
        let merged = overlay(&fresh, &previous);
        assert_eq!(merged.leaf_at(&["Unit A"]), "55");
        assert_eq!(merged.leaf_at(&["Unit B"]), "");
        assert!(merged.get("Unit C").is_none());
    }

    #[test]
    fn test_overlay_mismatch_keeps_fresh() {
        let fresh = ObservationValue::empty_node(["supplier"]);
        assert_eq!(overlay(&fresh, &"old".into()), fresh);
    }

    #[test]
    fn test_reconfigure_empty_builds_everything() {
        let stages = reconfigure(&[], StageConfigRegistry::builtin(), ProductionLine::II);
        assert_eq!(stages.len(), 25);
    }

    #[test]
    fn test_reconfigure_switches_units_and_keeps_line_independent_data() {
        let registry = StageConfigRegistry::builtin();
        let mut record = AuditRecord::for_line(registry, ProductionLine::I, "2026-10-16", "A");
        record = update(&record, 1, "1-1", "4hrs", "24".into());
        record = update(&record, 2, "2-3", "Line-1", "OK".into());

        let stages = reconfigure(&record.stages, registry, ProductionLine::II);
        let glass = stages.iter().find(|s| s.id == 2).unwrap();
        assert_eq!(glass.parameter("2-3").unwrap().slot_keys(), vec!["Line-3", "Line-4"]);

        let env = stages.iter().find(|s| s.id == 1).unwrap();
        assert_eq!(env.parameter("1-1").unwrap().slot("4hrs").unwrap().value.as_leaf(), Some("24"));
    }

    #[test]
    fn test_reconfigure_same_line_keeps_readings() {
        let registry = StageConfigRegistry::builtin();
        let mut record = AuditRecord::for_line(registry, ProductionLine::I, "2026-10-16", "A");
        record = update_field(&record, 5, "5-6", "Combined", &["Stringer-2", "Unit B"], "48");

        let stages = reconfigure(&record.stages, registry, ProductionLine::I);
        assert_eq!(stages, record.stages);
    }
}
