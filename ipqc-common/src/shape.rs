//! Default observation shapes
//!
//! Each line-dependent parameter declares a [`ShapeKind`]. Given the units
//! (or stringer topology) resolved for the active line, the builders here
//! produce the empty value tree the operator fills in. All leaves start as
//! the empty string and every call returns a fresh, identical tree.

use crate::error::ShapeError;
use crate::observation::{ObservationMap, ObservationSlot, ObservationValue};
use crate::registry::{ResolvedUnits, StringerTopology};

/// Slot key used by parameters whose whole grid lives in one slot
pub const COMBINED_SLOT: &str = "Combined";

/// Samples drawn per unit for sampled inspections
pub const SAMPLES: &[&str] = &[
    "Sample-1", "Sample-2", "Sample-3", "Sample-4", "Sample-5", "Sample-6",
];

/// Readings every two hours across an eight hour shift
pub const TWO_HOURLY: &[&str] = &["2hrs", "4hrs", "6hrs", "8hrs"];

/// Readings at mid-shift and end of shift
pub const FOUR_HOURLY: &[&str] = &["4hrs", "8hrs"];

/// Reading at shift start plus mid-shift
pub const SHIFT_AND_FOUR_HOURLY: &[&str] = &["shift", "4hrs"];

/// Reading once per shift
pub const ONCE_PER_SHIFT: &[&str] = &["shift"];

/// Soldering heads on each stringer
pub const STRINGER_UNITS: &[&str] = &["Unit A", "Unit B"];

/// Temperature zones recorded per stringer head
pub const TEMPERATURE_FIELDS: &[&str] = &[
    "preheat1",
    "preheat2",
    "preheat3",
    "soldering",
    "holding1",
    "holding2",
    "cooling1",
    "cooling2",
    "cooling3",
    "irLamp",
    "bottomPlate",
];

/// Ribbon sides sampled for peel strength
pub const PEEL_SIDES: &[&str] = &["Front", "Back"];

/// Pull positions per ribbon side
pub const PEEL_POSITIONS: u32 = 20;

/// Light sensors under each stringer head
pub const LIGHT_SENSORS: u32 = 21;

/// Solder time field recorded next to the light sensors
pub const SOLDER_TIME_FIELD: &str = "solderTime";

/// How unit-by-field keys are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLayout {
    /// One slot per `"<unit>-<field>"` key
    Composite,
    /// One slot per unit holding a `{field: ""}` map
    Nested,
}

/// Grid keyed by the line's flat unit list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitShape {
    /// One leaf per unit
    PerUnit,
    /// One leaf per (unit, field)
    Fields {
        fields: &'static [&'static str],
        layout: FieldLayout,
    },
    /// Unit → time slot
    TimeSlots(&'static [&'static str]),
    /// Unit → sample → time slot
    SampleTimeSlots(&'static [&'static str]),
}

/// Grid keyed by the stage-5 stringer topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringerShape {
    /// Stringer → Unit A/B
    Units,
    /// Stringer → Unit A/B → temperature zone
    Temperatures,
    /// Stringer → Front/Back → position 1..=20
    PeelStrength,
    /// Stringer → Unit A/B → solder time + light sensors 1..=21
    LightSensors,
}

/// Generation algorithm for a line-dependent parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Unit(UnitShape),
    Stringer(StringerShape),
}

impl ShapeKind {
    /// Whether the shape is keyed by the stage-5 stringer topology
    pub fn is_topology_driven(&self) -> bool {
        matches!(self, ShapeKind::Stringer(_))
    }
}

/// Key for one stringer in topology-driven grids
pub fn stringer_key(id: u32) -> String {
    format!("Stringer-{}", id)
}

/// Top-level entries for a shape, in unit/report order
///
/// Topology-driven shapes yield a single [`COMBINED_SLOT`] entry holding
/// the whole grid; every other shape yields one entry per top-level key.
pub fn build_entries(
    kind: &ShapeKind,
    resolved: &ResolvedUnits,
) -> Result<Vec<(String, ObservationValue)>, ShapeError> {
    match (kind, resolved) {
        (ShapeKind::Stringer(shape), ResolvedUnits::Topology(topology)) => Ok(vec![(
            COMBINED_SLOT.to_string(),
            build_stringer_grid(shape, topology),
        )]),
        (ShapeKind::Unit(shape), ResolvedUnits::Units(units)) => {
            Ok(build_unit_entries(shape, units))
        }
        (ShapeKind::Stringer(_), ResolvedUnits::Units(_)) => Err(ShapeError::TopologyRequired),
        (ShapeKind::Unit(_), ResolvedUnits::Topology(_)) => Err(ShapeError::UnitListRequired),
    }
}

/// Whole default value as one node
pub fn build_default(
    kind: &ShapeKind,
    resolved: &ResolvedUnits,
) -> Result<ObservationValue, ShapeError> {
    Ok(ObservationValue::Node(
        build_entries(kind, resolved)?.into_iter().collect(),
    ))
}

/// Default slots for a parameter, one per top-level key
pub fn build_slots(
    kind: &ShapeKind,
    resolved: &ResolvedUnits,
) -> Result<Vec<ObservationSlot>, ShapeError> {
    Ok(build_entries(kind, resolved)?
        .into_iter()
        .map(|(key, value)| ObservationSlot::new(key, value))
        .collect())
}

fn build_unit_entries(shape: &UnitShape, units: &[String]) -> Vec<(String, ObservationValue)> {
    match shape {
        UnitShape::PerUnit => units
            .iter()
            .map(|unit| (unit.clone(), ObservationValue::empty()))
            .collect(),
        UnitShape::Fields {
            fields,
            layout: FieldLayout::Composite,
        } => units
            .iter()
            .flat_map(|unit| {
                fields
                    .iter()
                    .map(move |field| (format!("{}-{}", unit, field), ObservationValue::empty()))
            })
            .collect(),
        UnitShape::Fields {
            fields,
            layout: FieldLayout::Nested,
        } => units
            .iter()
            .map(|unit| (unit.clone(), ObservationValue::empty_node(fields.iter().copied())))
            .collect(),
        UnitShape::TimeSlots(slots) => units
            .iter()
            .map(|unit| (unit.clone(), ObservationValue::empty_node(slots.iter().copied())))
            .collect(),
        UnitShape::SampleTimeSlots(slots) => units
            .iter()
            .map(|unit| {
                let samples: ObservationMap = SAMPLES
                    .iter()
                    .map(|sample| {
                        (
                            sample.to_string(),
                            ObservationValue::empty_node(slots.iter().copied()),
                        )
                    })
                    .collect();
                (unit.clone(), ObservationValue::Node(samples))
            })
            .collect(),
    }
}

fn build_stringer_grid(shape: &StringerShape, topology: &StringerTopology) -> ObservationValue {
    let per_stringer = || match shape {
        StringerShape::Units => ObservationValue::empty_node(STRINGER_UNITS.iter().copied()),
        StringerShape::Temperatures => per_unit(|| {
            ObservationValue::empty_node(TEMPERATURE_FIELDS.iter().copied())
        }),
        StringerShape::PeelStrength => ObservationValue::Node(
            PEEL_SIDES
                .iter()
                .map(|side| {
                    (
                        side.to_string(),
                        ObservationValue::empty_node((1..=PEEL_POSITIONS).map(|n| n.to_string())),
                    )
                })
                .collect(),
        ),
        StringerShape::LightSensors => per_unit(|| {
            ObservationValue::empty_node(
                std::iter::once(SOLDER_TIME_FIELD.to_string())
                    .chain((1..=LIGHT_SENSORS).map(|n| format!("sensor{}", n))),
            )
        }),
    };

    ObservationValue::Node(
        topology
            .stringers
            .iter()
            .map(|id| (stringer_key(*id), per_stringer()))
            .collect(),
    )
}

fn per_unit(fields: impl Fn() -> ObservationValue) -> ObservationValue {
    ObservationValue::Node(
        STRINGER_UNITS
            .iter()
            .map(|unit| (unit.to_string(), fields()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(labels: &[&str]) -> ResolvedUnits {
        ResolvedUnits::Units(labels.iter().map(|s| s.to_string()).collect())
    }

    fn topology() -> ResolvedUnits {
        ResolvedUnits::Topology(StringerTopology {
            stringers: vec![1, 2],
            top_half: vec![1],
            bottom_half: vec![2],
        })
    }

    #[test]
    fn test_per_unit() {
        let value = build_default(&ShapeKind::Unit(UnitShape::PerUnit), &units(&["Line-3", "Line-4"])).unwrap();
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            serde_json::json!({"Line-3": "", "Line-4": ""})
        );
    }

    #[test]
    fn test_composite_fields_preserve_unit_then_field_order() {
        let kind = ShapeKind::Unit(UnitShape::Fields {
            fields: &["supplier", "type"],
            layout: FieldLayout::Composite,
        });
        let keys: Vec<String> = build_entries(&kind, &units(&["Line-1", "Line-2"]))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["Line-1-supplier", "Line-1-type", "Line-2-supplier", "Line-2-type"]);
    }

    #[test]
    fn test_sample_grid_depth() {
        let value =
            build_default(&ShapeKind::Unit(UnitShape::SampleTimeSlots(FOUR_HOURLY)), &units(&["Line-3"])).unwrap();
        assert_eq!(value.depth(), 3);
        assert_eq!(value.get("Line-3").unwrap().as_node().unwrap().len(), 6);
        assert!(value.get_path(&["Line-3", "Sample-6", "8hrs"]).is_some());
    }

    #[test]
    fn test_stringer_grids() {
        let entries = build_entries(&ShapeKind::Stringer(StringerShape::LightSensors), &topology()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, COMBINED_SLOT);
        let unit_a = entries[0].1.get_path(&["Stringer-2", "Unit A"]).unwrap();
        assert_eq!(unit_a.as_node().unwrap().len(), 22);

        let peel = build_default(&ShapeKind::Stringer(StringerShape::PeelStrength), &topology()).unwrap();
        let front = peel.get_path(&[COMBINED_SLOT, "Stringer-1", "Front"]).unwrap();
        assert_eq!(front.as_node().unwrap().len(), 20);

        let temps = build_default(&ShapeKind::Stringer(StringerShape::Temperatures), &topology()).unwrap();
        let zones = temps.get_path(&[COMBINED_SLOT, "Stringer-1", "Unit B"]).unwrap();
        assert_eq!(zones.as_node().unwrap().len(), 11);
    }

    #[test]
    fn test_topology_shape_without_topology_is_error() {
        assert_eq!(
            build_entries(&ShapeKind::Stringer(StringerShape::Units), &units(&["Line-1"])),
            Err(ShapeError::TopologyRequired)
        );
    }

    #[test]
    fn test_unit_shape_with_topology_is_error() {
        assert_eq!(
            build_entries(&ShapeKind::Unit(UnitShape::PerUnit), &topology()),
            Err(ShapeError::UnitListRequired)
        );
        assert_eq!(
            build_default(&ShapeKind::Unit(UnitShape::TimeSlots(FOUR_HOURLY)), &topology()),
            Err(ShapeError::UnitListRequired)
        );
    }

    #[test]
    fn test_builders_are_repeatable() {
        let kind = ShapeKind::Unit(UnitShape::TimeSlots(TWO_HOURLY));
        let first = build_default(&kind, &units(&["Line-1"])).unwrap();
        let second = build_default(&kind, &units(&["Line-1"])).unwrap();
        assert_eq!(first, second);
    }
}
