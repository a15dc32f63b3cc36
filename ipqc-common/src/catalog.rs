//! Stage catalog
//!
//! The static description of every stage on the checksheet: its
//! parameters, their acceptance criteria, how they are inspected, how their
//! observations are shaped and which advisory rule colours their readings.
//! Table order is report order.

use serde::Serialize;

use crate::ratio::{DerivedRule, MixingRatioFields, POTTING_MIX};
use crate::shape::{
    FieldLayout, ShapeKind, StringerShape, UnitShape, FOUR_HOURLY, ONCE_PER_SHIFT,
    SHIFT_AND_FOUR_HOURLY, TWO_HOURLY,
};
use crate::validation::AdvisoryRule;

/// How a parameter's observations are shaped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterShape {
    /// Same slots on every line; `fields` empty means leaf slots
    Fixed {
        slots: &'static [&'static str],
        fields: &'static [&'static str],
    },
    /// Shape derived from the line's units for this stage
    LineDependent(ShapeKind),
}

/// Input layout a front end uses for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    #[default]
    Text,
    Status,
    FieldGroup,
    TimeSlotGrid,
    SampleGrid,
    StringerGrid,
    RatioCalculator,
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub criteria: &'static str,
    pub inspection_type: &'static str,
    pub frequency: &'static str,
    pub shape: ParameterShape,
    pub renderer: Renderer,
    pub derived: Option<DerivedRule>,
    pub advisory: Option<AdvisoryRule>,
}

/// Static description of one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSpec {
    pub id: u32,
    pub name: &'static str,
    pub parameters: &'static [ParameterSpec],
}

const OK_STATUS: &[&str] = &["OK"];

const fn default_renderer(shape: &ParameterShape) -> Renderer {
    match shape {
        ParameterShape::Fixed { fields, .. } if fields.is_empty() => Renderer::Text,
        ParameterShape::Fixed { .. } => Renderer::FieldGroup,
        ParameterShape::LineDependent(kind) => match kind {
            ShapeKind::Unit(UnitShape::PerUnit) => Renderer::Text,
            ShapeKind::Unit(UnitShape::Fields { .. }) => Renderer::FieldGroup,
            ShapeKind::Unit(UnitShape::TimeSlots(_)) => Renderer::TimeSlotGrid,
            ShapeKind::Unit(UnitShape::SampleTimeSlots(_)) => Renderer::SampleGrid,
            ShapeKind::Stringer(_) => Renderer::StringerGrid,
        },
    }
}

impl ParameterSpec {
    const fn new(
        id: &'static str,
        label: &'static str,
        criteria: &'static str,
        inspection_type: &'static str,
        frequency: &'static str,
        shape: ParameterShape,
    ) -> Self {
        Self {
            id,
            label,
            criteria,
            inspection_type,
            frequency,
            renderer: default_renderer(&shape),
            shape,
            derived: None,
            advisory: None,
        }
    }

    const fn advisory(mut self, rule: AdvisoryRule) -> Self {
        self.advisory = Some(rule);
        self
    }

    const fn status(mut self) -> Self {
        self.advisory = Some(AdvisoryRule::OneOf(OK_STATUS));
        self.renderer = Renderer::Status;
        self
    }

    const fn mixing_ratio(mut self, fields: MixingRatioFields) -> Self {
        self.derived = Some(DerivedRule::MixingRatio(fields));
        self.renderer = Renderer::RatioCalculator;
        self
    }

    pub fn is_line_dependent(&self) -> bool {
        matches!(self.shape, ParameterShape::LineDependent(_))
    }
}

const fn fixed(slots: &'static [&'static str]) -> ParameterShape {
    ParameterShape::Fixed { slots, fields: &[] }
}

const fn fixed_fields(
    slots: &'static [&'static str],
    fields: &'static [&'static str],
) -> ParameterShape {
    ParameterShape::Fixed { slots, fields }
}

const fn per_unit() -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Unit(UnitShape::PerUnit))
}

const fn unit_fields(fields: &'static [&'static str]) -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Unit(UnitShape::Fields {
        fields,
        layout: FieldLayout::Composite,
    }))
}

const fn unit_field_group(fields: &'static [&'static str]) -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Unit(UnitShape::Fields {
        fields,
        layout: FieldLayout::Nested,
    }))
}

const fn unit_slots(slots: &'static [&'static str]) -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Unit(UnitShape::TimeSlots(slots)))
}

const fn unit_samples(slots: &'static [&'static str]) -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Unit(UnitShape::SampleTimeSlots(slots)))
}

const fn stringer_grid(shape: StringerShape) -> ParameterShape {
    ParameterShape::LineDependent(ShapeKind::Stringer(shape))
}

const MEASUREMENT: &str = "Measurement";
const VISUAL: &str = "Visual";
const DOCUMENT: &str = "Document Check";
const FUNCTIONAL: &str = "Functional Test";

const EVERY_2_HRS: &str = "Every 2 hrs";
const EVERY_4_HRS: &str = "Every 4 hrs";
const PER_SHIFT: &str = "Once per shift";
const SHIFT_AND_4_HRS: &str = "Shift start and every 4 hrs";

const MATERIAL_FIELDS: &[&str] = &["supplier", "type", "expiryDate"];
const RIBBON_FIELDS: &[&str] = &["supplier", "width", "thickness"];
const JUNCTION_BOX_FIELDS: &[&str] = &[
    "supplier",
    "type",
    "cableLength",
    "connectorType",
    "ratedCurrent",
    "diodeType",
];
const LAMINATION_RECIPE_FIELDS: &[&str] = &[
    "Chamber_1_Pumping",
    "Chamber_1_Pressing",
    "Chamber_1_Venting",
    "Chamber_1_Temperature",
    "Chamber_2_Pumping",
    "Chamber_2_Pressing",
    "Chamber_2_Venting",
    "Chamber_2_Temperature",
    "Chamber_3_Pumping",
    "Chamber_3_Pressing",
    "Chamber_3_Venting",
    "Chamber_3_Temperature",
];
const POTTING_MIX_FIELDS: &[&str] = &["Part A", "Part B", "Ratio"];

static STAGES: &[StageSpec] = &[
    StageSpec {
        id: 1,
        name: "Shop Floor Environment",
        parameters: &[
            ParameterSpec::new("1-1", "Temperature", "25 ± 5 °C", MEASUREMENT, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 20.0, max: 30.0 }),
            ParameterSpec::new("1-2", "Relative Humidity", "≤ 60 %RH", MEASUREMENT, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .advisory(AdvisoryRule::AtMost(60.0)),
            ParameterSpec::new("1-3", "Housekeeping", "Clean floor, no loose material near line", VISUAL, PER_SHIFT, fixed(ONCE_PER_SHIFT))
                .status(),
        ],
    },
    StageSpec {
        id: 2,
        name: "Glass Loading",
        parameters: &[
            ParameterSpec::new("2-1", "Glass Dimension", "As per BOM ± 1 mm", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY)),
            ParameterSpec::new("2-2", "Glass Details", "Approved supplier, type as per BOM", DOCUMENT, PER_SHIFT, unit_fields(MATERIAL_FIELDS)),
            ParameterSpec::new("2-3", "Glass Surface", "No scratch, chip or crack", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 3,
        name: "EVA/EPE Cutting",
        parameters: &[
            ParameterSpec::new("3-1", "Front EVA Details", "Approved supplier, within shelf life", DOCUMENT, PER_SHIFT, unit_fields(MATERIAL_FIELDS)),
            ParameterSpec::new("3-2", "Back EPE Details", "Approved supplier, within shelf life", DOCUMENT, PER_SHIFT, unit_fields(MATERIAL_FIELDS)),
            ParameterSpec::new("3-3", "Cutting Dimension", "As per BOM ± 2 mm", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY)),
        ],
    },
    StageSpec {
        id: 4,
        name: "Cell Sorting",
        parameters: &[
            ParameterSpec::new("4-1", "Cell Details", "Efficiency bin as per work order", DOCUMENT, PER_SHIFT, fixed_fields(ONCE_PER_SHIFT, &["supplier", "efficiencyBin", "lotNo"])),
            ParameterSpec::new("4-2", "Cell Visual", "No chip, crack or colour mismatch", VISUAL, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .status(),
        ],
    },
    StageSpec {
        id: 5,
        name: "Tabbing and Stringing",
        parameters: &[
            ParameterSpec::new("5-1", "Ribbon Details", "As per BOM", DOCUMENT, PER_SHIFT, fixed_fields(ONCE_PER_SHIFT, RIBBON_FIELDS)),
            ParameterSpec::new("5-2", "Flux Details", "Approved supplier, within shelf life", DOCUMENT, PER_SHIFT, fixed_fields(ONCE_PER_SHIFT, MATERIAL_FIELDS)),
            ParameterSpec::new("5-3", "Stringer Temperature Profile", "As per approved recipe ± 5 °C", MEASUREMENT, PER_SHIFT, stringer_grid(StringerShape::Temperatures)),
            ParameterSpec::new("5-4", "Peel Strength", "≥ 1.0 N/mm", MEASUREMENT, PER_SHIFT, stringer_grid(StringerShape::PeelStrength))
                .advisory(AdvisoryRule::AtLeast(1.0)),
            ParameterSpec::new("5-5", "Soldering Time and Light Intensity", "As per approved recipe", MEASUREMENT, PER_SHIFT, stringer_grid(StringerShape::LightSensors)),
            ParameterSpec::new("5-6", "Laser Power", "30 - 70 %", MEASUREMENT, PER_SHIFT, stringer_grid(StringerShape::Units))
                .advisory(AdvisoryRule::Range { min: 30.0, max: 70.0 }),
            ParameterSpec::new("5-7", "Cell to Cell Gap", "1.5 - 2.5 mm", MEASUREMENT, PER_SHIFT, stringer_grid(StringerShape::Units))
                .advisory(AdvisoryRule::Range { min: 1.5, max: 2.5 }),
        ],
    },
    StageSpec {
        id: 6,
        name: "Auto Bussing",
        parameters: &[
            ParameterSpec::new("6-1", "Bussing Soldering Temperature", "380 - 420 °C", MEASUREMENT, EVERY_2_HRS, unit_slots(TWO_HOURLY))
                .advisory(AdvisoryRule::Range { min: 380.0, max: 420.0 }),
            ParameterSpec::new("6-2", "String to String Gap", "2.0 - 3.0 mm", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 2.0, max: 3.0 }),
            ParameterSpec::new("6-3", "Busbar Details", "As per BOM", DOCUMENT, PER_SHIFT, unit_fields(RIBBON_FIELDS)),
        ],
    },
    StageSpec {
        id: 7,
        name: "Auto Taping and Layup",
        parameters: &[
            ParameterSpec::new("7-1", "Tape Position", "Tape centred on string ends", VISUAL, PER_SHIFT, per_unit())
                .status(),
            ParameterSpec::new("7-2", "Back EPE Alignment", "No overhang beyond glass edge", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 8,
        name: "Pre-Lamination EL and Visual",
        parameters: &[
            ParameterSpec::new("8-1", "EL Image", "No micro-crack, dark cell or broken finger", VISUAL, EVERY_4_HRS, unit_samples(FOUR_HOURLY))
                .status(),
            ParameterSpec::new("8-2", "Foreign Material", "No foreign particle or hair", VISUAL, EVERY_4_HRS, unit_slots(FOUR_HOURLY))
                .status(),
        ],
    },
    StageSpec {
        id: 9,
        name: "Rework Station",
        parameters: &[
            ParameterSpec::new("9-1", "Soldering Iron Temperature", "330 - 370 °C", MEASUREMENT, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 330.0, max: 370.0 }),
            ParameterSpec::new("9-2", "Rework Procedure", "Work instruction followed", DOCUMENT, PER_SHIFT, fixed(ONCE_PER_SHIFT))
                .status(),
        ],
    },
    StageSpec {
        id: 10,
        name: "Lamination Process",
        parameters: &[
            ParameterSpec::new("10-1", "Lamination Recipe", "As per approved recipe", DOCUMENT, PER_SHIFT, unit_field_group(LAMINATION_RECIPE_FIELDS)),
            ParameterSpec::new("10-2", "Platen Temperature", "140 - 155 °C", MEASUREMENT, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 140.0, max: 155.0 }),
            ParameterSpec::new("10-3", "Gel Content", "≥ 75 %", MEASUREMENT, PER_SHIFT, fixed(ONCE_PER_SHIFT))
                .advisory(AdvisoryRule::AtLeast(75.0)),
        ],
    },
    StageSpec {
        id: 11,
        name: "Post-Lamination Inspection",
        parameters: &[
            ParameterSpec::new("11-1", "EVA to Glass Peel Test", "≥ 40 N/cm", MEASUREMENT, PER_SHIFT, unit_samples(ONCE_PER_SHIFT))
                .advisory(AdvisoryRule::AtLeast(40.0)),
            ParameterSpec::new("11-2", "Laminate Visual", "No bubble, delamination or shifted cell", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 12,
        name: "Auto Trimming",
        parameters: &[
            ParameterSpec::new("12-1", "Trimming Quality", "No EVA residue or backsheet cut", VISUAL, EVERY_4_HRS, unit_slots(FOUR_HOURLY))
                .status(),
            ParameterSpec::new("12-2", "Blade Condition", "Blade sharp, no chipping", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 13,
        name: "Framing",
        parameters: &[
            ParameterSpec::new("13-1", "Frame Details", "As per BOM", DOCUMENT, PER_SHIFT, unit_fields(&["supplier", "type", "size"])),
            ParameterSpec::new("13-2", "Frame Sealant Weight", "As per BOM ± 10 %", MEASUREMENT, EVERY_2_HRS, unit_slots(TWO_HOURLY)),
            ParameterSpec::new("13-3", "Corner Gap", "≤ 0.5 mm", MEASUREMENT, EVERY_4_HRS, unit_samples(FOUR_HOURLY))
                .advisory(AdvisoryRule::AtMost(0.5)),
        ],
    },
    StageSpec {
        id: 14,
        name: "Corner Key Punching",
        parameters: &[
            ParameterSpec::new("14-1", "Punch Depth", "Corner key fully seated", VISUAL, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .status(),
        ],
    },
    StageSpec {
        id: 15,
        name: "Back Label Pasting",
        parameters: &[
            ParameterSpec::new("15-1", "Label Details", "Serial and rating match work order", DOCUMENT, PER_SHIFT, fixed_fields(ONCE_PER_SHIFT, &["serialNo", "ratingMatch"])),
            ParameterSpec::new("15-2", "Label Position", "Within marked area, no wrinkle", VISUAL, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .status(),
        ],
    },
    StageSpec {
        id: 16,
        name: "Edge Sealant Visual",
        parameters: &[
            ParameterSpec::new("16-1", "Sealant Overflow", "Uniform bead, excess removed", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 17,
        name: "Junction Box Sealant Dispensing",
        parameters: &[
            ParameterSpec::new("17-1", "Sealant Details", "Approved supplier, within shelf life", DOCUMENT, PER_SHIFT, unit_fields(MATERIAL_FIELDS)),
            ParameterSpec::new("17-2", "Sealant Weight", "As per BOM ± 10 %", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY)),
        ],
    },
    StageSpec {
        id: 18,
        name: "Junction Box Fixing",
        parameters: &[
            ParameterSpec::new("18-1", "Junction Box Details", "As per BOM", DOCUMENT, PER_SHIFT, unit_fields(JUNCTION_BOX_FIELDS)),
            ParameterSpec::new("18-2", "Terminal Soldering", "Complete wetting, no cold joint", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 19,
        name: "Auto Potting",
        parameters: &[
            ParameterSpec::new("19-1", "Mixing Ratio", "Part A : Part B as per datasheet", MEASUREMENT, PER_SHIFT, unit_field_group(POTTING_MIX_FIELDS))
                .mixing_ratio(POTTING_MIX),
            ParameterSpec::new("19-2", "Potting Material Details", "Approved supplier, within shelf life", DOCUMENT, PER_SHIFT, unit_fields(MATERIAL_FIELDS)),
            ParameterSpec::new("19-3", "Potting Weight", "As per BOM ± 2 g", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY)),
        ],
    },
    StageSpec {
        id: 20,
        name: "Curing",
        parameters: &[
            ParameterSpec::new("20-1", "Curing Room Temperature", "25 ± 5 °C", MEASUREMENT, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 20.0, max: 30.0 }),
            ParameterSpec::new("20-2", "Curing Room Humidity", "≥ 50 %RH", MEASUREMENT, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::AtLeast(50.0)),
            ParameterSpec::new("20-3", "Curing Time", "≥ 4 hrs", MEASUREMENT, PER_SHIFT, fixed(ONCE_PER_SHIFT))
                .advisory(AdvisoryRule::AtLeast(4.0)),
        ],
    },
    StageSpec {
        id: 21,
        name: "Cleaning",
        parameters: &[
            ParameterSpec::new("21-1", "Module Cleanliness", "No sealant or fingerprint on glass and frame", VISUAL, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .status(),
        ],
    },
    StageSpec {
        id: 22,
        name: "Sun Simulator (IV Testing)",
        parameters: &[
            ParameterSpec::new("22-1", "Simulator Calibration", "Calibrated with golden module at shift start", DOCUMENT, PER_SHIFT, per_unit())
                .status(),
            ParameterSpec::new("22-2", "Reference Module Pmax Deviation", "± 1 %", MEASUREMENT, EVERY_4_HRS, unit_slots(FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: -1.0, max: 1.0 }),
            ParameterSpec::new("22-3", "Test Room Temperature", "25 ± 2 °C", MEASUREMENT, EVERY_4_HRS, fixed(FOUR_HOURLY))
                .advisory(AdvisoryRule::Range { min: 23.0, max: 27.0 }),
        ],
    },
    StageSpec {
        id: 23,
        name: "Safety Testing",
        parameters: &[
            ParameterSpec::new("23-1", "Hipot Leakage Current", "≤ 50 µA", FUNCTIONAL, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::AtMost(50.0)),
            ParameterSpec::new("23-2", "Insulation Resistance", "≥ 40 MΩ·m²", FUNCTIONAL, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::AtLeast(40.0)),
            ParameterSpec::new("23-3", "Ground Continuity", "≤ 0.1 Ω", FUNCTIONAL, SHIFT_AND_4_HRS, unit_slots(SHIFT_AND_FOUR_HOURLY))
                .advisory(AdvisoryRule::AtMost(0.1)),
        ],
    },
    StageSpec {
        id: 24,
        name: "Final EL and Visual",
        parameters: &[
            ParameterSpec::new("24-1", "EL Image", "No crack or dark area beyond limit sample", VISUAL, EVERY_4_HRS, unit_samples(FOUR_HOURLY))
                .status(),
            ParameterSpec::new("24-2", "Final Visual", "As per visual inspection criteria", VISUAL, PER_SHIFT, per_unit())
                .status(),
        ],
    },
    StageSpec {
        id: 25,
        name: "Packing",
        parameters: &[
            ParameterSpec::new("25-1", "Pallet Details", "Module count and pallet label match", DOCUMENT, PER_SHIFT, fixed_fields(ONCE_PER_SHIFT, &["palletNo", "moduleCount"])),
            ParameterSpec::new("25-2", "Packing Condition", "Corner protectors and strapping intact", VISUAL, PER_SHIFT, fixed(ONCE_PER_SHIFT))
                .status(),
        ],
    },
];

/// Every stage in report order
pub fn stage_specs() -> &'static [StageSpec] {
    STAGES
}

pub fn stage_spec(stage_id: u32) -> Option<&'static StageSpec> {
    STAGES.iter().find(|stage| stage.id == stage_id)
}

pub fn parameter_spec(stage_id: u32, parameter_id: &str) -> Option<&'static ParameterSpec> {
    stage_spec(stage_id)?
        .parameters
        .iter()
        .find(|p| p.id == parameter_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_stage_ids_are_sequential() {
        let ids: Vec<u32> = stage_specs().iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    }

    #[test]
    fn test_parameter_ids_are_stage_scoped_and_unique() {
        for stage in stage_specs() {
            let mut seen = HashSet::new();
            for p in stage.parameters {
                assert!(
                    p.id.starts_with(&format!("{}-", stage.id)),
                    "{} does not belong to stage {}",
                    p.id,
                    stage.id
                );
                assert!(seen.insert(p.id), "duplicate parameter id {}", p.id);
            }
        }
    }

    #[test]
    fn test_named_stages() {
        assert_eq!(stage_spec(5).unwrap().name, "Tabbing and Stringing");
        assert_eq!(stage_spec(18).unwrap().name, "Junction Box Fixing");
        assert_eq!(parameter_spec(5, "5-6").unwrap().label, "Laser Power");
        assert_eq!(parameter_spec(19, "19-1").unwrap().renderer, Renderer::RatioCalculator);
        assert!(parameter_spec(19, "19-9").is_none());
    }
}
