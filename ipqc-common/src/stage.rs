//! Stage construction
//!
//! Builds the stage entities of a checksheet from the catalog: fixed
//! metadata per parameter, plus the empty observations for the active
//! line. Line-dependent parameters take their shape from the registry's
//! unit mapping; everything else uses the catalog's fixed slots.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{self, ParameterShape, Renderer, StageSpec};
use crate::error::{Error, Result, ShapeError};
use crate::line::ProductionLine;
use crate::observation::{ObservationSlot, ObservationValue};
use crate::registry::{ResolvedUnits, StageConfigRegistry};
use crate::shape::{self, ShapeKind};

/// One manufacturing stage with its parameters and observations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    pub id: u32,
    pub name: String,
    pub parameters: Vec<ParameterDefinition>,
}

/// One inspected parameter and its observation slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub id: String,
    #[serde(rename = "parameter")]
    pub label: String,
    pub criteria: String,
    pub inspection_type: String,
    pub inspection_frequency: String,
    pub observations: Vec<ObservationSlot>,
    /// Input layout; not persisted
    #[serde(skip)]
    pub renderer: Renderer,
    /// Set when the line's units could not produce this parameter's shape
    #[serde(skip)]
    pub shape_error: Option<ShapeError>,
}

impl StageDefinition {
    pub fn parameter(&self, parameter_id: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.id == parameter_id)
    }
}

impl ParameterDefinition {
    pub fn slot(&self, slot_key: &str) -> Option<&ObservationSlot> {
        self.observations.iter().find(|s| s.slot_key == slot_key)
    }

    /// Slot keys in order
    pub fn slot_keys(&self) -> Vec<&str> {
        self.observations.iter().map(|s| s.slot_key.as_str()).collect()
    }
}

/// Build one stage for a line
pub fn build_stage(
    registry: &StageConfigRegistry,
    stage_id: u32,
    line: ProductionLine,
) -> Result<StageDefinition> {
    let spec = catalog::stage_spec(stage_id)
        .ok_or_else(|| Error::NotFound(format!("stage {}", stage_id)))?;
    Ok(build_from_spec(registry, spec, line))
}

/// Build every catalog stage for a line, in report order
pub fn build_all_stages(registry: &StageConfigRegistry, line: ProductionLine) -> Vec<StageDefinition> {
    catalog::stage_specs()
        .iter()
        .map(|spec| build_from_spec(registry, spec, line))
        .collect()
}

fn build_from_spec(
    registry: &StageConfigRegistry,
    spec: &StageSpec,
    line: ProductionLine,
) -> StageDefinition {
    let config = registry.get_config(spec.id);

    let parameters = spec
        .parameters
        .iter()
        .map(|param| {
            let (observations, shape_error) = match param.shape {
                ParameterShape::Fixed { slots, fields } => (fixed_slots(slots, fields), None),
                ParameterShape::LineDependent(kind) => {
                    let registered = config.map_or(false, |c| c.is_line_dependent(param.id));
                    let resolved = if registered {
                        registry.resolve(spec.id, line, &kind)
                    } else {
                        unregistered_units(registry, spec.id, line, &kind)
                    };
                    match resolved.and_then(|resolved| shape::build_slots(&kind, &resolved)) {
                        Ok(slots) => (slots, None),
                        Err(err) => {
                            warn!(stage_id = spec.id, parameter_id = param.id, %line, "{}", err);
                            (Vec::new(), Some(err))
                        }
                    }
                }
            };

            ParameterDefinition {
                id: param.id.to_string(),
                label: param.label.to_string(),
                criteria: param.criteria.to_string(),
                inspection_type: param.inspection_type.to_string(),
                inspection_frequency: param.frequency.to_string(),
                observations,
                renderer: param.renderer,
                shape_error,
            }
        })
        .collect();

    StageDefinition {
        id: spec.id,
        name: spec.name.to_string(),
        parameters,
    }
}

/// Line-independent slots
fn fixed_slots(slots: &[&str], fields: &'static [&'static str]) -> Vec<ObservationSlot> {
    slots
        .iter()
        .map(|slot| {
            let value = if fields.is_empty() {
                ObservationValue::empty()
            } else {
                ObservationValue::empty_node(fields.iter().copied())
            };
            ObservationSlot::new(*slot, value)
        })
        .collect()
}

/// Units for a line-dependent parameter missing from the stage's registry entry
///
/// Unit grids use the stage's fallback row. Stringer grids still need the
/// stage's topology, and fail with a shape error when it has none.
fn unregistered_units(
    registry: &StageConfigRegistry,
    stage_id: u32,
    line: ProductionLine,
    kind: &ShapeKind,
) -> std::result::Result<ResolvedUnits, ShapeError> {
    match kind {
        ShapeKind::Unit(_) => Ok(ResolvedUnits::Units(registry.fallback_units(stage_id).to_vec())),
        ShapeKind::Stringer(_) => registry.resolve(stage_id, line, kind),
    }
}
