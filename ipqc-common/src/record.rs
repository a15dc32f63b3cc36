//! Audit record model
//!
//! The persisted checksheet for one (line, date, shift). The in-memory
//! record is the single source of truth for an editing session; the backend
//! copy is only reconciled with it at explicit load and save points.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::line::{optional_line, ProductionLine};
use crate::observation::ObservationValue;
use crate::registry::StageConfigRegistry;
use crate::stage::{build_all_stages, ParameterDefinition, StageDefinition};

/// Date format used in records and backend queries
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Audit and review signatures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signatures {
    #[serde(default)]
    pub audit_by: String,
    #[serde(default)]
    pub reviewed_by: String,
}

/// Full checksheet document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(with = "optional_line", default)]
    pub line_number: Option<ProductionLine>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub shift: String,
    #[serde(default)]
    pub production_order_no: String,
    #[serde(default)]
    pub module_type: String,
    #[serde(default)]
    pub customer_specific: bool,
    #[serde(default)]
    pub trial_production: bool,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub signatures: Signatures,
}

/// Key that decides whether two records are the same checksheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordIdentity {
    pub line: ProductionLine,
    pub date: String,
    pub shift: String,
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {} / {} / Shift {}", self.line, self.date, self.shift)
    }
}

/// Basic-information fields required before stages can be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicField {
    LineNumber,
    Date,
    Shift,
    ProductionOrderNo,
    ModuleType,
}

impl BasicField {
    pub fn all() -> &'static [BasicField] {
        &[
            BasicField::LineNumber,
            BasicField::Date,
            BasicField::Shift,
            BasicField::ProductionOrderNo,
            BasicField::ModuleType,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BasicField::LineNumber => "Line Number",
            BasicField::Date => "Date",
            BasicField::Shift => "Shift",
            BasicField::ProductionOrderNo => "Production Order No",
            BasicField::ModuleType => "Module Type",
        }
    }
}

impl fmt::Display for BasicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl AuditRecord {
    /// Record for a line with every stage built empty
    pub fn for_line(
        registry: &StageConfigRegistry,
        line: ProductionLine,
        date: impl Into<String>,
        shift: impl Into<String>,
    ) -> Self {
        Self {
            line_number: Some(line),
            date: date.into(),
            shift: shift.into(),
            stages: build_all_stages(registry, line),
            ..Self::default()
        }
    }

    /// (line, date, shift) once all three are set
    pub fn identity(&self) -> Option<RecordIdentity> {
        let line = self.line_number?;
        if self.date.trim().is_empty() || self.shift.trim().is_empty() {
            return None;
        }
        Some(RecordIdentity {
            line,
            date: self.date.trim().to_string(),
            shift: self.shift.trim().to_string(),
        })
    }

    /// Required basic fields still empty
    pub fn missing_basic_fields(&self) -> Vec<BasicField> {
        BasicField::all()
            .iter()
            .copied()
            .filter(|field| match field {
                BasicField::LineNumber => self.line_number.is_none(),
                BasicField::Date => self.date.trim().is_empty(),
                BasicField::Shift => self.shift.trim().is_empty(),
                BasicField::ProductionOrderNo => self.production_order_no.trim().is_empty(),
                BasicField::ModuleType => self.module_type.trim().is_empty(),
            })
            .collect()
    }

    pub fn is_basic_info_complete(&self) -> bool {
        self.missing_basic_fields().is_empty()
    }

    /// Set a text basic field; the line goes through [`crate::session::Session::set_line`]
    pub fn set_basic_text(&mut self, field: BasicField, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match field {
            BasicField::LineNumber => {
                return Err(Error::InvalidInput(
                    "the line is changed through line reconfiguration".to_string(),
                ))
            }
            BasicField::Date => {
                if !value.is_empty() {
                    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| {
                        Error::InvalidInput(format!("date '{}' is not YYYY-MM-DD: {}", value, e))
                    })?;
                }
                self.date = value;
            }
            BasicField::Shift => self.shift = value,
            BasicField::ProductionOrderNo => self.production_order_no = value,
            BasicField::ModuleType => self.module_type = value,
        }
        Ok(())
    }

    /// Name the backend stores alongside the record
    pub fn display_name(&self) -> String {
        match self.identity() {
            Some(identity) => format!("IPQC Audit - {}", identity),
            None => "IPQC Audit - draft".to_string(),
        }
    }

    pub fn stage(&self, stage_id: u32) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub fn parameter(&self, stage_id: u32, parameter_id: &str) -> Option<&ParameterDefinition> {
        self.stage(stage_id)?.parameter(parameter_id)
    }

    /// Current value of one observation slot
    pub fn observation(
        &self,
        stage_id: u32,
        parameter_id: &str,
        slot_key: &str,
    ) -> Option<&ObservationValue> {
        self.parameter(stage_id, parameter_id)?
            .slot(slot_key)
            .map(|slot| &slot.value)
    }
}
