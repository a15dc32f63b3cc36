//! Checksheet editing session
//!
//! Drives one record through the editing flow:
//!
//! ```text
//! BasicInfo --proceed--> StageSelection --open_stage--> StageDetail(id)
//!                             ^                              |
//!                             +---- leave_stage / save_stage +
//! ```
//!
//! The session never talks to the backend. Operations that need a save
//! return [`SessionEffect::SaveRequested`]; the caller performs the save and
//! reports the stored copy back through [`Session::mark_saved`]. Readings
//! are kept locally until then.

use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::Error;
use crate::line::ProductionLine;
use crate::merge;
use crate::observation::ObservationValue;
use crate::reconfigure::{merge_loaded_record, reconfigure};
use crate::record::{AuditRecord, BasicField};
use crate::registry::StageConfigRegistry;
use crate::stage::{build_all_stages, build_stage, StageDefinition};

/// Page the session is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    BasicInfo,
    StageSelection,
    StageDetail(u32),
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::BasicInfo => f.write_str("basic information"),
            Page::StageSelection => f.write_str("stage selection"),
            Page::StageDetail(id) => write!(f, "stage {} detail", id),
        }
    }
}

/// Work the caller must carry out for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    /// Persist the current record
    SaveRequested,
}

/// Answer to the unsaved-changes prompt when leaving a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    SaveChanges,
    /// Restore the stage from the last saved copy
    DiscardChanges,
}

/// Rejected session transition
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("basic information incomplete: {}", join_fields(.0))]
    IncompleteBasicInfo(Vec<BasicField>),

    #[error("{operation} is not available on the {page} page")]
    WrongPage { operation: &'static str, page: Page },

    #[error("stage {0} has unsaved changes; save or discard them first")]
    UnsavedChanges(u32),

    #[error("stage {0} is not part of this checksheet")]
    UnknownStage(u32),

    #[error("select a production line first")]
    LineNotSelected,

    #[error(transparent)]
    Invalid(#[from] Error),
}

fn join_fields(fields: &[BasicField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Editing state for one checksheet
#[derive(Debug, Clone)]
pub struct Session<'r> {
    registry: &'r StageConfigRegistry,
    page: Page,
    record: AuditRecord,
    /// Copy last confirmed by the backend
    saved: Option<AuditRecord>,
}

impl<'r> Session<'r> {
    /// Blank session on the basic-information page
    pub fn new(registry: &'r StageConfigRegistry) -> Self {
        Self {
            registry,
            page: Page::BasicInfo,
            record: AuditRecord::default(),
            saved: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn record(&self) -> &AuditRecord {
        &self.record
    }

    pub fn into_record(self) -> AuditRecord {
        self.record
    }

    /// Select or change the production line
    ///
    /// Line-dependent stages are rebuilt for the line; readings in slots
    /// both lines share are kept.
    pub fn set_line(&mut self, line: ProductionLine) -> Result<(), SessionError> {
        if let Page::StageDetail(_) = self.page {
            return Err(SessionError::WrongPage {
                operation: "changing the line",
                page: self.page,
            });
        }
        if self.record.line_number == Some(line) && !self.record.stages.is_empty() {
            return Ok(());
        }

        info!(from = ?self.record.line_number, to = %line, "changing production line");
        self.record.stages = reconfigure(&self.record.stages, self.registry, line);
        self.record.line_number = Some(line);
        Ok(())
    }

    /// Set one basic-information field from text
    pub fn set_basic_field(&mut self, field: BasicField, value: &str) -> Result<(), SessionError> {
        if self.page != Page::BasicInfo {
            return Err(SessionError::WrongPage {
                operation: "editing basic information",
                page: self.page,
            });
        }
        match field {
            BasicField::LineNumber => self.set_line(value.parse::<ProductionLine>()?),
            _ => Ok(self.record.set_basic_text(field, value)?),
        }
    }

    /// Set the two record flags
    pub fn set_flags(&mut self, customer_specific: bool, trial_production: bool) {
        self.record.customer_specific = customer_specific;
        self.record.trial_production = trial_production;
    }

    /// Leave basic information for stage selection
    ///
    /// Requires every basic field. The record is saved on the way through.
    pub fn proceed(&mut self) -> Result<SessionEffect, SessionError> {
        if self.page != Page::BasicInfo {
            return Err(SessionError::WrongPage {
                operation: "proceeding to stage selection",
                page: self.page,
            });
        }
        let missing = self.record.missing_basic_fields();
        if !missing.is_empty() {
            return Err(SessionError::IncompleteBasicInfo(missing));
        }
        if self.record.stages.is_empty() {
            let line = self.record.line_number.ok_or(SessionError::LineNotSelected)?;
            self.record.stages = build_all_stages(self.registry, line);
        }

        self.page = Page::StageSelection;
        Ok(SessionEffect::SaveRequested)
    }

    /// Return to basic information from stage selection
    pub fn back_to_basic_info(&mut self) -> Result<(), SessionError> {
        if self.page != Page::StageSelection {
            return Err(SessionError::WrongPage {
                operation: "returning to basic information",
                page: self.page,
            });
        }
        self.page = Page::BasicInfo;
        Ok(())
    }

    pub fn open_stage(&mut self, stage_id: u32) -> Result<(), SessionError> {
        if self.page != Page::StageSelection {
            return Err(SessionError::WrongPage {
                operation: "opening a stage",
                page: self.page,
            });
        }
        if self.record.stage(stage_id).is_none() {
            return Err(SessionError::UnknownStage(stage_id));
        }
        debug!(stage_id, "opening stage");
        self.page = Page::StageDetail(stage_id);
        Ok(())
    }

    fn open_stage_id(&self, operation: &'static str) -> Result<u32, SessionError> {
        match self.page {
            Page::StageDetail(id) => Ok(id),
            page => Err(SessionError::WrongPage { operation, page }),
        }
    }

    /// Replace one slot of the open stage; false when the slot does not exist
    pub fn edit_slot(
        &mut self,
        parameter_id: &str,
        slot_key: &str,
        value: ObservationValue,
    ) -> Result<bool, SessionError> {
        let stage_id = self.open_stage_id("editing observations")?;
        let updated = merge::update(&self.record, stage_id, parameter_id, slot_key, value);
        Ok(self.replace_record(updated))
    }

    /// Set one field inside a slot of the open stage; false when the slot does not exist
    pub fn edit_field(
        &mut self,
        parameter_id: &str,
        slot_key: &str,
        path: &[&str],
        text: &str,
    ) -> Result<bool, SessionError> {
        let stage_id = self.open_stage_id("editing observations")?;
        let updated = merge::update_field(&self.record, stage_id, parameter_id, slot_key, path, text);
        Ok(self.replace_record(updated))
    }

    fn replace_record(&mut self, updated: AuditRecord) -> bool {
        let changed = updated != self.record;
        self.record = updated;
        changed
    }

    /// Leave the open stage for stage selection
    ///
    /// Pending edits need a decision. Saving requests a save; discarding
    /// restores only this stage from the last saved copy.
    pub fn leave_stage(
        &mut self,
        decision: Option<LeaveDecision>,
    ) -> Result<Option<SessionEffect>, SessionError> {
        let stage_id = self.open_stage_id("leaving a stage")?;
        if !self.stage_has_unsaved_changes(stage_id) {
            self.page = Page::StageSelection;
            return Ok(None);
        }

        match decision {
            None => Err(SessionError::UnsavedChanges(stage_id)),
            Some(LeaveDecision::SaveChanges) => {
                self.page = Page::StageSelection;
                Ok(Some(SessionEffect::SaveRequested))
            }
            Some(LeaveDecision::DiscardChanges) => {
                let restored = self.baseline_stage(stage_id)?;
                if let Some(stage) = self.record.stages.iter_mut().find(|s| s.id == stage_id) {
                    *stage = restored;
                }
                info!(stage_id, "discarded unsaved stage edits");
                self.page = Page::StageSelection;
                Ok(None)
            }
        }
    }

    /// Save the open stage and return to stage selection
    pub fn save_stage(&mut self) -> Result<SessionEffect, SessionError> {
        self.open_stage_id("saving a stage")?;
        self.page = Page::StageSelection;
        Ok(SessionEffect::SaveRequested)
    }

    /// Record the copy the backend confirmed as stored
    pub fn mark_saved(&mut self, stored: AuditRecord) {
        self.saved = Some(stored);
    }

    /// Replace the session's record with a saved one
    ///
    /// Stages are rebuilt for the saved line and the saved observations
    /// merged in by parameter id.
    pub fn load_saved(&mut self, saved: AuditRecord) -> Result<(), SessionError> {
        let line = saved
            .line_number
            .or(self.record.line_number)
            .ok_or(SessionError::LineNotSelected)?;

        let fresh = build_all_stages(self.registry, line);
        let record = AuditRecord {
            line_number: Some(line),
            stages: merge_loaded_record(&fresh, &saved.stages),
            ..saved
        };
        info!(name = %record.display_name(), "loaded saved checksheet");

        self.page = if record.is_basic_info_complete() {
            Page::StageSelection
        } else {
            Page::BasicInfo
        };
        self.saved = Some(record.clone());
        self.record = record;
        Ok(())
    }

    /// Whether anything differs from the last saved copy
    pub fn has_unsaved_changes(&self) -> bool {
        match &self.saved {
            Some(saved) => *saved != self.record,
            None => {
                self.record.missing_basic_fields().len() < BasicField::all().len()
                    || self
                        .record
                        .stages
                        .iter()
                        .any(|s| self.stage_has_unsaved_changes(s.id))
            }
        }
    }

    /// Whether one stage differs from its last saved (or freshly built) state
    pub fn stage_has_unsaved_changes(&self, stage_id: u32) -> bool {
        let current = self.record.stage(stage_id);
        match self.baseline_stage(stage_id) {
            Ok(baseline) => current != Some(&baseline),
            Err(_) => current.is_some(),
        }
    }

    fn baseline_stage(&self, stage_id: u32) -> Result<StageDefinition, SessionError> {
        if let Some(stage) = self.saved.as_ref().and_then(|s| s.stage(stage_id)) {
            return Ok(stage.clone());
        }
        let line = self.record.line_number.ok_or(SessionError::LineNotSelected)?;
        Ok(build_stage(self.registry, stage_id, line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_session() -> Session<'static> {
        let mut session = Session::new(StageConfigRegistry::builtin());
        session.set_basic_field(BasicField::LineNumber, "I").unwrap();
        session.set_basic_field(BasicField::Date, "2026-10-16").unwrap();
        session.set_basic_field(BasicField::Shift, "A").unwrap();
        session.set_basic_field(BasicField::ProductionOrderNo, "PO-1187").unwrap();
        session.set_basic_field(BasicField::ModuleType, "M10-144HC").unwrap();
        session
    }

    #[test]
    fn test_proceed_requires_basic_fields() {
        let mut session = Session::new(StageConfigRegistry::builtin());
        session.set_basic_field(BasicField::LineNumber, "II").unwrap();
        match session.proceed() {
            Err(SessionError::IncompleteBasicInfo(missing)) => assert_eq!(missing.len(), 4),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(session.page(), Page::BasicInfo);
    }

    #[test]
    fn test_proceed_requests_save() {
        let mut session = ready_session();
        assert_eq!(session.proceed().unwrap(), SessionEffect::SaveRequested);
        assert_eq!(session.page(), Page::StageSelection);
        assert_eq!(session.record().stages.len(), 25);
    }

    #[test]
    fn test_edit_outside_stage_detail_rejected() {
        let mut session = ready_session();
        assert!(matches!(
            session.edit_slot("1-1", "4hrs", "24".into()),
            Err(SessionError::WrongPage { .. })
        ));
    }

    #[test]
    fn test_leave_with_pending_edits_needs_decision() {
        let mut session = ready_session();
        session.proceed().unwrap();
        session.mark_saved(session.record().clone());
        session.open_stage(1).unwrap();
        assert!(session.edit_slot("1-1", "4hrs", "24".into()).unwrap());

        assert!(matches!(session.leave_stage(None), Err(SessionError::UnsavedChanges(1))));
        assert_eq!(
            session.leave_stage(Some(LeaveDecision::SaveChanges)).unwrap(),
            Some(SessionEffect::SaveRequested)
        );
        assert_eq!(session.page(), Page::StageSelection);
    }

    #[test]
    fn test_discard_restores_only_that_stage() {
        let mut session = ready_session();
        session.proceed().unwrap();
        session.open_stage(1).unwrap();
        session.edit_slot("1-1", "4hrs", "24".into()).unwrap();
        session.save_stage().unwrap();
        session.mark_saved(session.record().clone());

        session.open_stage(9).unwrap();
        session.edit_slot("9-1", "4hrs", "350".into()).unwrap();
        session.leave_stage(Some(LeaveDecision::DiscardChanges)).unwrap();

        let record = session.record();
        assert_eq!(record.observation(9, "9-1", "4hrs").unwrap().as_leaf(), Some(""));
        assert_eq!(record.observation(1, "1-1", "4hrs").unwrap().as_leaf(), Some("24"));
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_unknown_slot_edit_reports_no_change() {
        let mut session = ready_session();
        session.proceed().unwrap();
        session.open_stage(1).unwrap();
        assert!(!session.edit_slot("1-1", "12hrs", "24".into()).unwrap());
        assert!(session.leave_stage(None).unwrap().is_none());
    }
}
