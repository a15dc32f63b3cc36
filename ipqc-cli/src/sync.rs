//! Session persistence
//!
//! Carries out the effects an editing session asks for and loads stored
//! checksheets into sessions. A failed call leaves the session's record as
//! it was.

use ipqc_common::session::{Session, SessionEffect, SessionError};
use thiserror::Error;
use tracing::info;

use crate::client::{AuditClient, ClientError, SaveOutcome, StoredAudit};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("stored audit {0} has no checksheet data")]
    EmptyRecord(String),
}

/// How a session got its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// A record for the same (line, date, shift) already existed
    Resumed(String),
    /// A new record was saved
    Started(SaveOutcome),
}

pub struct SessionSync<'c> {
    client: &'c AuditClient,
}

impl<'c> SessionSync<'c> {
    pub fn new(client: &'c AuditClient) -> Self {
        Self { client }
    }

    /// Perform a session effect
    pub async fn apply(
        &self,
        session: &mut Session<'_>,
        effect: SessionEffect,
    ) -> Result<SaveOutcome, SyncError> {
        match effect {
            SessionEffect::SaveRequested => {
                let snapshot = session.record().clone();
                let outcome = self.client.save(&snapshot).await?;
                session.mark_saved(snapshot);
                Ok(outcome)
            }
        }
    }

    /// Write the session's record over an already stored audit
    ///
    /// Used where the stored id is known, including after a line change
    /// that alters the record's (line, date, shift).
    pub async fn save_stored(
        &self,
        session: &mut Session<'_>,
        id: &str,
    ) -> Result<StoredAudit, SyncError> {
        let snapshot = session.record().clone();
        let stored = self.client.update(id, &snapshot).await?;
        session.mark_saved(snapshot);
        Ok(stored)
    }

    /// Load a stored audit into the session
    pub async fn load(&self, session: &mut Session<'_>, id: &str) -> Result<StoredAudit, SyncError> {
        let stored = self.client.fetch(id).await?;
        let data = stored
            .data
            .clone()
            .ok_or_else(|| SyncError::EmptyRecord(stored.id.clone()))?;
        session.load_saved(data)?;
        Ok(stored)
    }

    /// Leave basic information, resuming an existing checksheet when the
    /// backend already has one for the session's (line, date, shift)
    ///
    /// On failure the session is left as it was before the call.
    pub async fn resume_or_start(&self, session: &mut Session<'_>) -> Result<Opened, SyncError> {
        let before = session.clone();
        let result = self.open(session).await;
        if result.is_err() {
            *session = before;
        }
        result
    }

    async fn open(&self, session: &mut Session<'_>) -> Result<Opened, SyncError> {
        let effect = session.proceed()?;

        if let Some(identity) = session.record().identity() {
            let existing = self.client.search_by_filters(&identity).await?;
            if let Some(found) = existing.first() {
                info!(id = %found.id, %identity, "Resuming existing checksheet");
                self.load(session, &found.id).await?;
                return Ok(Opened::Resumed(found.id.clone()));
            }
        }

        let outcome = self.apply(session, effect).await?;
        Ok(Opened::Started(outcome))
    }
}
