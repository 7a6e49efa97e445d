use std::{collections::BTreeSet, time::Duration};

use tracing::{info, warn};

use crate::{
    backend::Session,
    core::{
        Notice,
        error::FormError,
        model::{ApplicationDraft, DocumentSlot, NewApplication, StoredApplication},
        validation::validate,
    },
};

/// How long the confirmation stays up before the form is cleared.
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
}

/// Permission to clear the form once the confirmation has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTicket {
    generation: u64,
    delay: Duration,
}

impl ResetTicket {
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Resolve once the display delay has passed.
    pub async fn elapsed(self) -> Self {
        tokio::time::sleep(self.delay).await;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionSequencer {
    state: SubmitState,
    notice: Option<Notice>,
    generation: u64,
    reset_delay: Duration,
}

impl Default for SubmissionSequencer {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_DELAY)
    }
}

impl SubmissionSequencer {
    pub fn new(reset_delay: Duration) -> Self {
        Self {
            state: SubmitState::Idle,
            notice: None,
            generation: 0,
            reset_delay,
        }
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.state == SubmitState::Submitting
    }

    /// Move to `Submitting` and build the insert payload, or stay idle with
    /// the reason shown.
    pub fn begin(
        &mut self,
        draft: &ApplicationDraft,
        completed: &BTreeSet<DocumentSlot>,
        session: Option<&Session>,
    ) -> Result<NewApplication, FormError> {
        if self.is_submitting() {
            return Err(FormError::Precondition(
                "A submission is already in progress".to_string(),
            ));
        }
        let prepared = validate(draft, completed)
            .map_err(FormError::from)
            .and_then(|amount| {
                let owner = session.map(|s| s.identity.id).ok_or_else(|| {
                    FormError::Precondition(
                        "You must be signed in to submit an application".to_string(),
                    )
                })?;
                Ok(NewApplication::from_draft(draft, amount, owner))
            });
        match prepared {
            Ok(record) => {
                self.state = SubmitState::Submitting;
                self.notice = None;
                Ok(record)
            }
            Err(e) => {
                self.state = SubmitState::Idle;
                self.notice = Some(Notice::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Back to idle with the insert outcome on display. A ticket is handed
    /// out only on success.
    pub fn finish(
        &mut self,
        result: Result<StoredApplication, FormError>,
    ) -> Option<ResetTicket> {
        match result {
            Ok(stored) => Some(self.succeed(&stored)),
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    pub fn succeed(&mut self, stored: &StoredApplication) -> ResetTicket {
        info!(id = %stored.id, "Application submitted");
        self.state = SubmitState::Idle;
        self.notice = Some(Notice::Success(format!(
            "Application submitted successfully! Reference ID: {}",
            stored.id
        )));
        self.generation += 1;
        ResetTicket {
            generation: self.generation,
            delay: self.reset_delay,
        }
    }

    /// The draft is left untouched so the user can retry.
    pub fn fail(&mut self, error: &FormError) {
        warn!("Submission failed: {error}");
        self.state = SubmitState::Idle;
        self.notice = Some(Notice::Error(error.to_string()));
    }

    /// Whether `ticket` belongs to the latest successful submission.
    pub fn accepts(&self, ticket: &ResetTicket) -> bool {
        ticket.generation == self.generation && !self.is_submitting()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }
}
