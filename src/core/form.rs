use std::time::Duration;

use crate::{
    backend::{Session, StorageService, TableService},
    core::{
        Notice,
        error::FormError,
        model::{ApplicationDraft, DocumentSlot, NewApplication, SelectedFile, StoredApplication},
        submission::{ResetTicket, SubmissionSequencer},
        upload::{UploadRequest, UploadSlots},
    },
};

/// Draft, document slots and submission state of one application.
///
/// All mutation goes through `&mut self` from a single owner; collaborator
/// calls happen between a `begin_*` and the matching `finish_*`/`complete_*`
/// so callers can run them off the UI loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationForm {
    pub draft: ApplicationDraft,
    uploads: UploadSlots,
    submission: SubmissionSequencer,
}

impl ApplicationForm {
    pub fn new(reset_delay: Duration) -> Self {
        Self {
            draft: ApplicationDraft::default(),
            uploads: UploadSlots::default(),
            submission: SubmissionSequencer::new(reset_delay),
        }
    }

    pub fn uploads(&self) -> &UploadSlots {
        &self.uploads
    }

    pub fn submission(&self) -> &SubmissionSequencer {
        &self.submission
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.submission.notice()
    }

    pub fn select_document(
        &mut self,
        slot: DocumentSlot,
        file: SelectedFile,
        session: Option<&Session>,
    ) -> Result<UploadRequest, FormError> {
        self.uploads.begin(slot, file, session, &mut self.draft)
    }

    pub fn reject_document(&mut self, slot: DocumentSlot, message: impl Into<String>) {
        self.uploads.reject(slot, message);
    }

    pub fn complete_upload(
        &mut self,
        request: &UploadRequest,
        result: Result<String, FormError>,
    ) -> bool {
        self.uploads.finish(request, result, &mut self.draft)
    }

    /// Select, upload and record one document in a single call.
    pub async fn upload_document<S: StorageService>(
        &mut self,
        storage: &S,
        session: Option<&Session>,
        slot: DocumentSlot,
        file: SelectedFile,
    ) -> Result<String, FormError> {
        let request = self.select_document(slot, file, session)?;
        let result = request.send(storage).await;
        self.complete_upload(&request, result.clone());
        result
    }

    pub fn begin_submission(
        &mut self,
        session: Option<&Session>,
    ) -> Result<NewApplication, FormError> {
        let completed = self.uploads.completed();
        self.submission.begin(&self.draft, &completed, session)
    }

    pub fn finish_submission(
        &mut self,
        result: Result<StoredApplication, FormError>,
    ) -> Option<ResetTicket> {
        self.submission.finish(result)
    }

    /// Validate, insert once, and report. The form is cleared only when the
    /// returned ticket is handed back to [`ApplicationForm::apply_reset`].
    pub async fn submit<T: TableService>(
        &mut self,
        table: &T,
        table_name: &str,
        session: Option<&Session>,
    ) -> Result<(StoredApplication, ResetTicket), FormError> {
        let record = self.begin_submission(session)?;
        match table.insert(table_name, &record).await {
            Ok(stored) => {
                let ticket = self.submission.succeed(&stored);
                Ok((stored, ticket))
            }
            Err(e) => {
                let error = FormError::service(e);
                self.submission.fail(&error);
                Err(error)
            }
        }
    }

    /// Clear the draft, every slot and the confirmation if `ticket` is still
    /// current.
    pub fn apply_reset(&mut self, ticket: ResetTicket) -> bool {
        if !self.submission.accepts(&ticket) {
            return false;
        }
        self.draft = ApplicationDraft::default();
        self.uploads.reset();
        self.submission.clear_notice();
        true
    }
}
