//! Client-side form logic: credentials, document uploads, draft validation
//! and the submission sequence. Network work is delegated to the
//! collaborator traits in [`crate::backend`].

pub mod credentials;
pub mod error;
pub mod form;
pub mod model;
pub mod session;
pub mod submission;
pub mod upload;
pub mod validation;
pub mod verification;

pub use credentials::{AuthMode, CredentialForm, CredentialOutcome, CredentialRequest};
pub use error::FormError;
pub use form::ApplicationForm;
pub use model::{
    ApplicationDraft, DocumentSlot, NewApplication, PENDING_STATUS, SelectedFile,
    StoredApplication,
};
pub use session::SessionStore;
pub use submission::{DEFAULT_RESET_DELAY, ResetTicket, SubmissionSequencer, SubmitState};
pub use upload::{MAX_UPLOAD_BYTES, SlotState, UploadRequest, UploadSlot, UploadSlots};
pub use validation::{ValidationError, is_valid_email, validate};
pub use verification::detect_verification;

/// A message attached to a region of the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Success(text) | Notice::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}
