mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from grantdesk for tests
pub use grantdesk::{
    ApplicationDraft, ApplicationForm, DocumentSlot, FormError, IdentityService, LocalBackend,
    NewApplication, SelectedFile, Session, SessionStore, StorageService, StoredApplication,
    TableService, UploadOptions,
    core::{Notice, SlotState, MAX_UPLOAD_BYTES},
};
