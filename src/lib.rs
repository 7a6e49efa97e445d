pub mod backend;
pub mod config;
pub mod core;

pub use backend::{
    Backend, Identity, IdentityService, Registration, ServiceError, Session, StorageService,
    TableService, UploadOptions, local::LocalBackend, remote::RemoteBackend,
};
pub use config::Config;
pub use core::{
    ApplicationDraft, ApplicationForm, CredentialForm, CredentialOutcome, DocumentSlot, FormError,
    NewApplication, SelectedFile, SessionStore, StoredApplication, ValidationError,
};

#[cfg(feature = "gui")]
pub mod gui;
