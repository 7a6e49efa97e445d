//! Hosted-backend collaborators: identity, object storage and the
//! application table.
//!
//! The form logic in [`crate::core`] only talks to the traits below. Two
//! adapters implement them: [`remote::RemoteBackend`] speaks the
//! Supabase-compatible REST API, [`local::LocalBackend`] keeps everything in
//! a SQLite file and a directory tree.

pub mod local;
pub mod remote;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::core::{NewApplication, SelectedFile, StoredApplication};

pub use local::LocalBackend;
pub use remote::RemoteBackend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Outcome of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The account still has to be confirmed from the mail.
    Pending(Option<Identity>),
    /// The service confirmed the account and published a session.
    SignedIn(Identity),
}

/// A message the collaborator itself returned for a rejected request.
///
/// Shown to the user as-is; anything else is reported with its context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub upsert: bool,
}

pub trait IdentityService {
    fn get_session(&self) -> impl Future<Output = anyhow::Result<Option<Session>>> + Send;
    /// Register an account; the confirmation mail links back to `redirect_to`.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> impl Future<Output = anyhow::Result<Registration>> + Send;
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn sign_out(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
    /// Change notifications; the current session is always readable.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

pub trait StorageService {
    /// Store the file under `path` and return the stored object's reference.
    fn upload(
        &self,
        path: &str,
        file: &SelectedFile,
        options: &UploadOptions,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;
    fn public_url(&self, reference: &str) -> String;
}

pub trait TableService {
    fn insert(
        &self,
        table: &str,
        record: &NewApplication,
    ) -> impl Future<Output = anyhow::Result<StoredApplication>> + Send;
}

/// Publishes session changes to every subscriber.
#[derive(Debug)]
pub(crate) struct SessionChannel {
    sender: watch::Sender<Option<Session>>,
}

impl SessionChannel {
    pub(crate) fn new(initial: Option<Session>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub(crate) fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    pub(crate) fn publish(&self, session: Option<Session>) {
        self.sender.send_replace(session);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }
}

/// The collaborator the application was configured with.
#[derive(Debug)]
pub enum Backend {
    Remote(RemoteBackend),
    Local(LocalBackend),
}

impl Backend {
    pub async fn connect(config: &crate::config::Config) -> anyhow::Result<Self> {
        match &config.local_dir {
            Some(dir) => Ok(Backend::Local(
                LocalBackend::open_with_bucket(dir, &config.bucket).await?,
            )),
            None => Ok(Backend::Remote(RemoteBackend::new(config)?)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Backend::Remote(remote) => remote.base_url().to_string(),
            Backend::Local(local) => format!("local: {}", local.root().display()),
        }
    }
}

impl IdentityService for Backend {
    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        match self {
            Backend::Remote(b) => b.get_session().await,
            Backend::Local(b) => b.get_session().await,
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> anyhow::Result<Registration> {
        match self {
            Backend::Remote(b) => b.sign_up(email, password, redirect_to).await,
            Backend::Local(b) => b.sign_up(email, password, redirect_to).await,
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<()> {
        match self {
            Backend::Remote(b) => b.sign_in_with_password(email, password).await,
            Backend::Local(b) => b.sign_in_with_password(email, password).await,
        }
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        match self {
            Backend::Remote(b) => b.sign_out().await,
            Backend::Local(b) => b.sign_out().await,
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        match self {
            Backend::Remote(b) => b.subscribe(),
            Backend::Local(b) => b.subscribe(),
        }
    }
}

impl StorageService for Backend {
    async fn upload(
        &self,
        path: &str,
        file: &SelectedFile,
        options: &UploadOptions,
    ) -> anyhow::Result<String> {
        match self {
            Backend::Remote(b) => b.upload(path, file, options).await,
            Backend::Local(b) => b.upload(path, file, options).await,
        }
    }

    fn public_url(&self, reference: &str) -> String {
        match self {
            Backend::Remote(b) => b.public_url(reference),
            Backend::Local(b) => b.public_url(reference),
        }
    }
}

impl TableService for Backend {
    async fn insert(
        &self,
        table: &str,
        record: &NewApplication,
    ) -> anyhow::Result<StoredApplication> {
        match self {
            Backend::Remote(b) => b.insert(table, record).await,
            Backend::Local(b) => b.insert(table, record).await,
        }
    }
}
