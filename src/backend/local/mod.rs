//! Self-contained backend: accounts, sessions and applications in SQLite,
//! documents copied into a directory tree.
//!
//! Mirrors the hosted service's rules that matter to the client: objects
//! live under the uploader's id, rows can only be inserted for the signed-in
//! user, and existing objects are not overwritten unless asked.

mod state;

use std::path::Path;

use anyhow::Context;
use reqwest::Url;
use sha2::{Digest, Sha256};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{
        Identity, IdentityService, Registration, ServiceError, Session, SessionChannel,
        StorageService, TableService, UploadOptions,
    },
    core::{NewApplication, SelectedFile, StoredApplication},
};
use state::LocalState;

const APPLICATIONS_TABLE: &str = "grant_applications";
const DEFAULT_BUCKET: &str = "grant-documents";

#[derive(Debug)]
pub struct LocalBackend {
    state: LocalState,
    bucket: String,
    sessions: SessionChannel,
}

impl LocalBackend {
    /// Open (or create) a local backend under `root`, restoring the most
    /// recent session.
    pub async fn open<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        Self::open_with_bucket(root, DEFAULT_BUCKET).await
    }

    pub async fn open_with_bucket<P: AsRef<Path>>(root: P, bucket: &str) -> anyhow::Result<Self> {
        let state = LocalState::open(root).await?;
        let initial = latest_session(&state).await?;
        info!(root = ?state.root(), restored = initial.is_some(), "Opened local backend");
        Ok(Self {
            state,
            bucket: bucket.to_string(),
            sessions: SessionChannel::new(initial),
        })
    }

    pub fn root(&self) -> &Path {
        self.state.root()
    }

    fn require_session(&self) -> anyhow::Result<Session> {
        self.sessions
            .current()
            .ok_or_else(|| rejected("Unauthorized"))
    }
}

async fn latest_session(state: &LocalState) -> anyhow::Result<Option<Session>> {
    let row: Option<(String, String, String)> = sqlx::query_as(
        r#"SELECT s.access_token, u.id, u.email
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        ORDER BY s.created_at DESC, s.rowid DESC
        LIMIT 1"#,
    )
    .fetch_optional(state.pool())
    .await?;
    row.map(|(access_token, id, email)| {
        Ok(Session {
            identity: Identity {
                id: Uuid::parse_str(&id)?,
                email,
            },
            access_token,
            refresh_token: None,
            expires_at: None,
        })
    })
    .transpose()
}

fn now_rfc3339() -> anyhow::Result<String> {
    Ok(OffsetDateTime::now_utc().format(&Rfc3339)?)
}

fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    hex::encode(digest)
}

/// A refusal reported the way the hosted service words it.
fn rejected(message: impl Into<String>) -> anyhow::Error {
    ServiceError(message.into()).into()
}

impl IdentityService for LocalBackend {
    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.current())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> anyhow::Result<Registration> {
        let email = email.trim().to_string();
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(self.state.pool())
            .await?;
        if existing.is_some() {
            return Err(rejected("User already registered"));
        }
        let id = Uuid::new_v4();
        let salt = Uuid::new_v4().simple().to_string();
        sqlx::query(
            r#"INSERT INTO users (id, email, password_salt, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id.to_string())
        .bind(&email)
        .bind(&salt)
        .bind(hash_password(&salt, password))
        .bind(now_rfc3339()?)
        .execute(self.state.pool())
        .await
        .context("Failed to create user")?;
        // No mail goes out locally; the account is usable right away.
        info!(%email, %redirect_to, "Registered local account");
        Ok(Registration::Pending(Some(Identity { id, email })))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<()> {
        let user: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, password_salt, password_hash FROM users WHERE email = $1",
        )
        .bind(email.trim())
        .fetch_optional(self.state.pool())
        .await?;
        let Some((id, email, salt, expected)) = user else {
            return Err(rejected("Invalid login credentials"));
        };
        if hash_password(&salt, password) != expected {
            return Err(rejected("Invalid login credentials"));
        }
        let access_token = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (access_token, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(&access_token)
            .bind(&id)
            .bind(now_rfc3339()?)
            .execute(self.state.pool())
            .await?;
        let session = Session {
            identity: Identity {
                id: Uuid::parse_str(&id)?,
                email,
            },
            access_token,
            refresh_token: None,
            expires_at: None,
        };
        debug!(user = %session.identity.id, "Local sign-in");
        self.sessions.publish(Some(session));
        Ok(())
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };
        self.sessions.publish(None);
        sqlx::query("DELETE FROM sessions WHERE access_token = $1")
            .bind(&session.access_token)
            .execute(self.state.pool())
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe()
    }
}

impl StorageService for LocalBackend {
    async fn upload(
        &self,
        path: &str,
        file: &SelectedFile,
        options: &UploadOptions,
    ) -> anyhow::Result<String> {
        let session = self.require_session()?;
        let owner = session.identity.id.to_string();
        if path.split('/').next() != Some(owner.as_str()) {
            return Err(rejected("new row violates row-level security policy"));
        }
        self.state.object_file(&self.bucket, path)?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT path FROM objects WHERE bucket = $1 AND path = $2")
                .bind(&self.bucket)
                .bind(path)
                .fetch_optional(self.state.pool())
                .await?;
        if existing.is_some() && !options.upsert {
            return Err(rejected("The resource already exists"));
        }

        let size = i64::try_from(file.size).context("File too large")?;
        self.state.store_object(&self.bucket, path, &file.path).await?;
        let recorded = sqlx::query(
            r#"INSERT INTO objects (bucket, path, owner_id, content_type, size, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (bucket, path) DO UPDATE SET
                content_type = EXCLUDED.content_type,
                size = EXCLUDED.size,
                created_at = EXCLUDED.created_at"#,
        )
        .bind(&self.bucket)
        .bind(path)
        .bind(&owner)
        .bind(&options.content_type)
        .bind(size)
        .bind(now_rfc3339()?)
        .execute(self.state.pool())
        .await;
        if let Err(e) = recorded {
            if let Err(cleanup) = self.state.delete_object(&self.bucket, path).await {
                warn!("Failed to remove orphaned object: {cleanup:#}");
            }
            return Err(e.into());
        }
        debug!(%path, size, "Stored local object");
        Ok(path.to_string())
    }

    fn public_url(&self, reference: &str) -> String {
        match self.state.object_file(&self.bucket, reference) {
            Ok(file) => Url::from_file_path(&file)
                .map(String::from)
                .unwrap_or_else(|()| file.display().to_string()),
            Err(_) => reference.to_string(),
        }
    }
}

impl TableService for LocalBackend {
    async fn insert(
        &self,
        table: &str,
        record: &NewApplication,
    ) -> anyhow::Result<StoredApplication> {
        if table != APPLICATIONS_TABLE {
            return Err(rejected(format!("relation \"{table}\" does not exist")));
        }
        let session = self.require_session()?;
        if session.identity.id != record.user_id {
            return Err(rejected(format!(
                "new row violates row-level security policy for table \"{table}\""
            )));
        }
        let created_at = OffsetDateTime::now_utc();
        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO grant_applications (
                created_at, company_name, contact_email, contact_phone, contact_person,
                grant_amount, project_description, business_plan_url,
                financial_statements_url, supporting_documents_url, status, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id"#,
        )
        .bind(created_at.format(&Rfc3339)?)
        .bind(&record.company_name)
        .bind(&record.contact_email)
        .bind(&record.contact_phone)
        .bind(&record.contact_person)
        .bind(record.grant_amount)
        .bind(&record.project_description)
        .bind(&record.business_plan_url)
        .bind(&record.financial_statements_url)
        .bind(&record.supporting_documents_url)
        .bind(&record.status)
        .bind(record.user_id.to_string())
        .fetch_one(self.state.pool())
        .await?;
        info!(id, "Inserted application");
        Ok(StoredApplication {
            id: id.to_string(),
            created_at,
            record: record.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_depends_on_salt() {
        let a = hash_password("salt-a", "secret");
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_eq!(a, hash_password("salt-a", "secret"));
        assert_ne!(a, hash_password("salt-b", "secret"));
    }
}
