use std::path::{Path, PathBuf};

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{
        Identity, IdentityService, Registration, ServiceError, Session, SessionChannel,
        StorageService, TableService, UploadOptions,
    },
    config::Config,
    core::{NewApplication, SelectedFile, StoredApplication},
};

const USER_AGENT: &str = concat!("grantdesk/", env!("CARGO_PKG_VERSION"));

/// Tokens this close to expiry are refreshed before they are sent.
const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Client for a Supabase-compatible backend: GoTrue auth, storage API and
/// PostgREST tables.
#[derive(Debug)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    sessions: SessionChannel,
    session_file: Option<PathBuf>,
    refresh_lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserResponse,
}

impl TokenResponse {
    fn into_session(self, now: OffsetDateTime) -> Session {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => OffsetDateTime::from_unix_timestamp(at).ok(),
            (None, Some(seconds)) => Some(now + Duration::seconds(seconds)),
            (None, None) => None,
        };
        Session {
            identity: self.user.into(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Sign-up answers with a session when the project auto-confirms, otherwise
/// with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserResponse),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

impl RemoteBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        let initial = config
            .session_file
            .as_ref()
            .and_then(|path| read_session_file(path));
        if initial.is_some() {
            info!("Restored saved session");
        }
        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            bucket: config.bucket.clone(),
            sessions: SessionChannel::new(initial),
            session_file: config.session_file.clone(),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the project key and the caller's token (the anon key when
    /// signed out).
    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .fresh_session()
            .await
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        builder.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// The current session, refreshed first when it is about to expire.
    ///
    /// An expired session that cannot be refreshed is dropped and the change
    /// is published like a sign-out.
    async fn fresh_session(&self) -> Option<Session> {
        let session = self.sessions.current()?;
        if !session.is_expired(OffsetDateTime::now_utc() + REFRESH_MARGIN) {
            return Some(session);
        }

        let _guard = self.refresh_lock.lock().await;
        // a concurrent request may have refreshed while we waited
        let session = self.sessions.current()?;
        let now = OffsetDateTime::now_utc();
        if !session.is_expired(now + REFRESH_MARGIN) {
            return Some(session);
        }
        let refreshed = match &session.refresh_token {
            Some(token) => match self.refresh(token).await {
                Ok(refreshed) => Some(refreshed),
                Err(e) if !session.is_expired(now) => {
                    warn!("Session refresh failed, keeping current token: {e:#}");
                    return Some(session);
                }
                Err(e) => {
                    warn!("Session refresh failed: {e:#}");
                    None
                }
            },
            None if !session.is_expired(now) => return Some(session),
            None => None,
        };
        debug!(refreshed = refreshed.is_some(), "Session was due for refresh");
        self.set_session(refreshed.clone()).await;
        refreshed
    }

    async fn set_session(&self, session: Option<Session>) {
        if let Some(path) = &self.session_file {
            let result = match &session {
                Some(session) => match serde_json::to_vec_pretty(session) {
                    Ok(bytes) => tokio::fs::write(path, bytes).await,
                    Err(e) => Err(std::io::Error::other(e)),
                },
                None => match tokio::fs::remove_file(path).await {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                warn!("Failed to update session file {:?}: {e}", path);
            }
        }
        self.sessions.publish(session);
    }

    async fn refresh(&self, refresh_token: &str) -> anyhow::Result<Session> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .context("Failed to reach identity service")?;
        let token: TokenResponse = check(response)
            .await?
            .json()
            .await
            .context("Malformed token response")?;
        Ok(token.into_session(OffsetDateTime::now_utc()))
    }
}

impl IdentityService for RemoteBackend {
    async fn get_session(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.fresh_session().await)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> anyhow::Result<Registration> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/signup"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to reach identity service")?;
        let body: Option<SignUpResponse> = check(response)
            .await?
            .json()
            .await
            .context("Malformed sign-up response")?;
        match body {
            Some(SignUpResponse::Session(token)) => {
                let session = token.into_session(OffsetDateTime::now_utc());
                let identity = session.identity.clone();
                info!(user = %identity.id, "Sign-up confirmed immediately");
                self.set_session(Some(session)).await;
                Ok(Registration::SignedIn(identity))
            }
            Some(SignUpResponse::User(user)) => Ok(Registration::Pending(Some(user.into()))),
            None => Ok(Registration::Pending(None)),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .context("Failed to reach identity service")?;
        let token: TokenResponse = check(response)
            .await?
            .json()
            .await
            .context("Malformed token response")?;
        let session = token.into_session(OffsetDateTime::now_utc());
        info!(user = %session.identity.id, "Signed in");
        self.set_session(Some(session)).await;
        Ok(())
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };
        let result = self
            .client
            .post(self.endpoint("auth/v1/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .context("Failed to reach identity service");
        self.set_session(None).await;
        check(result?).await?;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe()
    }
}

impl StorageService for RemoteBackend {
    async fn upload(
        &self,
        path: &str,
        file: &SelectedFile,
        options: &UploadOptions,
    ) -> anyhow::Result<String> {
        let body = tokio::fs::read(&file.path)
            .await
            .with_context(|| format!("Failed to read {:?}", file.path))?;
        let mut request = self
            .client
            .post(self.endpoint(&format!("storage/v1/object/{}/{}", self.bucket, path)))
            .header("content-type", &options.content_type)
            .header("x-upsert", options.upsert.to_string());
        if let Some(cache_control) = &options.cache_control {
            request = request.header("cache-control", format!("max-age={cache_control}"));
        }
        let response = self
            .authorized(request)
            .await
            .body(body)
            .send()
            .await
            .context("Failed to reach storage service")?;
        let stored: UploadResponse = check(response)
            .await?
            .json()
            .await
            .context("Malformed upload response")?;
        debug!(key = ?stored.key, "Stored object");
        Ok(path.to_string())
    }

    fn public_url(&self, reference: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            self.bucket,
            reference.trim_start_matches('/')
        ))
    }
}

impl TableService for RemoteBackend {
    async fn insert(
        &self,
        table: &str,
        record: &NewApplication,
    ) -> anyhow::Result<StoredApplication> {
        let request = self
            .client
            .post(self.endpoint(&format!("rest/v1/{table}")))
            .header("Prefer", "return=representation")
            .json(&[record]);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .context("Failed to reach table service")?;
        let mut rows: Vec<StoredApplication> = check(response)
            .await?
            .json()
            .await
            .context("Malformed insert response")?;
        rows.pop()
            .ok_or_else(|| anyhow::anyhow!("Insert returned no rows"))
    }
}

/// Turn a non-success response into an error carrying the service's own
/// message.
async fn check(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError(error_message(status, &body)).into())
}

fn error_message(status: StatusCode, body: &str) -> String {
    const FIELDS: [&str; 4] = ["error_description", "msg", "message", "error"];
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in FIELDS {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn read_session_file(path: &Path) -> Option<Session> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read session file {:?}: {e}", path);
            return None;
        }
    };
    serde_json::from_str(&contents)
        .map_err(|e| warn!("Ignoring malformed session file {:?}: {e}", path))
        .ok()
}
