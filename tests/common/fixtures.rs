use std::{
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use grantdesk::{
    ApplicationDraft, Identity, LocalBackend, NewApplication, SelectedFile, ServiceError, Session,
    StorageService, StoredApplication, TableService, UploadOptions,
};
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

pub const TEST_RESET_DELAY: Duration = Duration::from_secs(3);

/// A signed-in session for a fresh user.
pub fn make_test_session(email: &str) -> Session {
    Session {
        identity: Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        },
        access_token: "test-token".to_string(),
        refresh_token: None,
        expires_at: None,
    }
}

/// A draft that passes validation once all three documents are uploaded.
pub fn make_valid_draft() -> ApplicationDraft {
    ApplicationDraft {
        company_name: "Acme Robotics".to_string(),
        contact_email: "ann@acme.io".to_string(),
        contact_phone: String::new(),
        contact_person: "Ann Lee".to_string(),
        grant_amount: Some(50_000.0),
        project_description: "Automate the warehouse".to_string(),
        ..Default::default()
    }
}

/// Creates a file of `size` bytes named `name` inside `dir`.
pub fn create_test_document(dir: &TempDir, name: &str, size: u64) -> PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).expect("Failed to create test document");
    file.set_len(size).expect("Failed to size test document");
    path
}

/// Creates a document on disk and describes it the way a file picker would.
pub async fn make_selected_file(dir: &TempDir, name: &str, size: u64) -> SelectedFile {
    let path = create_test_document(dir, name, size);
    SelectedFile::from_path(path)
        .await
        .expect("Failed to read test document")
}

/// Creates a LocalBackend in a temporary directory.
/// Returns both the backend and the temp directory (which must be kept alive).
pub async fn create_test_backend() -> (LocalBackend, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let backend = LocalBackend::open(dir.path().join("data"))
        .await
        .expect("Failed to open local backend");
    (backend, dir)
}

/// In-memory storage and table collaborator that records every call.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub uploads: Mutex<Vec<(String, UploadOptions)>>,
    pub inserts: Mutex<Vec<(String, NewApplication)>>,
    pub upload_error: Option<String>,
    pub insert_error: Option<String>,
    pub next_id: Mutex<u64>,
}

impl RecordingBackend {
    pub fn failing_uploads(message: &str) -> Self {
        Self {
            upload_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn failing_inserts(message: &str) -> Self {
        Self {
            insert_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }
}

impl StorageService for RecordingBackend {
    async fn upload(
        &self,
        path: &str,
        _file: &SelectedFile,
        options: &UploadOptions,
    ) -> anyhow::Result<String> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), options.clone()));
        match &self.upload_error {
            Some(message) => Err(ServiceError(message.clone()).into()),
            None => Ok(path.to_string()),
        }
    }

    fn public_url(&self, reference: &str) -> String {
        format!("https://cdn.test/grant-documents/{reference}")
    }
}

impl TableService for RecordingBackend {
    async fn insert(
        &self,
        table: &str,
        record: &NewApplication,
    ) -> anyhow::Result<StoredApplication> {
        self.inserts
            .lock()
            .unwrap()
            .push((table.to_string(), record.clone()));
        if let Some(message) = &self.insert_error {
            return Err(ServiceError(message.clone()).into());
        }
        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            *next_id
        };
        Ok(StoredApplication {
            id: id.to_string(),
            created_at: OffsetDateTime::now_utc(),
            record: record.clone(),
        })
    }
}
