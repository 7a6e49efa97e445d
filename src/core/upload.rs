use std::collections::BTreeSet;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    backend::{Session, StorageService, UploadOptions},
    core::{
        error::FormError,
        model::{ApplicationDraft, DocumentSlot, SelectedFile},
    },
};

/// Largest document accepted for any slot: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const CACHE_CONTROL: &str = "3600";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SlotState {
    #[default]
    Empty,
    Uploading {
        file: SelectedFile,
    },
    Complete {
        file: SelectedFile,
        url: String,
    },
    Failed {
        file: SelectedFile,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSlot {
    state: SlotState,
    /// Why the last selection was turned away before reaching storage.
    rejection: Option<String>,
    ticket: u64,
}

impl UploadSlot {
    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// Message to show under the slot, if any.
    pub fn message(&self) -> Option<&str> {
        match (&self.rejection, &self.state) {
            (Some(rejection), _) => Some(rejection),
            (None, SlotState::Failed { message, .. }) => Some(message),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        match &self.state {
            SlotState::Empty => None,
            SlotState::Uploading { file }
            | SlotState::Complete { file, .. }
            | SlotState::Failed { file, .. } => Some(file),
        }
    }

    pub fn is_uploading(&self) -> bool {
        matches!(self.state, SlotState::Uploading { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, SlotState::Complete { .. })
    }
}

/// An accepted selection waiting for the storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub slot: DocumentSlot,
    pub path: String,
    pub file: SelectedFile,
    pub options: UploadOptions,
    ticket: u64,
}

impl UploadRequest {
    /// Write the file and resolve its public reference URL.
    pub async fn send<S: StorageService>(&self, storage: &S) -> Result<String, FormError> {
        let reference = storage
            .upload(&self.path, &self.file, &self.options)
            .await
            .map_err(|e| {
                warn!(slot = self.slot.key(), "Upload failed: {e:#}");
                FormError::service(e)
            })?;
        Ok(storage.public_url(&reference))
    }
}

/// The three document slots of an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSlots {
    slots: [UploadSlot; 3],
}

impl UploadSlots {
    fn index(slot: DocumentSlot) -> usize {
        match slot {
            DocumentSlot::BusinessPlan => 0,
            DocumentSlot::FinancialStatements => 1,
            DocumentSlot::SupportingDocuments => 2,
        }
    }

    pub fn get(&self, slot: DocumentSlot) -> &UploadSlot {
        &self.slots[Self::index(slot)]
    }

    fn get_mut(&mut self, slot: DocumentSlot) -> &mut UploadSlot {
        &mut self.slots[Self::index(slot)]
    }

    pub fn completed(&self) -> BTreeSet<DocumentSlot> {
        DocumentSlot::ALL
            .into_iter()
            .filter(|slot| self.get(*slot).is_complete())
            .collect()
    }

    pub fn any_uploading(&self) -> bool {
        self.slots.iter().any(UploadSlot::is_uploading)
    }

    /// Vet a selection for `slot`.
    ///
    /// A rejected selection only records its message: the slot keeps whatever
    /// it held before and storage is never contacted. An accepted one moves
    /// the slot to uploading and clears its draft URL.
    pub fn begin(
        &mut self,
        slot: DocumentSlot,
        file: SelectedFile,
        session: Option<&Session>,
        draft: &mut ApplicationDraft,
    ) -> Result<UploadRequest, FormError> {
        let result = check_selection(slot, &file, session);
        let entry = self.get_mut(slot);
        let owner = match result {
            Ok(owner) => owner,
            Err(e) => {
                entry.rejection = Some(e.to_string());
                return Err(e);
            }
        };

        entry.ticket += 1;
        entry.rejection = None;
        entry.state = SlotState::Uploading { file: file.clone() };
        draft.set_document_url(slot, None);

        let path = object_path(owner, slot, &file);
        info!(slot = slot.key(), %path, size = file.size, "Uploading document");
        Ok(UploadRequest {
            slot,
            options: UploadOptions {
                content_type: file.content_type.clone(),
                cache_control: Some(CACHE_CONTROL.to_string()),
                upsert: false,
            },
            path,
            file,
            ticket: entry.ticket,
        })
    }

    /// Record the storage outcome. Returns `false` when the slot has since
    /// been re-selected or reset, in which case nothing changes.
    pub fn finish(
        &mut self,
        request: &UploadRequest,
        result: Result<String, FormError>,
        draft: &mut ApplicationDraft,
    ) -> bool {
        let entry = self.get_mut(request.slot);
        if entry.ticket != request.ticket || !entry.is_uploading() {
            return false;
        }
        let file = request.file.clone();
        match result {
            Ok(url) => {
                draft.set_document_url(request.slot, Some(url.clone()));
                entry.state = SlotState::Complete { file, url };
            }
            Err(e) => {
                draft.set_document_url(request.slot, None);
                entry.state = SlotState::Failed {
                    file,
                    message: e.to_string(),
                };
            }
        }
        true
    }

    /// Show `message` under `slot` without changing its state, e.g. when the
    /// chosen file could not be read.
    pub fn reject(&mut self, slot: DocumentSlot, message: impl Into<String>) {
        self.get_mut(slot).rejection = Some(message.into());
    }

    /// Empty every slot; uploads still in flight will be ignored.
    pub fn reset(&mut self) {
        for entry in &mut self.slots {
            *entry = UploadSlot {
                ticket: entry.ticket + 1,
                ..UploadSlot::default()
            };
        }
    }
}

fn check_selection(
    slot: DocumentSlot,
    file: &SelectedFile,
    session: Option<&Session>,
) -> Result<Uuid, FormError> {
    if file.size > MAX_UPLOAD_BYTES {
        return Err(FormError::Precondition(
            "File size must be less than 10MB".to_string(),
        ));
    }
    let accepted = file.extension().is_some_and(|ext| slot.accepts(&ext));
    if !accepted {
        return Err(FormError::Precondition(format!(
            "{} must be one of: {}",
            slot.label(),
            slot.accepted_extensions().join(", ")
        )));
    }
    session
        .map(|s| s.identity.id)
        .ok_or_else(|| {
            FormError::Precondition("You must be signed in to upload documents".to_string())
        })
}

/// `{owner}/{slot}/{uuid}.{ext}`: unique per upload and scoped to the owner.
pub fn object_path(owner: Uuid, slot: DocumentSlot, file: &SelectedFile) -> String {
    let name = match file.extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    format!("{}/{}/{}", owner, slot.key(), name)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::backend::Identity;

    fn file(name: &str, size: u64) -> SelectedFile {
        SelectedFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            size,
            content_type: "application/pdf".into(),
        }
    }

    fn session() -> Session {
        Session {
            identity: Identity {
                id: Uuid::new_v4(),
                email: "ann@acme.io".into(),
            },
            access_token: "token".into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[test]
    fn oversized_file_is_rejected_without_touching_slot() {
        let mut slots = UploadSlots::default();
        let mut draft = ApplicationDraft::default();
        let err = slots
            .begin(
                DocumentSlot::BusinessPlan,
                file("plan.pdf", MAX_UPLOAD_BYTES + 1),
                Some(&session()),
                &mut draft,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 10MB");
        let slot = slots.get(DocumentSlot::BusinessPlan);
        assert_eq!(slot.state(), &SlotState::Empty);
        assert_eq!(slot.message(), Some("File size must be less than 10MB"));
        assert!(draft.business_plan_url.is_none());
    }

    #[test]
    fn exactly_ten_mebibytes_is_accepted() {
        let mut slots = UploadSlots::default();
        let mut draft = ApplicationDraft::default();
        assert!(slots
            .begin(
                DocumentSlot::BusinessPlan,
                file("plan.pdf", MAX_UPLOAD_BYTES),
                Some(&session()),
                &mut draft,
            )
            .is_ok());
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let mut slots = UploadSlots::default();
        let err = slots
            .begin(
                DocumentSlot::FinancialStatements,
                file("ledger.exe", 10),
                Some(&session()),
                &mut ApplicationDraft::default(),
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("Financial Statements must be one of"));
    }

    #[test]
    fn upload_requires_session() {
        let mut slots = UploadSlots::default();
        let err = slots
            .begin(
                DocumentSlot::BusinessPlan,
                file("plan.pdf", 10),
                None,
                &mut ApplicationDraft::default(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            FormError::Precondition("You must be signed in to upload documents".into())
        );
    }

    #[test]
    fn path_is_scoped_to_owner_and_slot() {
        let session = session();
        let mut slots = UploadSlots::default();
        let request = slots
            .begin(
                DocumentSlot::SupportingDocuments,
                file("Photo.JPG", 10),
                Some(&session),
                &mut ApplicationDraft::default(),
            )
            .unwrap();
        let prefix = format!("{}/supporting_documents/", session.identity.id);
        assert!(request.path.starts_with(&prefix));
        assert!(request.path.ends_with(".jpg"));
    }

    #[test]
    fn completion_writes_url_into_draft() {
        let mut slots = UploadSlots::default();
        let mut draft = ApplicationDraft::default();
        let request = slots
            .begin(DocumentSlot::BusinessPlan, file("plan.pdf", 10), Some(&session()), &mut draft)
            .unwrap();
        assert!(slots.finish(&request, Ok("https://cdn/plan.pdf".into()), &mut draft));
        assert_eq!(draft.business_plan_url.as_deref(), Some("https://cdn/plan.pdf"));
        assert_eq!(slots.completed(), [DocumentSlot::BusinessPlan].into_iter().collect());
    }

    #[test]
    fn failure_leaves_slot_unset() {
        let mut slots = UploadSlots::default();
        let mut draft = ApplicationDraft::default();
        let request = slots
            .begin(DocumentSlot::BusinessPlan, file("plan.pdf", 10), Some(&session()), &mut draft)
            .unwrap();
        slots.finish(&request, Err(FormError::Service("Bucket not found".into())), &mut draft);
        assert!(draft.business_plan_url.is_none());
        assert!(slots.completed().is_empty());
        assert_eq!(
            slots.get(DocumentSlot::BusinessPlan).message(),
            Some("Bucket not found")
        );
    }

    #[test]
    fn superseded_completion_is_ignored() {
        let session = session();
        let mut slots = UploadSlots::default();
        let mut draft = ApplicationDraft::default();
        let first = slots
            .begin(DocumentSlot::BusinessPlan, file("old.pdf", 10), Some(&session), &mut draft)
            .unwrap();
        let second = slots
            .begin(DocumentSlot::BusinessPlan, file("new.pdf", 10), Some(&session), &mut draft)
            .unwrap();
        assert!(!slots.finish(&first, Ok("old-url".into()), &mut draft));
        assert!(draft.business_plan_url.is_none());
        assert!(slots.finish(&second, Ok("new-url".into()), &mut draft));
        assert_eq!(draft.business_plan_url.as_deref(), Some("new-url"));

        let third = slots
            .begin(DocumentSlot::BusinessPlan, file("late.pdf", 10), Some(&session), &mut draft)
            .unwrap();
        slots.reset();
        assert!(!slots.finish(&third, Ok("late-url".into()), &mut draft));
        assert_eq!(slots.get(DocumentSlot::BusinessPlan).state(), &SlotState::Empty);
    }
}
