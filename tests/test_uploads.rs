//! Integration tests for document uploads.
//!
//! Tests cover:
//! - Size, extension and session checks happening before storage is called
//! - Object paths, upload options and the URL written into the draft
//! - Storage failures leaving the slot without a URL

mod common;

use common::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_oversized_file_never_reaches_storage() -> anyhow::Result<()> {
    // 1. Pick a file one byte over the limit
    let dir = TempDir::new()?;
    let storage = RecordingBackend::default();
    let session = make_test_session("ann@acme.io");
    let file = make_selected_file(&dir, "plan.pdf", MAX_UPLOAD_BYTES + 1).await;
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);

    // 2. Try to upload it
    let err = form
        .upload_document(&storage, Some(&session), DocumentSlot::BusinessPlan, file)
        .await
        .unwrap_err();

    // 3. Verify the rejection and that storage was never called
    assert_eq!(err.to_string(), "File size must be less than 10MB");
    assert_eq!(storage.upload_count(), 0);
    let slot = form.uploads().get(DocumentSlot::BusinessPlan);
    assert_eq!(slot.state(), &SlotState::Empty);
    assert_eq!(slot.message(), Some("File size must be less than 10MB"));
    assert!(form.draft.business_plan_url.is_none());

    Ok(())
}

#[tokio::test]
async fn test_signed_out_upload_is_refused() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let storage = RecordingBackend::default();
    let file = make_selected_file(&dir, "plan.pdf", 100).await;
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);

    let err = form
        .upload_document(&storage, None, DocumentSlot::BusinessPlan, file)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FormError::Precondition("You must be signed in to upload documents".to_string())
    );
    assert_eq!(storage.upload_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_disallowed_extension_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let storage = RecordingBackend::default();
    let session = make_test_session("ann@acme.io");
    let file = make_selected_file(&dir, "statements.pdf.exe", 100).await;
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);

    let err = form
        .upload_document(
            &storage,
            Some(&session),
            DocumentSlot::FinancialStatements,
            file,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FormError::Precondition(_)));
    assert_eq!(storage.upload_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_upload_path_options_and_url() -> anyhow::Result<()> {
    // 1. Upload a valid business plan
    let dir = TempDir::new()?;
    let storage = RecordingBackend::default();
    let session = make_test_session("ann@acme.io");
    let file = make_selected_file(&dir, "Plan.PDF", 4096).await;
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);
    let url = form
        .upload_document(&storage, Some(&session), DocumentSlot::BusinessPlan, file)
        .await?;

    // 2. Verify the object path and upload options
    let uploads = storage.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (path, options) = &uploads[0];
    let prefix = format!("{}/business_plan/", session.identity.id);
    assert!(path.starts_with(&prefix), "unexpected path {path}");
    assert!(path.ends_with(".pdf"));
    assert_eq!(
        options,
        &UploadOptions {
            content_type: "application/pdf".to_string(),
            cache_control: Some("3600".to_string()),
            upsert: false,
        }
    );

    // 3. Verify the public URL lands in the draft and the slot is complete
    assert_eq!(url, format!("https://cdn.test/grant-documents/{path}"));
    assert_eq!(form.draft.business_plan_url.as_deref(), Some(url.as_str()));
    assert!(form.uploads().get(DocumentSlot::BusinessPlan).is_complete());

    Ok(())
}

#[tokio::test]
async fn test_each_upload_gets_a_unique_path() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let storage = RecordingBackend::default();
    let session = make_test_session("ann@acme.io");
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);
    for _ in 0..2 {
        let file = make_selected_file(&dir, "plan.pdf", 10).await;
        form.upload_document(&storage, Some(&session), DocumentSlot::BusinessPlan, file)
            .await?;
    }

    let uploads = storage.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_ne!(uploads[0].0, uploads[1].0);

    Ok(())
}

#[tokio::test]
async fn test_storage_failure_leaves_slot_unset() -> anyhow::Result<()> {
    // 1. Upload against storage that rejects everything
    let dir = TempDir::new()?;
    let storage = RecordingBackend::failing_uploads("Bucket not found");
    let session = make_test_session("ann@acme.io");
    let file = make_selected_file(&dir, "plan.docx", 10).await;
    let mut form = ApplicationForm::new(TEST_RESET_DELAY);

    let err = form
        .upload_document(&storage, Some(&session), DocumentSlot::BusinessPlan, file)
        .await
        .unwrap_err();

    // 2. Verify the failure is recorded on the slot and nothing was kept
    assert_eq!(err, FormError::Service("Bucket not found".to_string()));
    assert_eq!(storage.upload_count(), 1);
    let slot = form.uploads().get(DocumentSlot::BusinessPlan);
    assert!(matches!(slot.state(), SlotState::Failed { .. }));
    assert_eq!(slot.message(), Some("Bucket not found"));
    assert!(form.draft.business_plan_url.is_none());
    assert!(form.uploads().completed().is_empty());

    Ok(())
}
