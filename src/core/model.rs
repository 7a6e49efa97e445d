use std::{fmt, path::{Path, PathBuf}};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Status every application is inserted with.
pub const PENDING_STATUS: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    BusinessPlan,
    FinancialStatements,
    SupportingDocuments,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 3] = [
        DocumentSlot::BusinessPlan,
        DocumentSlot::FinancialStatements,
        DocumentSlot::SupportingDocuments,
    ];

    /// Key used for object paths and the `{key}_url` draft field.
    pub fn key(self) -> &'static str {
        match self {
            DocumentSlot::BusinessPlan => "business_plan",
            DocumentSlot::FinancialStatements => "financial_statements",
            DocumentSlot::SupportingDocuments => "supporting_documents",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentSlot::BusinessPlan => "Business Plan",
            DocumentSlot::FinancialStatements => "Financial Statements",
            DocumentSlot::SupportingDocuments => "Supporting Documents",
        }
    }

    /// Lowercase file extensions accepted for this slot.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            DocumentSlot::BusinessPlan => &["pdf", "doc", "docx"],
            DocumentSlot::FinancialStatements => &["pdf", "xls", "xlsx", "csv"],
            DocumentSlot::SupportingDocuments => {
                &["pdf", "doc", "docx", "png", "jpg", "jpeg", "zip"]
            }
        }
    }

    pub fn accepts(self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.accepted_extensions().contains(&extension.as_str())
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The application as the user is editing it.
///
/// Never carries an owner or a status: those only exist on [`NewApplication`],
/// which is built at submission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDraft {
    pub company_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_person: String,
    pub grant_amount: Option<f64>,
    pub project_description: String,
    pub business_plan_url: Option<String>,
    pub financial_statements_url: Option<String>,
    pub supporting_documents_url: Option<String>,
}

impl ApplicationDraft {
    pub fn document_url(&self, slot: DocumentSlot) -> Option<&str> {
        match slot {
            DocumentSlot::BusinessPlan => self.business_plan_url.as_deref(),
            DocumentSlot::FinancialStatements => self.financial_statements_url.as_deref(),
            DocumentSlot::SupportingDocuments => self.supporting_documents_url.as_deref(),
        }
    }

    pub fn set_document_url(&mut self, slot: DocumentSlot, url: Option<String>) {
        let field = match slot {
            DocumentSlot::BusinessPlan => &mut self.business_plan_url,
            DocumentSlot::FinancialStatements => &mut self.financial_statements_url,
            DocumentSlot::SupportingDocuments => &mut self.supporting_documents_url,
        };
        *field = url;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Record sent to the table collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub company_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub contact_person: String,
    pub grant_amount: f64,
    pub project_description: String,
    pub business_plan_url: Option<String>,
    pub financial_statements_url: Option<String>,
    pub supporting_documents_url: Option<String>,
    pub status: String,
    pub user_id: Uuid,
}

impl NewApplication {
    /// Attach the owner and the pending status to a validated draft.
    pub(crate) fn from_draft(draft: &ApplicationDraft, grant_amount: f64, owner: Uuid) -> Self {
        Self {
            company_name: draft.company_name.trim().to_string(),
            contact_email: draft.contact_email.trim().to_string(),
            contact_phone: draft.contact_phone.trim().to_string(),
            contact_person: draft.contact_person.trim().to_string(),
            grant_amount,
            project_description: draft.project_description.trim().to_string(),
            business_plan_url: draft.business_plan_url.clone(),
            financial_statements_url: draft.financial_statements_url.clone(),
            supporting_documents_url: draft.supporting_documents_url.clone(),
            status: PENDING_STATUS.to_string(),
            user_id: owner,
        }
    }
}

/// A row as returned by the table collaborator after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredApplication {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub record: NewApplication,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RowId {
        Text(String),
        Number(i64),
    }

    Ok(match RowId::deserialize(deserializer)? {
        RowId::Text(id) => id,
        RowId::Number(id) => id.to_string(),
    })
}

/// A file the user picked for one of the document slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

impl SelectedFile {
    pub async fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Failed to read file metadata for {:?}", path))?;
        if !metadata.is_file() {
            anyhow::bail!("Not a regular file: {:?}", path);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let content_type = content_type_for(&name).to_string();
        Ok(Self {
            path,
            name,
            size: metadata.len(),
            content_type,
        })
    }

    /// Lowercased extension of the original file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
