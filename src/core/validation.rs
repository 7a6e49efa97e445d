use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::model::{ApplicationDraft, DocumentSlot};

pub const MIN_GRANT_AMOUNT: f64 = 1_000.0;
pub const MAX_GRANT_AMOUNT: f64 = 1_000_000.0;

/// The single reason a draft is not ready for submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Grant amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Grant amount must be between $1,000 and $1,000,000")]
    AmountOutOfRange,

    #[error("Please upload the {0} document")]
    MissingDocument(DocumentSlot),
}

/// Check a draft before it may be submitted.
///
/// Rules run in a fixed order and the first failure is returned: required
/// fields, email shape, grant amount bounds, then document presence.
pub fn validate(
    draft: &ApplicationDraft,
    completed: &BTreeSet<DocumentSlot>,
) -> Result<f64, ValidationError> {
    let required = [
        ("Company name", draft.company_name.as_str()),
        ("Contact person", draft.contact_person.as_str()),
        ("Contact email", draft.contact_email.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
    }
    let amount = match draft.grant_amount {
        Some(amount) if amount.is_finite() => amount,
        _ => return Err(ValidationError::MissingField("Grant amount")),
    };
    if draft.project_description.trim().is_empty() {
        return Err(ValidationError::MissingField("Project description"));
    }
    if amount <= 0.0 {
        return Err(ValidationError::NonPositiveAmount);
    }

    if !is_valid_email(&draft.contact_email) {
        return Err(ValidationError::InvalidEmail);
    }

    if !(MIN_GRANT_AMOUNT..=MAX_GRANT_AMOUNT).contains(&amount) {
        return Err(ValidationError::AmountOutOfRange);
    }

    if let Some(missing) = DocumentSlot::ALL
        .into_iter()
        .find(|slot| !completed.contains(slot))
    {
        return Err(ValidationError::MissingDocument(missing));
    }

    Ok(amount)
}

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> ApplicationDraft {
        ApplicationDraft {
            company_name: "Acme Robotics".into(),
            contact_email: "ann@acme.io".into(),
            contact_phone: "555-0100".into(),
            contact_person: "Ann Lee".into(),
            grant_amount: Some(25_000.0),
            project_description: "Automated widget assembly".into(),
            ..Default::default()
        }
    }

    fn all_slots() -> BTreeSet<DocumentSlot> {
        DocumentSlot::ALL.into_iter().collect()
    }

    #[test]
    fn accepts_complete_draft() {
        assert_eq!(validate(&complete_draft(), &all_slots()), Ok(25_000.0));
    }

    #[test]
    fn reports_each_missing_field_by_name() {
        let cases: [(fn(&mut ApplicationDraft), &str); 5] = [
            (|d| d.company_name.clear(), "Company name"),
            (|d| d.contact_person = "   ".into(), "Contact person"),
            (|d| d.contact_email.clear(), "Contact email"),
            (|d| d.grant_amount = None, "Grant amount"),
            (|d| d.project_description.clear(), "Project description"),
        ];
        for (clear, field) in cases {
            let mut draft = complete_draft();
            clear(&mut draft);
            assert_eq!(
                validate(&draft, &all_slots()),
                Err(ValidationError::MissingField(field))
            );
        }
    }

    #[test]
    fn phone_is_optional() {
        let mut draft = complete_draft();
        draft.contact_phone.clear();
        assert!(validate(&draft, &all_slots()).is_ok());
    }

    #[test]
    fn rejects_non_positive_amount_before_email() {
        let mut draft = complete_draft();
        draft.grant_amount = Some(0.0);
        draft.contact_email = "broken".into();
        assert_eq!(
            validate(&draft, &all_slots()),
            Err(ValidationError::NonPositiveAmount)
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("ab.co"));
        assert!(!is_valid_email("a@bco"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@.co"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@b@c.de"));
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        for (amount, ok) in [
            (999.99, false),
            (1_000.0, true),
            (1_000_000.0, true),
            (1_000_000.01, false),
        ] {
            let mut draft = complete_draft();
            draft.grant_amount = Some(amount);
            let result = validate(&draft, &all_slots());
            if ok {
                assert_eq!(result, Ok(amount));
            } else {
                assert_eq!(result, Err(ValidationError::AmountOutOfRange));
            }
        }
    }

    #[test]
    fn names_first_missing_document() {
        let completed = [DocumentSlot::BusinessPlan].into_iter().collect();
        let err = validate(&complete_draft(), &completed).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingDocument(DocumentSlot::FinancialStatements)
        );
        assert_eq!(
            err.to_string(),
            "Please upload the Financial Statements document"
        );
    }

    #[test]
    fn supporting_documents_are_required() {
        let completed = [DocumentSlot::BusinessPlan, DocumentSlot::FinancialStatements]
            .into_iter()
            .collect();
        assert_eq!(
            validate(&complete_draft(), &completed),
            Err(ValidationError::MissingDocument(
                DocumentSlot::SupportingDocuments
            ))
        );
    }
}
