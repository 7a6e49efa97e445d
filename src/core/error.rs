use thiserror::Error;

use crate::{backend::ServiceError, core::validation::ValidationError};

/// A failed attempt, reduced to the one message shown next to the control
/// that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    /// Client-side check failed; no network call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Service(String),

    #[error("{0}")]
    Precondition(String),
}

impl FormError {
    pub(crate) fn authentication(error: anyhow::Error) -> Self {
        FormError::Authentication(collaborator_message(&error))
    }

    pub(crate) fn service(error: anyhow::Error) -> Self {
        FormError::Service(collaborator_message(&error))
    }
}

/// The service's own wording when it refused the request, otherwise the
/// whole chain so transport and file failures keep their context.
fn collaborator_message(error: &anyhow::Error) -> String {
    match error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ServiceError>())
    {
        Some(refusal) => refusal.to_string(),
        None => format!("{error:#}"),
    }
}
