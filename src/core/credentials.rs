use tracing::info;

use crate::{
    backend::{Identity, IdentityService, Registration},
    core::{Notice, error::FormError, validation::is_valid_email},
};

/// Shortest password the identity service accepts at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialOutcome {
    /// A session now exists, either from sign-in or from a sign-up the
    /// service confirmed on the spot.
    SignedIn,
    /// Registration accepted; the account still has to be confirmed by mail.
    Registered(Option<Identity>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
}

impl CredentialRequest {
    pub async fn send<I: IdentityService>(
        &self,
        identity: &I,
        redirect_to: &str,
    ) -> Result<CredentialOutcome, FormError> {
        match self.mode {
            AuthMode::SignIn => identity
                .sign_in_with_password(&self.email, &self.password)
                .await
                .map(|()| CredentialOutcome::SignedIn)
                .map_err(FormError::authentication),
            AuthMode::SignUp => identity
                .sign_up(&self.email, &self.password, redirect_to)
                .await
                .map(|registration| match registration {
                    Registration::Pending(identity) => CredentialOutcome::Registered(identity),
                    Registration::SignedIn(_) => CredentialOutcome::SignedIn,
                })
                .map_err(FormError::authentication),
        }
    }
}

/// Email/password entry for either registering or signing in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialForm {
    pub email: String,
    pub password: String,
    mode: AuthMode,
    busy: bool,
    notice: Option<Notice>,
}

impl CredentialForm {
    /// A sign-in form prefilled with `email` and `password`.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.notice = None;
    }

    pub fn begin(&mut self) -> Result<CredentialRequest, FormError> {
        if self.busy {
            return Err(FormError::Precondition("Please wait".to_string()));
        }
        let email = self.email.trim().to_string();
        let checked = if !is_valid_email(&email) {
            Err("Please enter a valid email address".to_string())
        } else if self.password.is_empty() {
            Err("Password is required".to_string())
        } else if self.mode == AuthMode::SignUp
            && self.password.chars().count() < MIN_PASSWORD_LEN
        {
            Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters"))
        } else {
            Ok(())
        };
        if let Err(message) = checked {
            self.notice = Some(Notice::Error(message.clone()));
            return Err(FormError::Precondition(message));
        }
        self.busy = true;
        self.notice = None;
        Ok(CredentialRequest {
            mode: self.mode,
            email,
            password: self.password.clone(),
        })
    }

    pub fn finish(&mut self, result: Result<CredentialOutcome, FormError>) {
        self.busy = false;
        match result {
            Ok(CredentialOutcome::SignedIn) => {
                info!("Signed in");
                self.password.clear();
                self.mode = AuthMode::SignIn;
                self.notice = None;
            }
            Ok(CredentialOutcome::Registered(_)) => {
                info!("Registration submitted");
                self.password.clear();
                self.mode = AuthMode::SignIn;
                self.notice = Some(Notice::Success(
                    "Check your email for the confirmation link!".to_string(),
                ));
            }
            Err(e) => self.notice = Some(Notice::Error(e.to_string())),
        }
    }

    pub async fn submit<I: IdentityService>(
        &mut self,
        identity: &I,
        redirect_to: &str,
    ) -> Result<CredentialOutcome, FormError> {
        let request = self.begin()?;
        let result = request.send(identity, redirect_to).await;
        self.finish(result.clone());
        result
    }
}
