use std::convert::Infallible;

use iced::{
    Alignment::Center,
    Element, Task,
    widget::{button, column, container, text, text_input},
};

use crate::{
    core::{AuthMode, CredentialForm, CredentialOutcome, FormError},
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{Step, layout, notice},
    },
};

#[derive(Debug, Clone, Default)]
pub struct AuthScreen {
    form: CredentialForm,
}

#[derive(Debug, Clone)]
pub enum AuthMessage {
    EmailChanged(String),
    PasswordChanged(String),
    ToggleMode,
    Submit,
    Finished(Result<CredentialOutcome, FormError>),
}

impl Screen for AuthScreen {
    type Message = AuthMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let (title, action, switch) = match self.form.mode() {
            AuthMode::SignIn => ("Sign in", "Sign In", "Need an account? Sign up"),
            AuthMode::SignUp => (
                "Create an account",
                "Sign Up",
                "Already have an account? Sign in",
            ),
        };
        let busy = self.form.is_busy();
        let submit = (!busy).then_some(ScreenMessage::ScreenMessage(AuthMessage::Submit));

        let mut content = column![
            text(title).size(28),
            text_input("Email", &self.form.email)
                .on_input(|value| ScreenMessage::ScreenMessage(AuthMessage::EmailChanged(value)))
                .padding(8),
            text_input("Password", &self.form.password)
                .secure(true)
                .on_input(|value| ScreenMessage::ScreenMessage(AuthMessage::PasswordChanged(value)))
                .on_submit_maybe(submit.clone())
                .padding(8),
            button(if busy { "Loading..." } else { action }).on_press_maybe(submit),
            button(switch)
                .style(button::text)
                .on_press_maybe(
                    (!busy).then_some(ScreenMessage::ScreenMessage(AuthMessage::ToggleMode))
                ),
        ]
        .spacing(12)
        .max_width(380)
        .align_x(Center);

        if let Some(message) = self.form.notice() {
            content = content.push(notice(message));
        }

        layout(
            text("Sign in with your email to start a grant application."),
            container(content)
                .center_x(iced::Length::Fill)
                .center_y(iced::Length::Fill),
            Step::SignIn,
        )
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            AuthMessage::EmailChanged(email) => {
                self.form.email = email;
                Task::none()
            }
            AuthMessage::PasswordChanged(password) => {
                self.form.password = password;
                Task::none()
            }
            AuthMessage::ToggleMode => {
                self.form.toggle_mode();
                Task::none()
            }
            AuthMessage::Submit => {
                let Ok(request) = self.form.begin() else {
                    return Task::none();
                };
                let backend = match state.backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        self.form.finish(Err(e));
                        return Task::none();
                    }
                };
                let redirect_to = state.config.redirect_url.clone();
                Task::perform(
                    async move { request.send(&*backend, &redirect_to).await },
                    |result| ScreenMessage::ScreenMessage(AuthMessage::Finished(result)),
                )
            }
            AuthMessage::Finished(result) => {
                self.form.finish(result);
                Task::none()
            }
        }
    }
}
