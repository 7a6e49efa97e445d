pub mod application;
pub mod auth;
pub mod loading;

use iced::{
    Element, Task,
    futures::{Stream, stream},
};
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    backend::{IdentityService, Session},
    gui::{AppState, Message},
};

#[derive(Debug, Clone)]
pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

pub trait Screen: Sized {
    type Message: std::fmt::Debug;
    type ParentMessage: std::fmt::Debug;
    fn view(&self) -> Element<'_, ScreenMessage<Self>>;
    fn update(&mut self, message: Self::Message, state: &mut AppState)
    -> Task<ScreenMessage<Self>>;
}

#[derive(Debug, Clone)]
pub enum ScreenData {
    LoadingPage(loading::LoadingScreen),
    AuthPage(auth::AuthScreen),
    ApplicationPage(application::ApplicationScreen),
}

impl ScreenData {
    /// The screen matching the current session.
    fn for_session(state: &AppState) -> Self {
        match state.session.identity() {
            Some(identity) => ScreenData::ApplicationPage(application::ApplicationScreen::new(
                identity.email.clone(),
                state.config.reset_delay,
            )),
            None => ScreenData::AuthPage(auth::AuthScreen::default()),
        }
    }
}

/// Yields every session the collaborator publishes after subscription.
fn session_changes(
    receiver: watch::Receiver<Option<Session>>,
) -> impl Stream<Item = Option<Session>> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.changed().await.ok()?;
        let session = receiver.borrow_and_update().clone();
        Some((session, receiver))
    })
}

impl Screen for ScreenData {
    type Message = Message;
    type ParentMessage = std::convert::Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        match self {
            ScreenData::LoadingPage(screen) => screen.view().map(Message::LoadingPage),
            ScreenData::AuthPage(screen) => screen.view().map(Message::AuthPage),
            ScreenData::ApplicationPage(screen) => screen.view().map(Message::ApplicationPage),
        }
        .map(ScreenMessage::ScreenMessage)
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match (self, message) {
            (x, Message::Connected(Ok((backend, session)))) => {
                info!(
                    backend = %backend.describe(),
                    signed_in = session.is_signed_in(),
                    "Connected"
                );
                let changes = session_changes(backend.subscribe());
                state.backend = Some(backend);
                state.session = session;
                *x = ScreenData::for_session(state);
                Task::run(changes, |session| {
                    ScreenMessage::ScreenMessage(Message::SessionChanged(session))
                })
            }
            (x, Message::Connected(Err(message))) => {
                error!("Failed to connect: {message}");
                *x = ScreenData::LoadingPage(loading::LoadingScreen::failed(message));
                Task::none()
            }
            (x, Message::SessionChanged(session)) => {
                if state.session.apply(session) {
                    *x = ScreenData::for_session(state);
                }
                Task::none()
            }
            (_, Message::DismissBanner) => {
                state.banner = None;
                Task::none()
            }
            (ScreenData::AuthPage(page), Message::AuthPage(msg)) => match msg {
                ScreenMessage::ScreenMessage(msg) => page
                    .update(msg, state)
                    .map(Message::AuthPage)
                    .map(ScreenMessage::ScreenMessage),
                ScreenMessage::ParentMessage(never) => match never {},
            },
            (ScreenData::ApplicationPage(page), Message::ApplicationPage(msg)) => match msg {
                ScreenMessage::ScreenMessage(msg) => page
                    .update(msg, state)
                    .map(Message::ApplicationPage)
                    .map(ScreenMessage::ScreenMessage),
                ScreenMessage::ParentMessage(application::ParentMessage::SignOut) => {
                    let backend = match state.backend() {
                        Ok(backend) => backend,
                        Err(e) => {
                            state.banner = Some(e.to_string());
                            return Task::none();
                        }
                    };
                    Task::perform(
                        async move { backend.sign_out().await.map_err(|e| format!("{e:#}")) },
                        |result| {
                            ScreenMessage::ScreenMessage(Message::ApplicationPage(
                                ScreenMessage::ScreenMessage(
                                    application::ApplicationMessage::SignedOut(result),
                                ),
                            ))
                        },
                    )
                }
            },
            _ => Task::none(),
        }
    }
}
