use std::sync::Arc;

use crate::{
    backend::{Backend, Session},
    core::SessionStore,
    gui::screens::{
        ScreenMessage, application::ApplicationScreen, auth::AuthScreen, loading::LoadingScreen,
    },
};

#[derive(Debug, Clone)]
pub enum Message {
    Connected(Result<(Arc<Backend>, SessionStore), String>),
    SessionChanged(Option<Session>),
    DismissBanner,
    LoadingPage(ScreenMessage<LoadingScreen>),
    AuthPage(ScreenMessage<AuthScreen>),
    ApplicationPage(ScreenMessage<ApplicationScreen>),
}
