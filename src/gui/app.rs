use std::sync::Arc;

use iced::{
    Element, Length, Task,
    widget::{button, column, container, row, text},
};
use tracing::info;

use crate::{
    backend::Backend,
    config::Config,
    core::{SessionStore, detect_verification},
    gui::{
        AppState, Message,
        screens::{Screen, ScreenData, ScreenMessage, loading::LoadingScreen},
    },
};

const VERIFIED_BANNER: &str = "Email verified! You can now sign in.";

pub struct GrantDeskApp {
    screen: ScreenData,
    state: AppState,
}

impl GrantDeskApp {
    /// Start connecting to the configured backend. `launch_url` is the URL the
    /// app was opened from, e.g. the link in a confirmation mail.
    pub fn new(config: Config, launch_url: Option<&str>) -> (Self, Task<Message>) {
        let mut state = AppState::new(config.clone());
        if let Some(cleaned) = launch_url.and_then(detect_verification) {
            info!(url = %cleaned, "Opened from email confirmation");
            state.banner = Some(VERIFIED_BANNER.to_string());
        }
        let connect = Task::perform(
            async move {
                let backend = Backend::connect(&config)
                    .await
                    .map_err(|e| format!("{e:#}"))?;
                let session = SessionStore::load(&backend).await;
                Ok::<_, String>((Arc::new(backend), session))
            },
            Message::Connected,
        );
        (
            Self {
                screen: ScreenData::LoadingPage(LoadingScreen::default()),
                state,
            },
            connect,
        )
    }

    pub fn title(&self) -> String {
        match self.state.session.identity() {
            Some(identity) => format!("Grant Application - {}", identity.email),
            None => "Grant Application".to_string(),
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        self.screen
            .update(message, &mut self.state)
            .map(|message| match message {
                ScreenMessage::ScreenMessage(message) => message,
                ScreenMessage::ParentMessage(never) => match never {},
            })
    }

    pub fn view(&self) -> Element<'_, Message> {
        let screen = self.screen.view().map(|message| match message {
            ScreenMessage::ScreenMessage(message) => message,
            ScreenMessage::ParentMessage(never) => match never {},
        });
        match &self.state.banner {
            Some(banner) => column![
                container(
                    row![
                        text(banner).width(Length::Fill),
                        button("Dismiss")
                            .style(button::text)
                            .on_press(Message::DismissBanner),
                    ]
                    .spacing(10),
                )
                .style(container::rounded_box)
                .padding(10)
                .width(Length::Fill),
                screen,
            ]
            .into(),
            None => screen,
        }
    }
}

/// Run the desktop application until its window is closed.
pub fn run(config: Config, launch_url: Option<String>) -> iced::Result {
    iced::application(
        move || GrantDeskApp::new(config.clone(), launch_url.as_deref()),
        GrantDeskApp::update,
        GrantDeskApp::view,
    )
    .title(GrantDeskApp::title)
    .window_size((960.0, 820.0))
    .run()
}
