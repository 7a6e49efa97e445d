use std::convert::Infallible;

use iced::{
    Element, Task,
    widget::{column, container, text},
};

use crate::gui::{
    AppState,
    screens::{Screen, ScreenMessage},
};

#[derive(Debug, Clone, Default)]
pub struct LoadingScreen {
    error: Option<String>,
}

impl LoadingScreen {
    pub fn failed(error: String) -> Self {
        Self { error: Some(error) }
    }
}

impl Screen for LoadingScreen {
    type Message = Infallible;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let content = match &self.error {
            Some(error) => column![
                text("Could not reach the application service").size(20),
                text(error).style(text::danger),
            ]
            .spacing(10),
            None => column![text("Connecting...")],
        };
        container(content)
            .center_x(iced::Length::Fill)
            .center_y(iced::Length::Fill)
            .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        _state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {}
    }
}
