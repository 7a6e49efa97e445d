use iced::{
    Color, Element, Theme, border,
    widget::{column, container, container::Style, row, text},
};
use iced_widget::container::bordered_box;

use crate::core::Notice;

/// Where the user is in the application process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    SignIn,
    Details,
    Documents,
    Submit,
}

impl Step {
    const ALL: [Step; 4] = [Step::SignIn, Step::Details, Step::Documents, Step::Submit];

    fn label(self) -> &'static str {
        match self {
            Step::SignIn => "Sign in",
            Step::Details => "Company details",
            Step::Documents => "Documents",
            Step::Submit => "Submit",
        }
    }

    fn style(self, other: Self) -> impl Fn(&Theme) -> Style {
        move |theme: &Theme| {
            let style = bordered_box(theme).border(border::width(5));
            // completed steps are dimmed
            if self > other {
                let mut color_rgba = theme.palette().background.into_rgba8();
                color_rgba[0] /= 2;
                color_rgba[1] /= 2;
                color_rgba[2] /= 2;
                style.background(Color::from_rgb8(color_rgba[0], color_rgba[1], color_rgba[2]))
            } else {
                style.background(theme.palette().background)
            }
        }
    }
}

pub fn layout<'a, Message>(
    sidebar: impl Into<Element<'a, Message>>,
    main_content: impl Into<Element<'a, Message>>,
    step: Step,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let steps = Step::ALL.into_iter().fold(column![], |steps, each| {
        steps.push(
            container(text(each.label()))
                .style(step.style(each))
                .padding(10)
                .width(iced::Length::Fill),
        )
    });
    container(row![
        container(column![
            container(steps),
            container(sidebar.into()).height(iced::Length::Fill),
        ])
        .width(iced::Length::FillPortion(1)),
        container(main_content.into()).width(iced::Length::FillPortion(4)),
    ])
    .center_x(iced::Length::Fill)
    .center_y(iced::Length::Fill)
    .into()
}

pub fn notice<'a, Message: 'a>(notice: &'a Notice) -> Element<'a, Message> {
    let content = text(notice.text());
    if notice.is_error() {
        content.style(text::danger).into()
    } else {
        content.style(text::success).into()
    }
}
