use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use iced::{
    Element, Length, Task,
    widget::{button, column, container, row, scrollable, text, text_input},
};
use rfd::AsyncFileDialog;
use tracing::warn;

use crate::{
    backend::TableService,
    core::{
        ApplicationForm, DocumentSlot, FormError, ResetTicket, SelectedFile, SlotState,
        StoredApplication, UploadRequest, validate,
    },
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{Step, layout, notice},
    },
};

#[derive(Debug, Clone)]
pub struct ApplicationScreen {
    form: ApplicationForm,
    /// Grant amount as typed; the draft holds the parsed value.
    grant_amount: String,
    email: String,
    sign_out_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CompanyName,
    ContactPerson,
    ContactEmail,
    ContactPhone,
    GrantAmount,
    ProjectDescription,
}

#[derive(Debug, Clone)]
pub enum ApplicationMessage {
    FieldChanged(Field, String),
    PickDocument(DocumentSlot),
    DocumentPicked(DocumentSlot, Option<PathBuf>),
    DocumentRead(DocumentSlot, Result<SelectedFile, String>),
    UploadFinished(UploadRequest, Result<String, FormError>),
    Submit,
    Submitted(Result<StoredApplication, FormError>),
    ResetElapsed(ResetTicket),
    SignedOut(Result<(), String>),
}

#[derive(Debug, Clone)]
pub enum ParentMessage {
    SignOut,
}

fn screen(message: ApplicationMessage) -> ScreenMessage<ApplicationScreen> {
    ScreenMessage::ScreenMessage(message)
}

impl ApplicationScreen {
    pub fn new(email: String, reset_delay: Duration) -> Self {
        Self {
            form: ApplicationForm::new(reset_delay),
            grant_amount: String::new(),
            email,
            sign_out_error: None,
        }
    }

    fn step(&self) -> Step {
        let all: BTreeSet<_> = DocumentSlot::ALL.into_iter().collect();
        if validate(&self.form.draft, &all).is_err() {
            Step::Details
        } else if self.form.uploads().completed().len() < DocumentSlot::ALL.len() {
            Step::Documents
        } else {
            Step::Submit
        }
    }

    fn set_field(&mut self, field: Field, value: String) {
        let draft = &mut self.form.draft;
        match field {
            Field::CompanyName => draft.company_name = value,
            Field::ContactPerson => draft.contact_person = value,
            Field::ContactEmail => draft.contact_email = value,
            Field::ContactPhone => draft.contact_phone = value,
            Field::ProjectDescription => draft.project_description = value,
            Field::GrantAmount => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    draft.grant_amount = None;
                } else if let Ok(amount) = trimmed.parse::<f64>() {
                    draft.grant_amount = Some(amount);
                } else {
                    return;
                }
                self.grant_amount = value;
            }
        }
    }

    fn field<'a>(
        label: &'a str,
        placeholder: &'a str,
        value: &'a str,
        field: Field,
    ) -> Element<'a, ScreenMessage<Self>> {
        column![
            text(label),
            text_input(placeholder, value)
                .on_input(move |value| screen(ApplicationMessage::FieldChanged(field, value)))
                .padding(8),
        ]
        .spacing(4)
        .into()
    }

    fn document_row(&self, slot: DocumentSlot) -> Element<'_, ScreenMessage<Self>> {
        let entry = self.form.uploads().get(slot);
        let status = match entry.state() {
            SlotState::Empty => text("No file selected"),
            SlotState::Uploading { file } => text(format!("Uploading {}...", file.name)),
            SlotState::Complete { file, .. } => {
                text(format!("Uploaded {}", file.name)).style(text::success)
            }
            SlotState::Failed { file, .. } => text(file.name.clone()),
        };
        let pick = (!entry.is_uploading() && !self.form.submission().is_submitting())
            .then_some(screen(ApplicationMessage::PickDocument(slot)));

        let mut content = column![
            row![
                text(format!("{} *", slot.label())).width(Length::FillPortion(2)),
                container(status).width(Length::FillPortion(3)),
                button("Choose file").on_press_maybe(pick),
            ]
            .spacing(10),
            text(format!("Accepted: {}", slot.accepted_extensions().join(", "))).size(12),
        ]
        .spacing(4);
        if let Some(message) = entry.message() {
            content = content.push(text(message).style(text::danger));
        }
        content.into()
    }
}

impl Screen for ApplicationScreen {
    type Message = ApplicationMessage;
    type ParentMessage = ParentMessage;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let draft = &self.form.draft;
        let submitting = self.form.submission().is_submitting();
        let can_submit = !submitting && !self.form.uploads().any_uploading();

        let mut form = column![
            text("Business Grant Application").size(28),
            Self::field("Company Name *", "Acme Ltd", &draft.company_name, Field::CompanyName),
            Self::field(
                "Contact Person *",
                "Full name",
                &draft.contact_person,
                Field::ContactPerson,
            ),
            Self::field(
                "Contact Email *",
                "name@company.com",
                &draft.contact_email,
                Field::ContactEmail,
            ),
            Self::field("Contact Phone", "Optional", &draft.contact_phone, Field::ContactPhone),
            Self::field(
                "Grant Amount (USD) *",
                "1000 - 1000000",
                &self.grant_amount,
                Field::GrantAmount,
            ),
            Self::field(
                "Project Description *",
                "What will the grant fund?",
                &draft.project_description,
                Field::ProjectDescription,
            ),
            text("Documents").size(20),
        ]
        .spacing(12)
        .padding(20);
        for slot in DocumentSlot::ALL {
            form = form.push(self.document_row(slot));
        }
        form = form.push(
            button(if submitting { "Submitting..." } else { "Submit Application" })
                .on_press_maybe(can_submit.then_some(screen(ApplicationMessage::Submit))),
        );
        if let Some(message) = self.form.notice() {
            form = form.push(notice(message));
        }

        let mut sidebar = column![
            text("Signed in as"),
            text(&self.email),
            button("Sign out").on_press(ScreenMessage::ParentMessage(ParentMessage::SignOut)),
        ]
        .spacing(8)
        .padding(10);
        if let Some(error) = &self.sign_out_error {
            sidebar = sidebar.push(text(error).style(text::danger));
        }

        layout(sidebar, scrollable(form), self.step())
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            ApplicationMessage::FieldChanged(field, value) => {
                self.set_field(field, value);
                Task::none()
            }
            ApplicationMessage::PickDocument(slot) => {
                let extensions = slot.accepted_extensions();
                Task::perform(
                    AsyncFileDialog::new()
                        .set_title(format!("Select {}", slot.label()))
                        .add_filter(slot.label(), extensions)
                        .pick_file(),
                    move |handle| {
                        screen(ApplicationMessage::DocumentPicked(
                            slot,
                            handle.map(|data| data.path().to_path_buf()),
                        ))
                    },
                )
            }
            ApplicationMessage::DocumentPicked(_, None) => Task::none(),
            ApplicationMessage::DocumentPicked(slot, Some(path)) => Task::perform(
                async move { SelectedFile::from_path(path).await.map_err(|e| format!("{e:#}")) },
                move |result| screen(ApplicationMessage::DocumentRead(slot, result)),
            ),
            ApplicationMessage::DocumentRead(slot, Err(message)) => {
                warn!(slot = slot.key(), "Unreadable document: {message}");
                self.form.reject_document(slot, message);
                Task::none()
            }
            ApplicationMessage::DocumentRead(slot, Ok(file)) => {
                let Ok(request) = self.form.select_document(slot, file, state.session.session())
                else {
                    return Task::none();
                };
                let backend = match state.backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        self.form.complete_upload(&request, Err(e));
                        return Task::none();
                    }
                };
                Task::perform(
                    async move {
                        let result = request.send(&*backend).await;
                        (request, result)
                    },
                    |(request, result)| screen(ApplicationMessage::UploadFinished(request, result)),
                )
            }
            ApplicationMessage::UploadFinished(request, result) => {
                self.form.complete_upload(&request, result);
                Task::none()
            }
            ApplicationMessage::Submit => {
                let Ok(record) = self.form.begin_submission(state.session.session()) else {
                    return Task::none();
                };
                let backend = match state.backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        self.form.finish_submission(Err(e));
                        return Task::none();
                    }
                };
                let table = state.config.table.clone();
                Task::perform(
                    async move {
                        backend
                            .insert(&table, &record)
                            .await
                            .map_err(FormError::service)
                    },
                    |result| screen(ApplicationMessage::Submitted(result)),
                )
            }
            ApplicationMessage::Submitted(result) => match self.form.finish_submission(result) {
                Some(ticket) => Task::perform(ticket.elapsed(), |ticket| {
                    screen(ApplicationMessage::ResetElapsed(ticket))
                }),
                None => Task::none(),
            },
            ApplicationMessage::ResetElapsed(ticket) => {
                if self.form.apply_reset(ticket) {
                    self.grant_amount.clear();
                }
                Task::none()
            }
            ApplicationMessage::SignedOut(Ok(())) => {
                self.sign_out_error = None;
                Task::none()
            }
            ApplicationMessage::SignedOut(Err(message)) => {
                self.sign_out_error = Some(message);
                Task::none()
            }
        }
    }
}
