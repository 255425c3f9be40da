//! In-memory mail client the daemon drives with voice commands.
//!
//! Stands in for the real application: screens, a compose form with focus,
//! a handful of sample messages and the accessibility settings. Mail
//! transport is simulated by moving messages between folders.

use crate::engine::commands::Action;
use crate::engine::dictation::{FieldKind, FocusedField};
use crate::engine::{ActionError, EngineHost};
use regex::Regex;
use shared::{ComposeForm, FieldId, Notification, VoiceStatus};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info};

static EMAIL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email address pattern"));

const DEFAULT_FONT_SIZE: u32 = 16;
const MAX_FONT_SIZE: u32 = 24;
const FONT_STEP: u32 = 2;
const INBOX_SUMMARY_LIMIT: usize = 5;

const HELP_TEXT: &str = "Navigation: say \"read inbox\" to hear your email list, \"read email\" to \
    open and read a message, \"go back\" to return to the previous screen, and \"search emails\" \
    to search your mailbox. Email actions: \"reply\", \"forward\", \"delete\" and \"mark as spam\". \
    Composing: say \"compose email\", then \"dictate recipient\", \"dictate subject\" or \"dictate \
    message\", and \"stop dictating\" when done. Say \"send email\" then \"confirm send\" to send, \
    or \"save draft\" then \"confirm save\". Say \"cancel message\" to discard. Accessibility: \
    \"louder\", \"quieter\", \"larger text\" and \"high contrast\". Say \"repeat\" to hear the last \
    message again and \"cancel\" to cancel the current action.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Inbox,
    Reader,
    Compose,
    Settings,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Login => write!(f, "login"),
            Screen::Inbox => write!(f, "inbox"),
            Screen::Reader => write!(f, "reader"),
            Screen::Compose => write!(f, "compose"),
            Screen::Settings => write!(f, "settings"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Sent,
    Drafts,
    Spam,
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Folder::Inbox => write!(f, "inbox"),
            Folder::Sent => write!(f, "sent"),
            Folder::Drafts => write!(f, "drafts"),
            Folder::Spam => write!(f, "spam"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: u32,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub folder: Folder,
    pub is_read: bool,
}

impl Email {
    fn received(id: u32, from: &str, subject: &str, body: &str, is_read: bool) -> Self {
        Self {
            id,
            from: from.to_string(),
            to: String::new(),
            subject: subject.to_string(),
            body: body.to_string(),
            folder: Folder::Inbox,
            is_read,
        }
    }
}

fn sample_emails() -> Vec<Email> {
    vec![
        Email::received(
            1,
            "Dana Whitfield <dana.whitfield@northwind.example>",
            "Budget review moved to Thursday",
            "Hi, the budget review is now on Thursday at ten. Please bring the updated \
             forecast and the hiring plan. Thanks, Dana",
            false,
        ),
        Email::received(
            2,
            "Build Bot <builds@ci.example>",
            "Nightly build passed",
            "All 412 tests passed on the main branch. No new warnings were reported.",
            true,
        ),
        Email::received(
            3,
            "Priya Raman <priya@fieldwork.example>",
            "Photos from the site visit",
            "Sharing the photos from Tuesday. The north wall needs another coat before the \
             inspection next week.",
            false,
        ),
    ]
}

pub struct MailboxHost {
    screen: Screen,
    signed_in: bool,
    emails: Vec<Email>,
    next_id: u32,
    current_email: Option<u32>,
    compose: ComposeForm,
    search: String,
    focus: Option<FieldId>,
    font_size: u32,
    high_contrast: bool,
    notifications: Vec<Notification>,
    status: (VoiceStatus, String),
}

impl Default for MailboxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxHost {
    pub fn new() -> Self {
        Self::with_emails(sample_emails())
    }

    pub fn with_emails(emails: Vec<Email>) -> Self {
        let next_id = emails.iter().map(|email| email.id).max().unwrap_or(0) + 1;
        Self {
            screen: Screen::Login,
            signed_in: false,
            emails,
            next_id,
            current_email: None,
            compose: ComposeForm::default(),
            search: String::new(),
            focus: None,
            font_size: DEFAULT_FONT_SIZE,
            high_contrast: false,
            notifications: Vec::new(),
            status: (VoiceStatus::Inactive, "Voice commands ready".to_string()),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn compose(&self) -> &ComposeForm {
        &self.compose
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn focus(&self) -> Option<FieldId> {
        self.focus
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn high_contrast(&self) -> bool {
        self.high_contrast
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn current_email(&self) -> Option<&Email> {
        let id = self.current_email?;
        self.emails.iter().find(|email| email.id == id)
    }

    pub fn last_status(&self) -> (VoiceStatus, &str) {
        (self.status.0, &self.status.1)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Focus change from outside the voice path. `None` blurs.
    pub fn set_focus(&mut self, field: Option<FieldId>) -> bool {
        match field {
            Some(field) => self.focus_field(field),
            None => {
                self.focus = None;
                true
            }
        }
    }

    fn folder(&self, folder: Folder) -> impl Iterator<Item = &Email> {
        self.emails.iter().filter(move |email| email.folder == folder)
    }

    fn show(&mut self, screen: Screen) {
        if self.screen != screen {
            debug!("Screen: {} -> {}", self.screen, screen);
        }
        self.screen = screen;
        self.focus = match screen {
            Screen::Compose => self.focus.filter(|field| *field != FieldId::Search),
            _ => None,
        };
    }

    fn navigate_back(&mut self) {
        match self.screen {
            Screen::Compose | Screen::Reader | Screen::Settings => {
                self.current_email = None;
                self.show(Screen::Inbox);
            }
            Screen::Inbox | Screen::Login => self.show(Screen::Login),
        }
    }

    fn open_compose(&mut self) {
        self.compose = ComposeForm::default();
        self.show(Screen::Compose);
        self.focus = Some(FieldId::Recipient);
    }

    fn require_current(&self) -> Result<Email, ActionError> {
        self.current_email().cloned().ok_or_else(|| {
            ActionError::Failed("No email is open. Say \"read email\" to open one.".to_string())
        })
    }

    fn require_compose(&self) -> Result<(), ActionError> {
        if self.screen == Screen::Compose {
            Ok(())
        } else {
            Err(ActionError::Failed("Please open the compose screen first.".to_string()))
        }
    }

    fn sign_in(&mut self) -> Option<String> {
        if self.signed_in {
            self.notifications.push(Notification::info("Already signed in"));
            return Some("You are already signed in.".to_string());
        }
        self.signed_in = true;
        self.show(Screen::Inbox);
        let unread = self.folder(Folder::Inbox).filter(|email| !email.is_read).count();
        info!("Signed in");
        Some(format!("Signed in. You have {} unread emails.", unread))
    }

    fn read_inbox(&mut self) -> Option<String> {
        self.show(Screen::Inbox);
        let inbox: Vec<&Email> = self.folder(Folder::Inbox).collect();
        if inbox.is_empty() {
            return Some("No emails in inbox.".to_string());
        }

        let mut summary = format!("You have {} emails in inbox. ", inbox.len());
        for (index, email) in inbox.iter().take(INBOX_SUMMARY_LIMIT).enumerate() {
            summary.push_str(&format!(
                "Email {}: from {}. Subject: {}. ",
                index + 1,
                email.from,
                email.subject
            ));
        }
        if inbox.len() > INBOX_SUMMARY_LIMIT {
            summary.push_str(&format!(
                "And {} more emails. ",
                inbox.len() - INBOX_SUMMARY_LIMIT
            ));
        }
        summary.push_str("Say \"read email\" to open the next unread message.");
        Some(summary)
    }

    fn read_email(&mut self) -> Result<Option<String>, ActionError> {
        if self.current_email().is_none() {
            let next = self
                .folder(Folder::Inbox)
                .find(|email| !email.is_read)
                .or_else(|| self.folder(Folder::Inbox).next())
                .map(|email| email.id);
            self.current_email = Some(next.ok_or_else(|| {
                ActionError::Failed("No emails in inbox.".to_string())
            })?);
        }

        self.show(Screen::Reader);
        let current = self.current_email;
        let email = self
            .emails
            .iter_mut()
            .find(|email| Some(email.id) == current)
            .ok_or_else(|| ActionError::Failed("The open email is no longer available.".to_string()))?;
        email.is_read = true;

        Ok(Some(format!(
            "Email from {}. Subject: {}. Message content: {}",
            email.from, email.subject, email.body
        )))
    }

    fn reply(&mut self) -> Result<Option<String>, ActionError> {
        let email = self.require_current()?;
        self.open_compose();
        self.compose.recipient = email.from.clone();
        self.compose.subject = format!("Re: {}", email.subject);
        self.compose.body = format!("\n\nOriginal message:\n{}", email.body);
        self.focus = Some(FieldId::Body);
        Ok(Some(
            "Reply composition started. The recipient and subject have been filled in.".to_string(),
        ))
    }

    fn forward(&mut self) -> Result<Option<String>, ActionError> {
        let email = self.require_current()?;
        self.open_compose();
        self.compose.subject = format!("Fwd: {}", email.subject);
        self.compose.body = format!(
            "\n\nForwarded message:\nFrom: {}\nSubject: {}\n\n{}",
            email.from, email.subject, email.body
        );
        Ok(Some(
            "Forward composition started. Enter the recipient and add your message.".to_string(),
        ))
    }

    fn delete(&mut self) -> Result<Option<String>, ActionError> {
        let email = self.require_current()?;
        self.emails.retain(|candidate| candidate.id != email.id);
        self.current_email = None;
        self.show(Screen::Inbox);
        info!("Deleted email {}", email.id);
        self.notifications.push(Notification::success("Email deleted"));
        Ok(Some("Email deleted.".to_string()))
    }

    fn mark_as_spam(&mut self) -> Result<Option<String>, ActionError> {
        let email = self.require_current()?;
        if let Some(target) = self.emails.iter_mut().find(|candidate| candidate.id == email.id) {
            target.folder = Folder::Spam;
        }
        self.current_email = None;
        self.show(Screen::Inbox);
        self.notifications.push(Notification::success("Email marked as spam"));
        Ok(Some("Email marked as spam and moved to spam folder.".to_string()))
    }

    fn search_emails(&mut self) -> Option<String> {
        let term = self.search.trim().to_lowercase();
        if term.is_empty() {
            if self.screen != Screen::Inbox && self.screen != Screen::Reader {
                self.show(Screen::Inbox);
            }
            self.focus = Some(FieldId::Search);
            return Some(
                "Search opened. Say \"start dictating\" and speak your search terms, then say \
                 \"search emails\" again."
                    .to_string(),
            );
        }

        let found = self
            .emails
            .iter()
            .filter(|email| {
                email.subject.to_lowercase().contains(&term)
                    || email.body.to_lowercase().contains(&term)
                    || email.from.to_lowercase().contains(&term)
            })
            .count();
        self.notifications
            .push(Notification::info(format!("Found {} results", found)));
        let reply = format!("Found {} emails matching \"{}\".", found, self.search.trim());
        self.search.clear();
        Some(reply)
    }

    fn toggle_contrast(&mut self) -> Option<String> {
        self.high_contrast = !self.high_contrast;
        Some(if self.high_contrast {
            "High contrast mode enabled.".to_string()
        } else {
            "High contrast mode disabled.".to_string()
        })
    }

    fn larger_text(&mut self) -> Option<String> {
        self.notifications
            .push(Notification::info("Confirm text size increase"));
        Some(format!(
            "Current text size is {} pixels. Say \"confirm larger text\" to increase, or \
             \"cancel\" to keep current size.",
            self.font_size
        ))
    }

    fn confirm_larger_text(&mut self) -> Option<String> {
        self.font_size = (self.font_size + FONT_STEP).min(MAX_FONT_SIZE);
        Some("Font size increased.".to_string())
    }

    fn send_email(&mut self) -> Result<Option<String>, ActionError> {
        self.require_compose()?;
        let to = self.compose.recipient.trim();
        let subject = self.compose.subject.trim();
        let body = self.compose.body.trim();

        let missing = if to.is_empty() {
            Some("Please enter a recipient email address.")
        } else if subject.is_empty() {
            Some("Please enter a subject.")
        } else if body.is_empty() {
            Some("Please enter a message.")
        } else {
            None
        };
        if let Some(message) = missing {
            return Err(ActionError::Failed(message.to_string()));
        }

        let readback = format!(
            "Ready to send email. Recipient: {}. Subject: {}. Message: {}. Say \"confirm send\" \
             to send, or \"cancel\" to go back.",
            to,
            subject,
            preview(body, 100)
        );
        self.notifications.push(Notification::info("Confirm to send"));
        Ok(Some(readback))
    }

    fn confirm_send(&mut self) -> Result<Option<String>, ActionError> {
        self.require_compose()?;
        let to = self.compose.recipient.trim().to_string();
        let subject = self.compose.subject.trim().to_string();
        let body = self.compose.body.trim().to_string();

        if to.is_empty() || subject.is_empty() || body.is_empty() {
            return Err(ActionError::Failed(
                "Please fill in all required fields: recipient, subject, and message.".to_string(),
            ));
        }
        if !EMAIL_ADDRESS.is_match(&to) {
            return Err(ActionError::Failed(
                "Please enter a valid email address.".to_string(),
            ));
        }

        info!("Sending email to {}", to);
        self.store(Folder::Sent, to, subject, body);
        self.compose = ComposeForm::default();
        self.navigate_back();
        self.notifications
            .push(Notification::success("Email sent successfully"));
        Ok(Some("Email sent successfully.".to_string()))
    }

    fn save_draft(&mut self) -> Result<Option<String>, ActionError> {
        self.require_compose()?;
        let to = self.compose.recipient.trim();
        let subject = self.compose.subject.trim();
        let body = self.compose.body.trim();
        if to.is_empty() && subject.is_empty() && body.is_empty() {
            return Err(ActionError::Failed("No content to save as draft.".to_string()));
        }

        let mut summary = "Ready to save draft. ".to_string();
        if !to.is_empty() {
            summary.push_str(&format!("Recipient: {}. ", to));
        }
        if !subject.is_empty() {
            summary.push_str(&format!("Subject: {}. ", subject));
        }
        if !body.is_empty() {
            summary.push_str(&format!("Message: {}. ", preview(body, 50)));
        }
        summary.push_str("Say \"confirm save\" to save, or \"cancel\" to go back.");

        self.notifications
            .push(Notification::info("Confirm to save draft"));
        Ok(Some(summary))
    }

    fn confirm_save(&mut self) -> Result<Option<String>, ActionError> {
        self.require_compose()?;
        let ComposeForm {
            recipient,
            subject,
            body,
        } = self.compose.clone();
        if recipient.is_empty() && subject.is_empty() && body.is_empty() {
            return Err(ActionError::Failed("No content to save as draft.".to_string()));
        }

        self.store(Folder::Drafts, recipient, subject, body);
        self.notifications.push(Notification::success("Draft saved"));
        Ok(Some("Email saved as draft.".to_string()))
    }

    fn cancel_message(&mut self) -> Option<String> {
        self.compose = ComposeForm::default();
        self.navigate_back();
        Some("Email composition cancelled.".to_string())
    }

    fn store(&mut self, folder: Folder, to: String, subject: String, body: String) {
        let id = self.next_id;
        self.next_id += 1;
        self.emails.push(Email {
            id,
            from: "me".to_string(),
            to,
            subject,
            body,
            folder,
            is_read: true,
        });
    }
}

/// First `limit` characters, marking the cut.
fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}... and more", cut)
}

impl EngineHost for MailboxHost {
    fn execute(&mut self, action: Action) -> Result<Option<String>, ActionError> {
        debug!("Mailbox action: {}", action);
        match action {
            Action::SignIn => Ok(self.sign_in()),
            Action::ReadInbox => Ok(self.read_inbox()),
            Action::ComposeEmail => {
                self.open_compose();
                Ok(Some(
                    "Compose email screen opened. Please enter the recipient email address, or \
                     say \"start dictating\" to use voice input."
                        .to_string(),
                ))
            }
            Action::ShowSettings => {
                self.show(Screen::Settings);
                Ok(Some(
                    "Settings opened. You can adjust accessibility preferences using voice \
                     commands or the controls."
                        .to_string(),
                ))
            }
            Action::ReadEmail => self.read_email(),
            Action::Reply => self.reply(),
            Action::Forward => self.forward(),
            Action::Delete => self.delete(),
            Action::MarkAsSpam => self.mark_as_spam(),
            Action::SearchEmails => Ok(self.search_emails()),
            Action::Help => Ok(Some(HELP_TEXT.to_string())),
            Action::ToggleContrast => Ok(self.toggle_contrast()),
            Action::LargerText => Ok(self.larger_text()),
            Action::ConfirmLargerText => Ok(self.confirm_larger_text()),
            Action::GoBack => {
                self.navigate_back();
                Ok(None)
            }
            Action::SendEmail => self.send_email(),
            Action::ConfirmSend => self.confirm_send(),
            Action::SaveDraft => self.save_draft(),
            Action::ConfirmSave => self.confirm_save(),
            Action::CancelMessage => Ok(self.cancel_message()),
            Action::Cancel if self.screen == Screen::Compose => Ok(self.cancel_message()),
            Action::Cancel => {
                self.navigate_back();
                Ok(None)
            }
            Action::Repeat
            | Action::Louder
            | Action::Quieter
            | Action::StartDictating
            | Action::StopDictating
            | Action::DictateRecipient
            | Action::DictateSubject
            | Action::DictateMessage => Err(ActionError::Unsupported(action)),
        }
    }

    fn focus_field(&mut self, field: FieldId) -> bool {
        let allowed = match field {
            FieldId::Recipient | FieldId::Subject | FieldId::Body => self.screen == Screen::Compose,
            FieldId::Search => matches!(self.screen, Screen::Inbox | Screen::Reader),
        };
        if allowed {
            self.focus = Some(field);
        } else {
            debug!("Cannot focus {} on the {} screen", field.label(), self.screen);
        }
        allowed
    }

    fn focused_field(&mut self) -> Option<FocusedField<'_>> {
        let field = self.focus?;
        let (kind, value) = match field {
            FieldId::Recipient => (FieldKind::Email, &mut self.compose.recipient),
            FieldId::Subject => (FieldKind::Text, &mut self.compose.subject),
            FieldId::Body => (FieldKind::Text, &mut self.compose.body),
            FieldId::Search => (FieldKind::Text, &mut self.search),
        };
        Some(FocusedField { kind, value })
    }

    fn notify(&mut self, notification: Notification) {
        debug!("Notification ({:?}): {}", notification.level, notification.message);
        self.notifications.push(notification);
    }

    fn status_changed(&mut self, status: VoiceStatus, text: &str) {
        self.status = (status, text.to_string());
    }
}
