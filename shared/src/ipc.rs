use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    Status,
    /// A finalized transcript, as if the recognizer had heard it.
    Say(String),
    /// An interim transcript; logged but never routed.
    Interim(String),
    Focus(Option<FieldId>),
    SetConfirmActions(bool),
    Speak { text: String, interrupt: bool },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error(String),
    Status(StatusInfo),
    Feedback(Feedback),
}

/// UI status signal driven by the recognition listener and speech player.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStatus {
    #[default]
    Inactive,
    Listening,
    Speaking,
    Processing,
    Error,
}

impl fmt::Display for VoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceStatus::Inactive => write!(f, "inactive"),
            VoiceStatus::Listening => write!(f, "listening"),
            VoiceStatus::Speaking => write!(f, "speaking"),
            VoiceStatus::Processing => write!(f, "processing"),
            VoiceStatus::Error => write!(f, "error"),
        }
    }
}

/// Text inputs on the compose and search screens.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldId {
    Recipient,
    Subject,
    Body,
    Search,
}

impl FieldId {
    pub fn label(&self) -> &'static str {
        match self {
            FieldId::Recipient => "recipient",
            FieldId::Subject => "subject",
            FieldId::Body => "message",
            FieldId::Search => "search",
        }
    }
}

impl std::str::FromStr for FieldId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recipient" | "to" => Ok(FieldId::Recipient),
            "subject" => Ok(FieldId::Subject),
            "body" | "message" => Ok(FieldId::Body),
            "search" => Ok(FieldId::Search),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// Transient message for the notification side channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything the daemon produced while handling one request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Feedback {
    pub spoken: Vec<String>,
    pub notifications: Vec<Notification>,
    pub status: VoiceStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ComposeForm {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusInfo {
    pub is_running: bool,
    pub is_listening: bool,
    pub voice_status: VoiceStatus,
    pub is_dictating: bool,
    pub pending_confirmation: Option<String>,
    pub language: String,
    pub screen: String,
    pub focused_field: Option<FieldId>,
    pub compose: ComposeForm,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused: is voxmaild running?")]
    ConnectionRefused,

    #[error("Connection timeout")]
    Timeout,
}
