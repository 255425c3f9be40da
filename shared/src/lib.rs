pub mod ipc;

pub use ipc::{
    Command, ComposeForm, Feedback, FieldId, IpcError, Notification, NotificationLevel, Response,
    StatusInfo, VoiceStatus,
};
