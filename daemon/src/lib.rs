pub mod config;
pub mod devices;
pub mod engine;
pub mod mailbox;
pub mod rate_limit;
pub mod server;
pub mod state;

pub use engine::{ActionError, EngineHost, VoiceEngine};
pub use mailbox::MailboxHost;
pub use rate_limit::CommandRateLimiter;
pub use state::DaemonState;
