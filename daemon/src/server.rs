use shared::ipc::{Command, Response};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::listener::Transcript;
use crate::rate_limit::CommandRateLimiter;
use crate::state::DaemonState;

const SOCKET_NAME: &str = "voxmaild.sock";

/// Largest request accepted on the socket.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// `$XDG_RUNTIME_DIR/voxmaild.sock`, or `/tmp/voxmaild.sock` without one.
pub fn default_socket_path() -> PathBuf {
    match dirs::runtime_dir() {
        Some(runtime_dir) => runtime_dir.join(SOCKET_NAME),
        None => PathBuf::from("/tmp").join(SOCKET_NAME),
    }
}

pub struct DaemonServer {
    socket_path: PathBuf,
    state: Arc<Mutex<DaemonState>>,
    rate_limiter: Arc<CommandRateLimiter>,
    io_timeout: Duration,
}

impl DaemonServer {
    pub fn new(
        socket_path: PathBuf,
        state: Arc<Mutex<DaemonState>>,
        rate_limiter: CommandRateLimiter,
        io_timeout: Duration,
    ) -> Self {
        Self {
            socket_path,
            state,
            rate_limiter: Arc::new(rate_limiter),
            io_timeout,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let socket_path = self.socket_path.clone();

        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        info!("Starting socket server at {}", socket_path.display());

        let listener = UnixListener::bind(&socket_path)?;
        debug!("Listener bound successfully");

        let tick_interval = {
            let state = self.state.lock().await;
            Duration::from_millis(state.config.timeouts.tick_interval_ms.max(1))
        };
        let ticker = Self::spawn_ticker(Arc::clone(&self.state), tick_interval);

        let result = self.accept_loop(listener).await;
        ticker.abort();
        result
    }

    async fn accept_loop(&self, listener: UnixListener) -> anyhow::Result<()> {
        loop {
            let state = Arc::clone(&self.state);
            let limiter = Arc::clone(&self.rate_limiter);
            let io_timeout = self.io_timeout;
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("Connection accepted");
                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(state, limiter, stream, io_timeout).await
                        {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Drives the engine's timers from wall-clock time.
    pub fn spawn_ticker(state: Arc<Mutex<DaemonState>>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                state.lock().await.tick();
            }
        })
    }

    async fn handle_connection<S>(
        state: Arc<Mutex<DaemonState>>,
        limiter: Arc<CommandRateLimiter>,
        mut stream: S,
        io_timeout: Duration,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = Vec::new();
        // one byte past the cap tells an oversized request from a full one
        let limit = MAX_REQUEST_BYTES as u64 + 1;
        timeout(io_timeout, (&mut stream).take(limit).read_to_end(&mut buffer))
            .await
            .map_err(|_| anyhow::anyhow!("Timed out reading request"))??;

        if buffer.is_empty() {
            return Ok(());
        }

        let response = if buffer.len() > MAX_REQUEST_BYTES {
            warn!("Rejecting request larger than {} bytes", MAX_REQUEST_BYTES);
            Response::Error(format!("Request exceeds {} bytes", MAX_REQUEST_BYTES))
        } else if limiter.check() {
            match serde_json::from_slice::<Command>(&buffer) {
                Ok(command) => {
                    info!("Received command: {:?}", command);
                    Self::handle_command(&state, command).await
                }
                Err(e) => {
                    warn!("Malformed request: {}", e);
                    Response::Error(format!("Malformed request: {}", e))
                }
            }
        } else {
            warn!("Rate limit exceeded, rejecting request");
            Response::Error("Rate limit exceeded, try again shortly".to_string())
        };

        let response_json = serde_json::to_vec(&response)?;
        timeout(io_timeout, async {
            stream.write_all(&response_json).await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| anyhow::anyhow!("Timed out writing response"))??;

        debug!("Sent response: {:?}", response);

        Ok(())
    }

    pub async fn handle_command(state: &Mutex<DaemonState>, command: Command) -> Response {
        let mut state = state.lock().await;
        match command {
            Command::Start => {
                state.activate();
                Response::Ok
            }
            Command::Stop => {
                state.deactivate();
                Response::Ok
            }
            Command::Toggle => {
                let enabled = state.toggle();
                info!("Voice recognition {}", if enabled { "on" } else { "off" });
                Response::Ok
            }
            Command::Status => Response::Status(state.get_status()),
            Command::Say(text) => Response::Feedback(state.say(&text)),
            Command::Interim(text) => Response::Feedback(state.recognized(Transcript::interim(text))),
            Command::Focus(field) => {
                if state.focus(field) {
                    Response::Ok
                } else {
                    let label = field.map(|field| field.label()).unwrap_or("none");
                    Response::Error(format!(
                        "Cannot focus {} on the {} screen",
                        label,
                        state.host().screen()
                    ))
                }
            }
            Command::SetConfirmActions(enabled) => {
                state.set_confirm_actions(enabled);
                Response::Ok
            }
            Command::Speak { text, interrupt } => Response::Feedback(state.speak(&text, interrupt)),
        }
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serial_test::serial;
    use shared::{FieldId, VoiceStatus};
    use tokio::net::UnixStream;

    fn shared_state() -> Mutex<DaemonState> {
        Mutex::new(DaemonState::new(Config::default()).unwrap())
    }

    #[test]
    fn test_default_socket_path() {
        let path = default_socket_path();
        assert!(path.ends_with("voxmaild.sock"));
    }

    #[tokio::test]
    async fn test_handle_start_and_status() {
        let state = shared_state();
        let response = DaemonServer::handle_command(&state, Command::Start).await;
        assert_eq!(response, Response::Ok);

        match DaemonServer::handle_command(&state, Command::Status).await {
            Response::Status(info) => {
                assert!(info.is_listening);
                assert_eq!(info.voice_status, VoiceStatus::Listening);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_say_returns_feedback() {
        let state = shared_state();
        match DaemonServer::handle_command(&state, Command::Say("flibbertigibbet".into())).await {
            Response::Feedback(feedback) => {
                assert_eq!(
                    feedback.spoken,
                    vec!["Command not recognized. Say 'help' to hear available commands."]
                );
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_handle_focus_off_screen_is_error() {
        let state = shared_state();
        let response = tokio_test::block_on(DaemonServer::handle_command(
            &state,
            Command::Focus(Some(FieldId::Subject)),
        ));
        assert_eq!(
            response,
            Response::Error("Cannot focus subject on the login screen".to_string())
        );
        let response =
            tokio_test::block_on(DaemonServer::handle_command(&state, Command::Focus(None)));
        assert_eq!(response, Response::Ok);
    }

    /// Runs one connection over an in-memory pipe and returns the reply.
    async fn exchange(request: &[u8]) -> Response {
        let (mut client, server_side) = tokio::io::duplex(8 * 1024);
        let connection = tokio::spawn(DaemonServer::handle_connection(
            Arc::new(shared_state()),
            Arc::new(CommandRateLimiter::new(10, 20, true).unwrap()),
            server_side,
            Duration::from_secs(5),
        ));

        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();
        let mut buffer = Vec::new();
        client.read_to_end(&mut buffer).await.unwrap();
        connection.await.unwrap().unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[tokio::test]
    async fn test_request_at_size_cap_is_accepted() {
        let mut request = serde_json::to_vec(&Command::Status).unwrap();
        request.resize(MAX_REQUEST_BYTES, b' ');
        assert!(matches!(exchange(&request).await, Response::Status(_)));
    }

    #[tokio::test]
    async fn test_oversized_request_is_rejected() {
        let mut request = serde_json::to_vec(&Command::Status).unwrap();
        request.resize(MAX_REQUEST_BYTES + 1, b' ');
        assert_eq!(
            exchange(&request).await,
            Response::Error(format!("Request exceeds {} bytes", MAX_REQUEST_BYTES))
        );
    }

    #[tokio::test]
    async fn test_malformed_request_is_reported() {
        match exchange(b"{not json").await {
            Response::Error(msg) => assert!(msg.starts_with("Malformed request")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    async fn round_trip(path: &PathBuf, command: &Command) -> Response {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream
            .write_all(&serde_json::to_vec(command).unwrap())
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        serde_json::from_slice(&buffer).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_server_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxmaild-test.sock");
        let state = Arc::new(shared_state());
        let server = DaemonServer::new(
            path.clone(),
            state,
            CommandRateLimiter::new(10, 20, true).unwrap(),
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(async move { server.run().await });

        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let response = round_trip(&path, &Command::Say("sign in".into())).await;
        match response {
            Response::Feedback(feedback) => {
                assert_eq!(feedback.spoken, vec!["Signed in. You have 2 unread emails."]);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let response = round_trip(&path, &Command::Status).await;
        assert!(matches!(response, Response::Status(info) if info.screen == "inbox"));

        handle.abort();
    }

    #[tokio::test]
    #[serial]
    async fn test_server_rate_limits_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxmaild-limit.sock");
        let server = DaemonServer::new(
            path.clone(),
            Arc::new(shared_state()),
            CommandRateLimiter::new(1, 1, true).unwrap(),
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(async move { server.run().await });

        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(matches!(
            round_trip(&path, &Command::Status).await,
            Response::Status(_)
        ));
        assert_eq!(
            round_trip(&path, &Command::Status).await,
            Response::Error("Rate limit exceeded, try again shortly".to_string())
        );

        handle.abort();
    }
}
