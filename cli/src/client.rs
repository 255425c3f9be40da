use shared::ipc::{Command, IpcError, Response};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Timeout for socket operations (10 seconds)
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the Unix socket path for the daemon.
/// Uses XDG runtime directory if available, falls back to /tmp/voxmaild.sock
fn get_socket_path() -> PathBuf {
    if let Some(runtime_dir) = dirs::runtime_dir() {
        runtime_dir.join("voxmaild.sock")
    } else {
        PathBuf::from("/tmp/voxmaild.sock")
    }
}

pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: SOCKET_TIMEOUT,
        }
    }

    pub async fn send_command(&self, cmd: Command) -> Result<Response, IpcError> {
        let mut stream = match timeout(self.timeout, UnixStream::connect(&self.socket_path)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IpcError::ConnectionRefused);
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(IpcError::ConnectionRefused);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    "Connection timeout: failed to connect to daemon at {} within {:?}",
                    self.socket_path.display(),
                    self.timeout
                );
                return Err(IpcError::Timeout);
            }
        };

        let command_json = serde_json::to_vec(&cmd)?;

        // The daemon reads until EOF, so close our write half after the request.
        let write = async {
            stream.write_all(&command_json).await?;
            stream.shutdown().await
        };
        match timeout(self.timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Write timeout: failed to send command to daemon within {:?}", self.timeout);
                return Err(IpcError::Timeout);
            }
        }

        let mut buffer = Vec::new();
        match timeout(self.timeout, stream.read_to_end(&mut buffer)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(
                    "Read timeout: failed to receive response from daemon within {:?}",
                    self.timeout
                );
                return Err(IpcError::Timeout);
            }
        }

        let response: Response = serde_json::from_slice(&buffer)?;

        Ok(response)
    }
}
