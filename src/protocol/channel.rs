//! Local duplex channels between a worker and its client.
//!
//! Every worker owns two channels named after its id: one carrying requests and responses,
//! one carrying log lines from the worker to the client. The worker binds both; the client
//! connects the log channel first, then the request channel.

use std::{
    io::{self, Write},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{Error::ChannelTimeout, Result};

/// Prefix of every channel name.
pub const CHANNEL_PREFIX: &str = "layoutscope";

/// Bound on binding, accepting and connecting channels.
#[must_use]
pub fn connect_timeout() -> Duration {
    if cfg!(debug_assertions) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(5)
    }
}

/// A channel id unique to this process and call.
#[must_use]
pub fn new_channel_id() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or_default();
    format!(
        "{}-{}-{nanos:08x}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

async fn within<T, F>(future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let limit = connect_timeout();
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| ChannelTimeout(limit))?
}

fn retryable(error: &io::Error) -> bool {
    const ERROR_PIPE_BUSY: i32 = 231;

    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    ) || (cfg!(windows) && error.raw_os_error() == Some(ERROR_PIPE_BUSY))
}

#[cfg(unix)]
mod platform {
    use std::path::PathBuf;

    use tokio::net::{UnixListener, UnixStream};

    use super::*;

    /// Worker side stream.
    pub type ServerStream = UnixStream;
    /// Client side stream.
    pub type ClientStream = UnixStream;

    /// Socket path of the request channel.
    #[must_use]
    pub fn request_channel_name(id: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{CHANNEL_PREFIX}-{id}.sock"))
    }

    /// Socket path of the log channel.
    #[must_use]
    pub fn log_channel_name(id: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{CHANNEL_PREFIX}-{id}-log.sock"))
    }

    /// Both channels bound by a worker, not yet connected.
    #[derive(Debug)]
    pub struct WorkerListener {
        requests: UnixListener,
        log: UnixListener,
        paths: [PathBuf; 2],
    }

    impl WorkerListener {
        /// Bind the channels for `id`, replacing stale sockets of the same name.
        ///
        /// # Errors
        /// [`crate::Error::FileError`] if a socket cannot be bound.
        pub fn bind(id: &str) -> Result<Self> {
            let paths = [request_channel_name(id), log_channel_name(id)];
            for path in &paths {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }

            Ok(WorkerListener {
                requests: UnixListener::bind(&paths[0])?,
                log: UnixListener::bind(&paths[1])?,
                paths,
            })
        }

        /// Wait for the client: log channel first, then requests.
        ///
        /// # Errors
        /// [`crate::Error::ChannelTimeout`] if the client does not connect in time.
        pub async fn accept(self) -> Result<(ServerStream, ServerStream)> {
            within(async move {
                let (log, _) = self.log.accept().await?;
                let (requests, _) = self.requests.accept().await?;
                Ok((log, requests))
            })
            .await
        }
    }

    impl Drop for WorkerListener {
        fn drop(&mut self) {
            for path in &self.paths {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    async fn connect_one(path: PathBuf) -> Result<ClientStream> {
        loop {
            match UnixStream::connect(&path).await {
                Ok(stream) => return Ok(stream),
                Err(error) if retryable(&error) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Connect to the worker bound under `id`, returning `(log, requests)`.
    ///
    /// # Errors
    /// [`crate::Error::ChannelTimeout`] if the worker does not listen in time.
    pub async fn connect(id: &str) -> Result<(ClientStream, ClientStream)> {
        within(async {
            let log = connect_one(log_channel_name(id)).await?;
            let requests = connect_one(request_channel_name(id)).await?;
            Ok((log, requests))
        })
        .await
    }
}

#[cfg(windows)]
mod platform {
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    use super::*;

    /// Worker side stream.
    pub type ServerStream = NamedPipeServer;
    /// Client side stream.
    pub type ClientStream = NamedPipeClient;

    /// Pipe name of the request channel.
    #[must_use]
    pub fn request_channel_name(id: &str) -> String {
        format!(r"\\.\pipe\{CHANNEL_PREFIX}-{id}")
    }

    /// Pipe name of the log channel.
    #[must_use]
    pub fn log_channel_name(id: &str) -> String {
        format!(r"\\.\pipe\{CHANNEL_PREFIX}-{id}-log")
    }

    /// Both channels created by a worker, not yet connected.
    #[derive(Debug)]
    pub struct WorkerListener {
        requests: NamedPipeServer,
        log: NamedPipeServer,
    }

    impl WorkerListener {
        /// Create the pipes for `id`.
        ///
        /// # Errors
        /// [`crate::Error::FileError`] if a pipe of the same name already exists.
        pub fn bind(id: &str) -> Result<Self> {
            Ok(WorkerListener {
                requests: ServerOptions::new()
                    .first_pipe_instance(true)
                    .create(request_channel_name(id))?,
                log: ServerOptions::new()
                    .first_pipe_instance(true)
                    .create(log_channel_name(id))?,
            })
        }

        /// Wait for the client: log channel first, then requests.
        ///
        /// # Errors
        /// [`crate::Error::ChannelTimeout`] if the client does not connect in time.
        pub async fn accept(self) -> Result<(ServerStream, ServerStream)> {
            within(async move {
                self.log.connect().await?;
                self.requests.connect().await?;
                Ok((self.log, self.requests))
            })
            .await
        }
    }

    async fn connect_one(name: String) -> Result<ClientStream> {
        loop {
            match ClientOptions::new().open(&name) {
                Ok(client) => return Ok(client),
                Err(error) if retryable(&error) => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Connect to the worker created under `id`, returning `(log, requests)`.
    ///
    /// # Errors
    /// [`crate::Error::ChannelTimeout`] if the worker does not listen in time.
    pub async fn connect(id: &str) -> Result<(ClientStream, ClientStream)> {
        within(async {
            let log = connect_one(log_channel_name(id)).await?;
            let requests = connect_one(request_channel_name(id)).await?;
            Ok((log, requests))
        })
        .await
    }
}

pub use platform::*;

/// A [`Write`] sink handing complete writes to an async task.
///
/// Installed as the logger target in the worker; [`LogWriter::pair`] returns the receiving
/// end, which the worker drains into the log channel once the client is connected.
#[derive(Debug, Clone)]
pub struct LogWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl LogWriter {
    /// A writer and the receiver of everything written to it.
    #[must_use]
    pub fn pair() -> (LogWriter, UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = unbounded_channel();
        (LogWriter { sender }, receiver)
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "log channel closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
