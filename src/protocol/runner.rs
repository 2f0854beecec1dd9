//! The client side of the protocol: starting a worker and sending it requests.

use std::{
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    process::{Child, Command},
    sync::Mutex,
    task::JoinHandle,
};

use crate::{
    layout::{Layout, Platform},
    protocol::{
        channel::{self, ClientStream},
        framing::{decode_response, read_frame},
        request::Request,
    },
    session::BuildSettings,
    Error::{FileError, ProtocolDesync},
    Result,
};

/// How to start a worker.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Worker executable.
    pub program: PathBuf,
    /// Arguments placed before the generated ones, e.g. a subcommand.
    pub leading_args: Vec<String>,
    /// Platform the worker computes layouts for.
    pub platform: Platform,
    /// Build settings passed to the worker.
    pub settings: BuildSettings,
    /// Idle timeout passed to the worker, its default when `None`.
    pub idle_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            program: PathBuf::from("layoutscope"),
            leading_args: vec!["worker".to_string()],
            platform: Platform::default(),
            settings: BuildSettings::default(),
            idle_timeout: None,
        }
    }
}

impl RunnerConfig {
    /// Command line arguments for a worker bound under `id`.
    #[must_use]
    pub fn worker_args(&self, id: &str) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push(format!("-id:{id}"));
        args.push("--platform".to_string());
        args.push(self.platform.to_string());
        args.push("--configuration".to_string());
        args.push(if self.settings.debug { "Debug" } else { "Release" }.to_string());
        if self.settings.platform_name != crate::session::ANY_CPU {
            args.push("--build-platform".to_string());
            args.push(self.settings.platform_name.clone());
        }
        if let Some(framework) = &self.settings.target_framework {
            args.push("--framework".to_string());
            args.push(framework.clone());
        }
        if let Some(timeout) = self.idle_timeout {
            args.push("--idle-timeout".to_string());
            args.push(timeout.as_secs().max(1).to_string());
        }
        args
    }
}

/// One request stream, resynchronized after cancelled requests.
///
/// A request whose response was not read to the end leaves the channel in flight; the next
/// request first reads and drops the rest of that response.
#[derive(Debug)]
pub struct RequestChannel<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    in_flight: bool,
}

impl<S> RequestChannel<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        RequestChannel {
            reader: BufReader::new(reader),
            writer,
            in_flight: false,
        }
    }

    /// `true` if a previous response has not been read completely.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Send `request` and decode its response.
    ///
    /// # Errors
    /// [`crate::Error::ProtocolDesync`] if the response is not a layout, I/O errors on the
    /// stream.
    pub async fn send(&mut self, request: &Request) -> Result<Option<Layout>> {
        if self.in_flight {
            let discarded = read_frame(&mut self.reader).await?;
            debug!("Discarded {} bytes of a cancelled response", discarded.len());
            self.in_flight = false;
        }

        self.writer.write_all(request.to_line().as_bytes()).await?;
        self.writer.flush().await?;
        self.in_flight = true;

        let payload = read_frame(&mut self.reader).await?;
        self.in_flight = false;
        decode_response(&payload)
    }
}

struct Connection {
    child: Child,
    id: String,
    requests: RequestChannel<ClientStream>,
    log_forwarder: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.log_forwarder.abort();
    }
}

/// A worker process and the channel to it.
///
/// Requests are serialized. Dropping the runner kills the worker.
pub struct HostRunner {
    config: RunnerConfig,
    connection: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for HostRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HostRunner {
    /// Spawn a worker and connect to it.
    ///
    /// # Errors
    /// [`crate::Error::FileError`] if the worker cannot be spawned and
    /// [`crate::Error::ChannelTimeout`] if its channels do not come up in time.
    pub async fn start(config: RunnerConfig) -> Result<HostRunner> {
        let connection = spawn(&config).await?;
        Ok(HostRunner {
            config,
            connection: Mutex::new(Some(connection)),
        })
    }

    /// The configuration workers are started with.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Respawn the worker if it has exited.
    ///
    /// # Errors
    /// As [`HostRunner::start`].
    pub async fn ensure_running(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        ensure(&self.config, &mut connection).await?;
        Ok(())
    }

    /// Analyze `type_name` (`<full type name>,<assembly>`) found through `path`.
    ///
    /// Cancelling the returned future leaves the response pending; it is discarded by the
    /// next call.
    ///
    /// # Errors
    /// [`crate::Error::Format`] for a malformed `type_name`, [`crate::Error::ProtocolDesync`]
    /// for an undecodable response, and channel errors. A worker failing on either of the
    /// last two is dropped and restarted on the next call.
    pub async fn analyze(&self, path: &str, type_name: &str) -> Result<Option<Layout>> {
        let request = Request::parse(&format!("{path}|{type_name}"))?;

        let mut guard = self.connection.lock().await;
        let connection = ensure(&self.config, &mut guard).await?;

        let started = Instant::now();
        let result = connection.requests.send(&request).await;
        debug!(
            "{} answered by worker {} in {:?}",
            request.type_name,
            connection.id,
            started.elapsed()
        );

        if let Err(error @ (ProtocolDesync(_) | FileError(_))) = &result {
            warn!("Dropping worker {}: {error}", connection.id);
            *guard = None;
        }
        result
    }

    /// Kill the worker. The next request starts a new one.
    pub async fn shutdown(&self) {
        if let Some(mut connection) = self.connection.lock().await.take() {
            if let Err(error) = connection.child.kill().await {
                warn!("Cannot kill worker {}: {error}", connection.id);
            }
        }
    }
}

async fn ensure<'a>(
    config: &RunnerConfig,
    slot: &'a mut Option<Connection>,
) -> Result<&'a mut Connection> {
    let exited = match slot.as_mut() {
        Some(connection) => match connection.child.try_wait()? {
            Some(status) => {
                info!("Worker {} exited with {status}", connection.id);
                true
            }
            None => false,
        },
        None => true,
    };

    if exited {
        *slot = Some(spawn(config).await?);
    }
    slot.as_mut()
        .ok_or_else(|| ProtocolDesync("worker connection missing".to_string()))
}

async fn spawn(config: &RunnerConfig) -> Result<Connection> {
    let id = channel::new_channel_id();
    let child = Command::new(&config.program)
        .args(config.worker_args(&id))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    info!(
        "Started worker {id} ({}, pid {})",
        config.platform,
        child.id().unwrap_or_default()
    );

    let (log, requests) = channel::connect(&id).await?;
    let log_forwarder = tokio::spawn(async move {
        let mut lines = BufReader::new(log).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "worker", "{}", line.trim_end());
        }
    });

    Ok(Connection {
        child,
        id,
        requests: RequestChannel::new(requests),
        log_forwarder,
    })
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt};

    use super::*;
    use crate::{
        formatting::{TokenKind, TokenizedString},
        protocol::framing::{encode_response, SENTINEL},
        typesystem::LayoutKind,
    };

    fn layout(name: &str) -> Layout {
        Layout::new(
            TokenizedString::single(TokenKind::Struct, name),
            Vec::new(),
            1,
            true,
            LayoutKind::Sequential,
            0,
            0,
        )
    }

    #[test]
    fn worker_command_line() {
        let config = RunnerConfig {
            program: PathBuf::from("/usr/bin/layoutscope"),
            platform: Platform::Arm64,
            settings: BuildSettings {
                debug: false,
                platform_name: "x64".to_string(),
                target_framework: Some("net8.0".to_string()),
            },
            idle_timeout: Some(Duration::from_secs(30)),
            ..RunnerConfig::default()
        };

        assert_eq!(
            config.worker_args("7"),
            vec![
                "worker",
                "-id:7",
                "--platform",
                "arm64",
                "--configuration",
                "Release",
                "--build-platform",
                "x64",
                "--framework",
                "net8.0",
                "--idle-timeout",
                "30",
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_response_is_discarded() {
        let (client, server) = duplex(64 * 1024);
        let mut channel = RequestChannel::new(client);

        let worker = tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(server);
            let mut lines = tokio::io::BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request = Request::parse(&line).unwrap();
                if request.type_name == "Slow" {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                let response = encode_response(Some(&layout(&request.type_name))).unwrap();
                writer.write_all(&response).await.unwrap();
            }
        });

        let slow = Request::new("/out", "Slow", "Sample");
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), channel.send(&slow)).await;
        assert!(cancelled.is_err());
        assert!(channel.is_in_flight());

        let fast = Request::new("/out", "Fast", "Sample");
        let answered = channel.send(&fast).await.unwrap().unwrap();
        assert_eq!(answered.name.value(), "Fast");
        assert!(!channel.is_in_flight());

        drop(channel);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn empty_response_and_desync() {
        let (client, server) = duplex(1024);
        let mut channel = RequestChannel::new(client);

        let worker = tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(server);
            let mut lines = tokio::io::BufReader::new(reader).lines();
            lines.next_line().await.unwrap();
            writer.write_all(&[SENTINEL]).await.unwrap();
            lines.next_line().await.unwrap();
            writer.write_all(b"{\"Fields\":[]}").await.unwrap();
            writer.write_all(&[SENTINEL]).await.unwrap();
        });

        let request = Request::new("/out", "Missing", "Sample");
        assert!(channel.send(&request).await.unwrap().is_none());
        assert!(matches!(
            channel.send(&request).await,
            Err(ProtocolDesync(_))
        ));
        worker.await.unwrap();
    }
}
