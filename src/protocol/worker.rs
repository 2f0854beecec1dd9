//! The worker side of the protocol: a request loop over one channel pair.

use std::{path::Path, time::Duration};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc::UnboundedReceiver,
};

use crate::{
    layout::{Layout, Platform},
    protocol::{
        channel::WorkerListener,
        debugger,
        framing::{encode_response, SENTINEL},
        idle::{IdleTimer, DEFAULT_IDLE_TIMEOUT},
        request::Request,
    },
    session::{AnalysisTarget, BuildSettings, SessionKey, SessionRegistry},
    Error::Format,
    Result,
};

/// Worker settings, taken from its command line.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Channel id shared with the client.
    pub id: String,
    /// Platform layouts are computed for.
    pub platform: Platform,
    /// Build settings for project paths.
    pub settings: BuildSettings,
    /// Exit after this long without a request.
    pub idle_timeout: Duration,
    /// Block at start until a debugger attaches.
    pub wait_for_debugger: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            id: String::new(),
            platform: Platform::default(),
            settings: BuildSettings::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            wait_for_debugger: false,
        }
    }
}

/// Why [`Worker::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The client closed the request channel.
    Disconnected,
    /// No request arrived within the idle interval.
    Idle,
}

/// Owns the sessions and the idle timer of one worker process.
#[derive(Debug)]
pub struct Worker {
    config: WorkerConfig,
    sessions: SessionRegistry,
    idle: IdleTimer,
}

impl Worker {
    /// Create a worker with no open sessions.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Worker {
            idle: IdleTimer::new(config.idle_timeout),
            sessions: SessionRegistry::new(),
            config,
        }
    }

    /// The worker configuration.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Bind the channels, wait for the client and serve it.
    ///
    /// Log output written to the sender paired with `log` is forwarded to the client's log
    /// channel once it connects.
    ///
    /// # Errors
    /// [`crate::Error::ChannelTimeout`] if no client connects in time, or I/O errors on the
    /// channels.
    pub async fn run(&self, log: Option<UnboundedReceiver<Vec<u8>>>) -> Result<ExitReason> {
        if self.config.wait_for_debugger {
            wait_for_debugger().await;
        }

        let listener = WorkerListener::bind(&self.config.id)?;
        info!(
            "Worker {} listening ({}, idle timeout {:?})",
            self.config.id, self.config.platform, self.config.idle_timeout
        );
        let (mut log_stream, requests) = listener.accept().await?;

        if let Some(mut log) = log {
            tokio::spawn(async move {
                while let Some(bytes) = log.recv().await {
                    if log_stream.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
            });
        }

        self.idle.reset();
        self.serve(requests).await
    }

    /// Answer request lines from `stream` until the client disconnects or the worker idles
    /// out. An expired timer is ignored while a debugger is attached.
    ///
    /// # Errors
    /// I/O errors on `stream`.
    pub async fn serve<S>(&self, stream: S) -> Result<ExitReason>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        // Partial reads stay in `line` if the idle branch wins the select
        let mut line = Vec::new();

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut line) => {
                    if read? == 0 {
                        info!("Worker {}: client disconnected", self.config.id);
                        return Ok(ExitReason::Disconnected);
                    }

                    self.idle.reset();
                    let response = self.respond_bytes(&line);
                    line.clear();
                    writer.write_all(&response).await?;
                    writer.flush().await?;
                }
                () = self.idle.expired() => {
                    if debugger::is_attached() {
                        self.idle.reset();
                        continue;
                    }
                    info!(
                        "Worker {}: idle for {:?}, exiting",
                        self.config.id,
                        self.idle.interval()
                    );
                    return Ok(ExitReason::Idle);
                }
            }
        }
    }

    /// [`Worker::respond`] for a raw line as read from the channel, newline included. Lines
    /// that are not UTF-8 are answered with the sentinel alone.
    #[must_use]
    pub fn respond_bytes(&self, line: &[u8]) -> Vec<u8> {
        match std::str::from_utf8(line) {
            Ok(text) => self.respond(text.trim_end_matches(['\r', '\n'])),
            Err(err) => {
                let err = Format(format!("request line of {} bytes is not UTF-8: {err}", line.len()));
                error!("Request failed: {err}");
                vec![SENTINEL]
            }
        }
    }

    /// The framed response to one request line. Failures are logged and answered with the
    /// sentinel alone.
    #[must_use]
    pub fn respond(&self, line: &str) -> Vec<u8> {
        let layout = match self.analyze(line) {
            Ok(layout) => layout,
            Err(err) => {
                error!("Request \"{}\" failed: {err}", line.trim_end());
                None
            }
        };

        encode_response(layout.as_ref()).unwrap_or_else(|err| {
            error!("Cannot serialize layout: {err}");
            vec![SENTINEL]
        })
    }

    /// Parse and run one request line.
    ///
    /// # Errors
    /// Whatever parsing the request, opening its session or the analysis reports.
    pub fn analyze(&self, line: &str) -> Result<Option<Layout>> {
        let request = Request::parse(line)?;
        let target = AnalysisTarget::from_path(Path::new(&request.path), &self.config.settings);
        let session = self
            .sessions
            .get_or_open(&SessionKey::new(target, self.config.platform))?;

        debug!(
            "Session {} serves {}",
            session.generation(),
            request.type_name
        );
        let layout = session.load_and_analyze(&request.assembly, &request.type_name)?;
        if layout.is_none() {
            warn!("{} has no layout", request.type_name);
        }
        Ok(layout)
    }
}

async fn wait_for_debugger() {
    info!("Waiting for a debugger to attach (pid {})", std::process::id());
    while !debugger::is_attached() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    info!("Debugger attached");
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncWriteExt, BufReader};

    use super::*;
    use crate::{
        protocol::framing::{decode_response, read_frame},
        test::{element, write_assembly, FieldSpec, ImageBuilder, TypeSpecBuilder},
    };

    fn output() -> tempfile::TempDir {
        let output = tempfile::tempdir().unwrap();
        write_assembly(
            output.path(),
            "Sample",
            &ImageBuilder::new().assembly("Sample").type_def(
                TypeSpecBuilder::value_type("Sample", "Header")
                    .sequential()
                    .field(FieldSpec::public("Tag", &[element::U1]))
                    .field(FieldSpec::public("Length", &[element::I4])),
            ),
        );
        output
    }

    fn worker(idle_timeout: Duration) -> Worker {
        Worker::new(WorkerConfig {
            id: "test".to_string(),
            idle_timeout,
            ..WorkerConfig::default()
        })
    }

    #[test]
    fn respond_to_lines() {
        let output = output();
        let worker = worker(DEFAULT_IDLE_TIMEOUT);
        let line = format!(
            "{}|Sample.Header,Sample",
            output.path().join("Sample.dll").display()
        );

        let response = worker.respond(&line);
        assert_eq!(response.last(), Some(&SENTINEL));
        let layout = decode_response(&response[..response.len() - 1])
            .unwrap()
            .unwrap();
        assert_eq!(layout.total_size, 8);
        assert_eq!(layout.total_padding, 3);

        assert_eq!(worker.respond("garbage"), vec![SENTINEL]);
        let missing = format!("{}|Sample.Nope,Sample", output.path().display());
        assert_eq!(worker.respond(&missing), vec![SENTINEL]);
        assert_eq!(worker.sessions().len(), 1);
    }

    #[tokio::test]
    async fn serve_until_disconnect() {
        let output = output();
        let worker = worker(DEFAULT_IDLE_TIMEOUT);
        let (client, server) = duplex(64 * 1024);

        let requests = format!(
            "no bar\n{}|Sample.Header,Sample\n",
            output.path().display()
        );
        let client = async move {
            let (reader, mut writer) = tokio::io::split(client);
            writer.write_all(requests.as_bytes()).await.unwrap();

            let mut reader = BufReader::new(reader);
            let first = read_frame(&mut reader).await.unwrap();
            let second = read_frame(&mut reader).await.unwrap();
            writer.shutdown().await.unwrap();
            (first, second)
        };

        let (served, (first, second)) = tokio::join!(worker.serve(server), client);
        assert_eq!(served.unwrap(), ExitReason::Disconnected);
        assert!(first.is_empty());
        assert!(decode_response(&second).unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_answered() {
        let output = output();
        let worker = worker(DEFAULT_IDLE_TIMEOUT);
        let (client, server) = duplex(64 * 1024);

        let mut requests = b"\xff\xfe|bad\n".to_vec();
        requests.extend(format!("{}|Sample.Header,Sample\n", output.path().display()).bytes());
        let client = async move {
            let (reader, mut writer) = tokio::io::split(client);
            writer.write_all(&requests).await.unwrap();

            let mut reader = BufReader::new(reader);
            let first = read_frame(&mut reader).await.unwrap();
            let second = read_frame(&mut reader).await.unwrap();
            writer.shutdown().await.unwrap();
            (first, second)
        };

        let (served, (first, second)) = tokio::join!(worker.serve(server), client);
        assert_eq!(served.unwrap(), ExitReason::Disconnected);
        assert!(first.is_empty());
        let layout = decode_response(&second).unwrap().unwrap();
        assert_eq!(layout.total_size, 8);
        assert_eq!(worker.respond_bytes(b"\xc3\n"), vec![SENTINEL]);
    }

    #[tokio::test]
    async fn idle_exit() {
        let worker = worker(Duration::from_millis(50));
        let (_client, server) = duplex(1024);

        let reason = worker.serve(server).await.unwrap();
        assert_eq!(reason, ExitReason::Idle);
    }
}
