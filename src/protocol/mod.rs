//! The worker process protocol.
//!
//! A client ([`HostRunner`]) starts a worker process and talks to it over two local channels
//! named after a per-worker id (see [`channel`]): a request channel and a log channel. Each
//! request is one line, `<path>|<full type name>,<assembly>` ([`Request`]); each response is
//! the JSON of a [`crate::layout::Layout`] terminated by a sentinel byte ([`framing`]), or
//! the sentinel alone when no layout could be produced. The worker ([`Worker`]) answers
//! requests one at a time and exits after an idle interval ([`IdleTimer`]).

pub mod channel;
pub mod debugger;
pub mod framing;
mod idle;
mod request;
mod runner;
mod worker;

pub use framing::{decode_response, encode_response, read_frame, SENTINEL};
pub use idle::{IdleTimer, DEFAULT_IDLE_TIMEOUT};
pub use request::Request;
pub use runner::{HostRunner, RequestChannel, RunnerConfig};
pub use worker::{ExitReason, Worker, WorkerConfig};
