//! Background write orchestration
//!
//! [`TagWriter`] runs at most one write attempt at a time:
//!
//! ```text
//! Idle -> TechResolved -> Writing -> (report sent) -> Idle
//! ```
//!
//! The attempt owns the tag and a snapshot of the tag information and runs
//! on its own thread. Exactly one [`WriteReport`] is sent on the completion
//! channel per accepted tag. The caller never blocks on tag I/O.

use core::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bttag_core::error::{Error, Step};
use bttag_core::medium::{self, Technology};
use bttag_core::tech::{CloseHandle, Tag};
use bttag_core::writer::{CancelToken, TechWriter, WriteOutcome};
use bttag_core::TagInformation;
use thiserror::Error;

/// Terminal status of a write attempt
///
/// The integer codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WriteStatus {
    /// Written
    Success = 0,
    /// Cancelled by the caller
    Cancelled = 1,
    /// Tag left the field or stopped answering
    ConnectionLost = -1,
    /// Formatting the tag failed
    FailedToFormat = -2,
    /// Content does not fit the tag
    TooSmall = -3,
    /// No supported technology
    TagNotAccepted = -4,
    /// Any other write failure
    FailedToWrite = -5,
    /// Tag is locked
    WriteProtected = -6,
}

impl WriteStatus {
    /// Integer code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Status for an integer code
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(WriteStatus::Success),
            1 => Some(WriteStatus::Cancelled),
            -1 => Some(WriteStatus::ConnectionLost),
            -2 => Some(WriteStatus::FailedToFormat),
            -3 => Some(WriteStatus::TooSmall),
            -4 => Some(WriteStatus::TagNotAccepted),
            -5 => Some(WriteStatus::FailedToWrite),
            -6 => Some(WriteStatus::WriteProtected),
            _ => None,
        }
    }

    /// Classify a write error
    ///
    /// Once the attempt was cancelled, every I/O failure is reported as
    /// [`WriteStatus::Cancelled`] whatever step it happened in.
    pub fn classify(err: &Error, cancelled: bool) -> Self {
        match err {
            Error::Io { .. } if cancelled => WriteStatus::Cancelled,
            Error::Io {
                step: Step::Format, ..
            } => WriteStatus::FailedToFormat,
            Error::Io { .. } => WriteStatus::ConnectionLost,
            Error::OutOfSpace { .. } => WriteStatus::TooSmall,
            Error::UnsupportedMedium => WriteStatus::TagNotAccepted,
            Error::WriteProtected => WriteStatus::WriteProtected,
            Error::AuthenticationFailed { .. } => WriteStatus::FailedToFormat,
            Error::InvalidBlock { .. }
            | Error::MalformedData(_)
            | Error::InvalidAddress(_)
            | Error::Config(_) => WriteStatus::FailedToWrite,
        }
    }
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteStatus::Success => "success",
            WriteStatus::Cancelled => "cancelled",
            WriteStatus::ConnectionLost => "connection lost",
            WriteStatus::FailedToFormat => "failed to format",
            WriteStatus::TooSmall => "tag too small",
            WriteStatus::TagNotAccepted => "tag not accepted",
            WriteStatus::FailedToWrite => "failed to write",
            WriteStatus::WriteProtected => "write protected",
        };
        write!(f, "{}", s)
    }
}

/// Completion notification of one attempt
#[derive(Debug)]
pub struct WriteReport {
    /// Terminal status
    pub status: WriteStatus,
    /// Details of a successful write
    pub outcome: Option<WriteOutcome>,
    /// Error behind a failed write
    pub error: Option<Error>,
}

impl WriteReport {
    fn new(result: bttag_core::Result<WriteOutcome>, cancelled: bool) -> Self {
        match result {
            Ok(outcome) => Self {
                status: WriteStatus::Success,
                outcome: Some(outcome),
                error: None,
            },
            Err(err) => Self {
                status: WriteStatus::classify(&err, cancelled),
                outcome: None,
                error: Some(err),
            },
        }
    }
}

/// Why a presented tag was not accepted
#[derive(Debug, Error)]
pub enum Rejection {
    /// An attempt is already in flight
    #[error("a write is already in progress")]
    Busy,
    /// No supported technology on the tag
    #[error("tag technology not supported")]
    Unsupported,
    /// The background thread could not be started
    #[error("failed to start writer thread: {0}")]
    SpawnFailed(#[source] std::io::Error),
}

/// Observable orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// No attempt in flight
    Idle,
    /// Technology picked, write not started yet
    TechResolved(Technology),
    /// Write running
    Writing(Technology),
}

const PHASE_RESOLVED: u8 = 0;
const PHASE_WRITING: u8 = 1;
const PHASE_DONE: u8 = 2;

/// Handles kept by the orchestrator for the attempt in flight
struct ActiveAttempt {
    technology: Technology,
    phase: Arc<AtomicU8>,
    cancel: CancelToken,
    close: Arc<dyn CloseHandle>,
    writer: Arc<dyn TechWriter>,
    thread: JoinHandle<()>,
}

impl ActiveAttempt {
    fn phase(&self) -> u8 {
        self.phase.load(Ordering::SeqCst)
    }
}

/// Runs tag writes on a background thread
pub struct TagWriter {
    completion: Sender<WriteReport>,
    active: Option<ActiveAttempt>,
}

impl TagWriter {
    /// Orchestrator posting reports to `completion`
    pub fn new(completion: Sender<WriteReport>) -> Self {
        Self {
            completion,
            active: None,
        }
    }

    /// Current state
    pub fn state(&self) -> WriterState {
        match &self.active {
            None => WriterState::Idle,
            Some(active) => match active.phase() {
                PHASE_RESOLVED => WriterState::TechResolved(active.technology),
                PHASE_WRITING => WriterState::Writing(active.technology),
                _ => WriterState::Idle,
            },
        }
    }

    /// Drop the finished attempt, if any
    fn reap(&mut self) {
        let finished = self
            .active
            .as_ref()
            .is_some_and(|a| a.phase() == PHASE_DONE);
        if !finished {
            return;
        }

        if let Some(active) = self.active.take() {
            if active.thread.join().is_err() {
                log::error!("Writer thread panicked");
            }
        }
    }

    /// Start writing `info` to a presented tag
    ///
    /// Returns the technology that will be used. The report arrives on the
    /// completion channel.
    pub fn present(
        &mut self,
        mut tag: Box<dyn Tag>,
        info: &TagInformation,
    ) -> Result<Technology, Rejection> {
        self.reap();
        if self.active.is_some() {
            log::warn!("Tag presented while a write is in progress");
            return Err(Rejection::Busy);
        }

        let medium = medium::resolve(tag.as_mut()).map_err(|_| Rejection::Unsupported)?;
        let technology = medium.technology();
        log::info!("Writing {} tag {:02X?}", technology, tag.id());

        let phase = Arc::new(AtomicU8::new(PHASE_RESOLVED));
        let cancel = CancelToken::new();
        let close = tag.close_handle();
        let writer: Arc<dyn TechWriter> = Arc::from(medium.writer());

        let thread = {
            let phase = Arc::clone(&phase);
            let cancel = cancel.clone();
            let writer = Arc::clone(&writer);
            let completion = self.completion.clone();
            let info = info.clone();

            thread::Builder::new()
                .name("bttag-writer".into())
                .spawn(move || {
                    phase.store(PHASE_WRITING, Ordering::SeqCst);

                    let result = writer.write_to_tag(tag.as_mut(), &info, &cancel);
                    let report = WriteReport::new(result, cancel.is_cancelled());
                    match &report.error {
                        None => log::info!("Write finished: {}", report.status),
                        Some(e) => log::warn!("Write failed ({}): {}", report.status, e),
                    }
                    drop(tag);

                    phase.store(PHASE_DONE, Ordering::SeqCst);
                    if completion.send(report).is_err() {
                        log::debug!("Completion receiver gone, report dropped");
                    }
                })
                .map_err(Rejection::SpawnFailed)?
        };

        self.active = Some(ActiveAttempt {
            technology,
            phase,
            cancel,
            close,
            writer,
            thread,
        });

        Ok(technology)
    }

    /// Cancel the attempt in flight
    ///
    /// Sets the cancellation flag and closes the tag connection so the
    /// blocking call in progress fails. Returns false if nothing was
    /// running.
    pub fn cancel(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if active.phase() == PHASE_DONE {
            return false;
        }

        log::info!("Cancelling {} write", active.technology);
        active.cancel.cancel();
        active.writer.close(active.close.as_ref());
        true
    }
}
