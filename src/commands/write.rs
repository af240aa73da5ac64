//! Write command implementation

use bttag_core::TagInformation;
use bttag_writer::{open_tag, TagWriter, WriteReport, WriteStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Write `info` to the tag opened from `backend`
pub fn run_write(
    backend: &str,
    info: &TagInformation,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let tag = open_tag(backend)?;

    let (tx, rx) = mpsc::channel();
    let mut writer = TagWriter::new(tx);
    let technology = writer.present(tag, info)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!(
        "Writing {} to {} tag...",
        info.address(),
        technology
    ));
    pb.enable_steady_tick(Duration::from_millis(100));

    let report = wait_for_report(&writer, &rx, timeout);
    pb.finish_and_clear();
    let report = report?;

    match (&report.status, &report.outcome) {
        (WriteStatus::Success, Some(outcome)) => {
            println!(
                "Wrote {} bytes to {} tag{}",
                outcome.payload_len,
                outcome.technology,
                if outcome.locked { " (locked)" } else { "" }
            );
            Ok(())
        }
        (status, _) => {
            let detail = report
                .error
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            Err(format!("Write failed, {} (code {}){}", status, status.code(), detail).into())
        }
    }
}

/// Wait for the attempt, cancelling it once `timeout` has passed
fn wait_for_report(
    writer: &TagWriter,
    rx: &Receiver<WriteReport>,
    timeout: Duration,
) -> Result<WriteReport, Box<dyn std::error::Error>> {
    match rx.recv_timeout(timeout) {
        Ok(report) => Ok(report),
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("No result after {:?}, cancelling", timeout);
            writer.cancel();
            rx.recv_timeout(timeout)
                .map_err(|_| "Writer did not stop after cancel".into())
        }
        Err(RecvTimeoutError::Disconnected) => Err("Writer exited without a result".into()),
    }
}
