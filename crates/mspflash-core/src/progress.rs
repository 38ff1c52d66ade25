//! Progress reporting
//!
//! Stages run on a worker thread and report through a [`ProgressSink`]. The
//! sink wraps a bounded channel and never blocks: when the consumer falls
//! behind, events are dropped instead of stalling the tool's output pipe.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use core::fmt;

/// Default channel depth used by the CLI
pub const DEFAULT_CAPACITY: usize = 256;

/// Coarse phase of a multi-region write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    /// Tool is syncing with the boot ROM
    Connecting,
    /// Bootloader region
    WritingBootloader,
    /// Partition table region
    WritingPartitionTable,
    /// Boot selector region
    WritingBootSelector,
    /// Application region
    WritingApplication,
    /// Tool is checking written data
    Verifying,
    /// Tool is resetting the device
    Resetting,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WritePhase::Connecting => "Connecting",
            WritePhase::WritingBootloader => "Writing bootloader",
            WritePhase::WritingPartitionTable => "Writing partition table",
            WritePhase::WritingBootSelector => "Writing boot selector",
            WritePhase::WritingApplication => "Writing application",
            WritePhase::Verifying => "Verifying",
            WritePhase::Resetting => "Resetting device",
        };
        f.write_str(s)
    }
}

/// A progress event emitted by a pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Free-form status line
    Message(String),
    /// Download progress after a chunk was written to disk
    Download {
        /// Bytes written so far
        downloaded: u64,
        /// Declared size, when the release listing carried one
        total: Option<u64>,
        /// `downloaded / total` in percent, absent when the total is unknown
        percent: Option<f32>,
    },
    /// Archive is being unpacked
    Extracting,
    /// Write phase changed
    Phase(WritePhase),
    /// Raw tool line carrying a percentage
    ToolTick(String),
    /// Full-chip erase started
    Erasing,
    /// Stage completed
    Finished {
        /// Outcome of the stage
        succeeded: bool,
    },
}

/// Sending half of a progress channel
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<SyncSender<ProgressEvent>>,
}

impl ProgressSink {
    /// A sink that drops every event
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Deliver an event without blocking
    pub fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::trace!("Progress channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Shorthand for [`ProgressEvent::Message`]
    pub fn message(&self, msg: impl Into<String>) {
        self.emit(ProgressEvent::Message(msg.into()));
    }
}

/// Receiving half of a progress channel
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Block until the next event; `None` once every sink is gone
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv().ok()
    }

    /// Collect every pending event without blocking
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }
}

impl Iterator for ProgressReceiver {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Create a bounded progress channel
pub fn progress_channel(capacity: usize) -> (ProgressSink, ProgressReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (ProgressSink { tx: Some(tx) }, ProgressReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (sink, rx) = progress_channel(8);
        sink.message("one");
        sink.emit(ProgressEvent::Extracting);
        sink.emit(ProgressEvent::Finished { succeeded: true });
        drop(sink);

        let events: Vec<_> = rx.collect();
        assert_eq!(
            events,
            vec![
                ProgressEvent::Message("one".into()),
                ProgressEvent::Extracting,
                ProgressEvent::Finished { succeeded: true },
            ]
        );
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, rx) = progress_channel(2);
        for i in 0..10 {
            sink.message(format!("{}", i));
        }
        assert_eq!(rx.drain().len(), 2);
    }

    #[test]
    fn disconnected_and_discard_are_silent() {
        let (sink, rx) = progress_channel(1);
        drop(rx);
        sink.message("nobody listens");
        ProgressSink::discard().emit(ProgressEvent::Erasing);
    }
}
