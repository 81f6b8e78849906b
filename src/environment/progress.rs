//! Progress updates for a running setup

use super::provision::SetupSummary;
use crate::errors::ProvisionError;
use crate::util::CancelToken;
use log::debug;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Channel for receiving progress information from a setup run
///
/// This is a stream of updates, culminating in exactly one
/// [SetupProgress::Done]. Created by
/// [crate::environment::LinuxEnvironment::setup()].
pub struct Setup {
    pub(crate) receiver: mpsc::Receiver<SetupProgress>,
    pub(crate) cancel: CancelToken,
    pub(crate) worker: Option<JoinHandle<()>>,
}

impl Setup {
    /// Wait for setup to finish, discarding intermediate updates
    pub fn wait(self) -> Result<SetupSummary, ProvisionError> {
        let mut setup = self;
        loop {
            match setup.progress() {
                SetupProgress::Update(_) => (),
                SetupProgress::Done(result) => return result,
            }
        }
    }

    /// Block until setup makes some progress
    pub fn progress(&mut self) -> SetupProgress {
        let received = self.receiver.recv().map_err(|_| ());
        self.received(received)
    }

    /// Like [Setup::progress()], but gives up after `timeout`
    pub fn progress_timeout(&mut self, timeout: Duration) -> Option<SetupProgress> {
        match self.receiver.recv_timeout(timeout) {
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Ok(progress) => Some(self.received(Ok(progress))),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Some(self.received(Err(())))
            }
        }
    }

    fn received(&mut self, received: Result<SetupProgress, ()>) -> SetupProgress {
        match received {
            Ok(SetupProgress::Done(result)) => {
                if let Some(worker) = self.worker.take() {
                    let _ = worker.join();
                }
                SetupProgress::Done(result)
            }
            Ok(update) => update,
            Err(()) => SetupProgress::Done(Err(ProvisionError::TaskTerminated)),
        }
    }

    /// Ask the setup thread to stop at its next checkpoint
    pub fn cancel(&self) {
        debug!("Setup cancellation requested");
        self.cancel.cancel();
    }
}

#[derive(Debug)]
pub enum SetupProgress {
    Update(ProgressUpdate),
    Done(Result<SetupSummary, ProvisionError>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub message: String,
    pub percent: u8,
}

/* Worker side of the channel. The receiver may go away at any point, in
 * which case updates are dropped and the run carries on. */
pub(crate) struct ProgressReporter {
    sender: mpsc::Sender<SetupProgress>,
    cancel: CancelToken,
    percent: u8,
}

impl ProgressReporter {
    pub fn new(sender: mpsc::Sender<SetupProgress>, cancel: CancelToken) -> Self {
        Self {
            sender,
            cancel,
            percent: 0,
        }
    }

    /// Percent never goes backwards within one run
    pub fn report<S: Into<String>>(&mut self, message: S, percent: u8) {
        self.percent = self.percent.max(percent.min(100));
        let update = ProgressUpdate {
            message: message.into(),
            percent: self.percent,
        };
        debug!("Setup progress {}%: {}", update.percent, update.message);
        let _ = self.sender.send(SetupProgress::Update(update));
    }

    pub fn check_cancelled(&self) -> Result<(), ProvisionError> {
        if self.cancel.is_cancelled() {
            Err(ProvisionError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn finish(self, result: Result<SetupSummary, ProvisionError>) {
        let _ = self.sender.send(SetupProgress::Done(result));
    }
}
