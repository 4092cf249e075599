use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::EmotionClassifier;
use crate::detect::result::{AnalysisRequest, ClassifierOutput};
use crate::frame::Frame;

type Job = (Frame, AnalysisRequest);
type Answer = Result<ClassifierOutput>;

/// Runs a classifier on a worker thread and bounds how long a call may take.
///
/// A call that outlives `timeout` fails; the worker keeps running and its late
/// answer is discarded. Calls made while the worker is still busy fail fast.
pub struct TimedClassifier {
    name: &'static str,
    timeout: Duration,
    jobs: Option<SyncSender<Job>>,
    answers: Receiver<Answer>,
    busy: bool,
    worker: Option<JoinHandle<()>>,
}

impl TimedClassifier {
    pub fn spawn(inner: Box<dyn EmotionClassifier>, timeout: Duration) -> Result<Self> {
        let name = inner.name();
        let (job_tx, job_rx) = mpsc::sync_channel::<Job>(1);
        let (answer_tx, answer_rx) = mpsc::sync_channel::<Answer>(1);
        let worker = std::thread::Builder::new()
            .name(format!("classifier-{}", name))
            .spawn(move || {
                let mut inner = inner;
                while let Ok((frame, request)) = job_rx.recv() {
                    let answer = inner.analyze(&frame, &request);
                    if answer_tx.send(answer).is_err() {
                        break;
                    }
                }
            })
            .context("spawn classifier worker")?;

        Ok(Self {
            name,
            timeout,
            jobs: Some(job_tx),
            answers: answer_rx,
            busy: false,
            worker: Some(worker),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Collect a late answer, if the worker has finished one.
    fn settle(&mut self) -> Result<()> {
        if !self.busy {
            return Ok(());
        }
        match self.answers.try_recv() {
            Ok(stale) => {
                log::debug!(
                    "discarding late {} answer (ok={})",
                    self.name,
                    stale.is_ok()
                );
                self.busy = false;
                Ok(())
            }
            Err(TryRecvError::Empty) => Err(anyhow!("classifier {} still busy", self.name)),
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!("classifier {} worker exited", self.name))
            }
        }
    }
}

impl EmotionClassifier for TimedClassifier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn analyze(&mut self, frame: &Frame, request: &AnalysisRequest) -> Result<ClassifierOutput> {
        self.settle()?;
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("classifier {} shut down", self.name))?;
        jobs.send((frame.clone(), request.clone()))
            .map_err(|_| anyhow!("classifier {} worker exited", self.name))?;

        match self.answers.recv_timeout(self.timeout) {
            Ok(answer) => answer,
            Err(RecvTimeoutError::Timeout) => {
                self.busy = true;
                Err(anyhow!(
                    "classifier {} timed out after {}ms",
                    self.name,
                    self.timeout.as_millis()
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("classifier {} worker exited", self.name))
            }
        }
    }
}

impl Drop for TimedClassifier {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            if self.busy {
                // A hung backend must not block shutdown.
                return;
            }
            let _ = worker.join();
        }
    }
}
