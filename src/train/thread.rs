use std::{
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    tensor::backend::AutodiffBackend,
};

use super::trainer::{train, TrainingJob};

/// Messages from the training worker, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerEvent {
    Log(String),
    /// Sent exactly once, last.
    Finished(bool),
}

pub struct TrainerThread;

impl TrainerThread {
    /// Trains on the default GPU device.
    pub fn spawn(job: TrainingJob) -> Result<TrainerHandle> {
        Self::spawn_on::<Autodiff<Wgpu>>(job, WgpuDevice::default())
    }

    pub fn spawn_on<B: AutodiffBackend>(
        job: TrainingJob,
        device: B::Device,
    ) -> Result<TrainerHandle> {
        let (sender, events) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("vit-trainer".to_string())
            .spawn(move || {
                let mut forward = |line: String| {
                    let _ = sender.send(TrainerEvent::Log(line));
                };

                let success = match train::<B>(&job, device, &mut forward) {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::error!("Training failed: {:#}", err);
                        forward(format!("Training failed: {err:#}"));
                        false
                    }
                };
                let _ = sender.send(TrainerEvent::Finished(success));
            })
            .context("Cannot start the training thread")?;

        Ok(TrainerHandle { events, worker })
    }
}

/// Receiving end of a running training worker.
pub struct TrainerHandle {
    events: Receiver<TrainerEvent>,
    worker: JoinHandle<()>,
}

impl TrainerHandle {
    pub fn events(&self) -> &Receiver<TrainerEvent> {
        &self.events
    }

    /// Passes every log line to `on_log` until the worker finishes, then
    /// returns its completion flag. A worker that dies without reporting
    /// counts as a failure.
    pub fn wait(self, mut on_log: impl FnMut(&str)) -> bool {
        let mut success = None;
        for event in self.events.iter() {
            match event {
                TrainerEvent::Log(line) => on_log(&line),
                TrainerEvent::Finished(ok) => {
                    success = Some(ok);
                    break;
                }
            }
        }

        match (self.worker.join(), success) {
            (Ok(()), Some(ok)) => ok,
            _ => {
                on_log("Training failed: the training thread stopped unexpectedly");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::trainer::tests::tiny_job;
    use burn::backend::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn successful_run_ends_with_finished_true() {
        let dir = tempfile::tempdir().unwrap();
        let job = tiny_job(dir.path(), 1);

        let handle = TrainerThread::spawn_on::<TestBackend>(job, Default::default()).unwrap();
        let events: Vec<TrainerEvent> = handle.events().iter().collect();

        assert_eq!(events.last(), Some(&TrainerEvent::Finished(true)));
        assert_eq!(
            events[events.len() - 2],
            TrainerEvent::Log("Training finished successfully!".to_string())
        );
        let finished = events
            .iter()
            .filter(|e| matches!(e, TrainerEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, TrainerEvent::Log(l) if l.starts_with("Epoch 1/1"))));
        assert!(dir.path().join("weights/smoke_weights.mpk.gz").is_file());

        let runs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].join("metrics.csv").is_file());
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = tiny_job(dir.path(), 1);
        job.dataset_dir = dir.path().join("missing");
        let mut lines = Vec::new();

        let handle = TrainerThread::spawn_on::<TestBackend>(job, Default::default()).unwrap();
        let success = handle.wait(|line| lines.push(line.to_string()));

        assert!(!success);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Training failed: "), "{}", lines[0]);
    }
}
