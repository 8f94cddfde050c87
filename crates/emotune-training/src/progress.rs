use crate::strategy::TrainingStrategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { strategy: TrainingStrategy, num_epochs: usize },
    Message { message: String },
    EpochFinished { epoch: usize, total: usize, macro_f1: f64, accuracy: f64, elapsed_secs: f64 },
    Finished { epochs: usize },
}

pub trait ProgressSink {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { strategy, num_epochs } => {
                println!("[train:{strategy}] started ({num_epochs} epochs)");
            }
            ProgressEvent::Message { message } => println!("[train] {message}"),
            ProgressEvent::EpochFinished { epoch, total, macro_f1, accuracy, elapsed_secs } => {
                println!(
                    "[train] epoch {epoch}/{total}: f1={macro_f1:.4} accuracy={accuracy:.4} elapsed={elapsed_secs:.1}s"
                );
            }
            ProgressEvent::Finished { epochs } => println!("[train] finished after {epochs} epochs"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
