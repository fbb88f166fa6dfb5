use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use super::collection::TrackedSample;

pub mod module;
pub mod recorder;

/// Represents collector of records. This module is responsible for receiving samples and saving
/// them using various means. A sample that fails to process is logged and dropped.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<TrackedSample>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<TrackedSample>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(record) = self.receiver.recv().await {
            debug!("Processing event {:?}", record);
            let app = record.sample.app_name.clone();
            match self.processor.process_next(record).await {
                Ok(_) => {
                    info!("Processed sample of {app}")
                }
                Err(e) => {
                    error!("Error processing sample of {app}: {e:?}")
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
