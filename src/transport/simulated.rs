//! Simulated transport for development and demos.
//!
//! Pushes randomized progress on a tick interval and resolves according to a
//! configured success rate. Tests use scripted fakes instead.

use super::{ProgressFn, Transport, TransportError};
use crate::common::task::FileRef;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

const DEFAULT_SUCCESS_RATE: f64 = 0.9;
const DEFAULT_TICK: Duration = Duration::from_millis(200);

pub struct SimulatedTransport {
    success_rate: f64,
    tick: Duration,
}

impl SimulatedTransport {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(success_rate: f64, tick: Duration) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            tick,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_RATE)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn upload(
        &self,
        file: &FileRef,
        on_progress: ProgressFn,
    ) -> Result<(), TransportError> {
        tracing::debug!("Simulating upload of {}", file.name);

        let mut progress = 0.0_f64;
        let mut last_reported = 0u8;

        loop {
            tokio::time::sleep(self.tick).await;

            progress += rand::thread_rng().gen_range(5.0..30.0);
            if progress >= 100.0 {
                break;
            }

            // Keep reports strictly increasing
            let percent = progress as u8;
            if percent > last_reported {
                last_reported = percent;
                on_progress(percent);
            }
        }

        if rand::thread_rng().gen_bool(self.success_rate) {
            Ok(())
        } else {
            Err(TransportError::NetworkFailure)
        }
    }
}
