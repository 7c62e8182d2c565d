//! Rotating status messages shown while an upload is in flight.
//!
//! The message is a pure function of the stage and of how many narrator
//! intervals have elapsed in that stage. [`drive`] supplies the intervals; the
//! controller owns the token that stops it.

use lectern_core::models::UploadStage;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const PREPARING_MESSAGES: &[&str] = &[
    "Preparing your video...",
    "Checking the file...",
    "Getting everything ready...",
];

const UPLOADING_MESSAGES: &[&str] = &[
    "Uploading your video...",
    "Sending video data...",
    "Still uploading, hang tight...",
    "Large videos take a little longer...",
];

const PROCESSING_MESSAGES: &[&str] = &[
    "Processing your video...",
    "Optimizing for playback...",
    "Finalizing the upload...",
];

/// Status line for `stage` after `elapsed_intervals` narrator ticks.
///
/// Returns `None` outside the in-flight stages.
pub fn narrate(stage: UploadStage, elapsed_intervals: usize) -> Option<&'static str> {
    let messages = match stage {
        UploadStage::Preparing => PREPARING_MESSAGES,
        UploadStage::Uploading => UPLOADING_MESSAGES,
        UploadStage::Processing => PROCESSING_MESSAGES,
        UploadStage::Idle | UploadStage::Complete | UploadStage::Error => return None,
    };
    Some(messages[elapsed_intervals % messages.len()])
}

/// Counts intervals per stage, restarting whenever the stage changes.
#[derive(Debug, Default, Clone)]
pub struct NarratorCursor {
    stage: Option<UploadStage>,
    elapsed: usize,
}

impl NarratorCursor {
    /// Advance by one interval and return the message for `stage`.
    ///
    /// Entering a stage shows its first message, so the first tick seen in a
    /// new stage moves straight to the second one.
    pub fn advance(&mut self, stage: UploadStage) -> Option<&'static str> {
        if self.stage != Some(stage) {
            self.stage = Some(stage);
            self.elapsed = 0;
        }
        self.elapsed += 1;
        narrate(stage, self.elapsed)
    }
}

/// Call `tick` every `period` until `token` is cancelled or `tick` returns false.
///
/// The first call happens one full period after start. Returns the number of
/// ticks delivered. A zero `period` disables rotation and returns at once.
pub async fn drive<F>(period: Duration, token: CancellationToken, mut tick: F) -> usize
where
    F: FnMut() -> bool,
{
    if period.is_zero() {
        tracing::debug!("Narrator interval is zero, status messages will not rotate");
        return 0;
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut delivered = 0;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !tick() {
                    break;
                }
                delivered += 1;
            }
        }
    }
    delivered
}
