use crate::config::Config;
use crate::error::Result;
use crate::services::{DispatchGate, GesturePipeline};
use std::sync::Arc;

/// Trait for trackpad listeners that can run in different modes
#[async_trait::async_trait]
pub trait TrackpadListenerTrait {
    /// Run the listener until the frame source fails
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate trackpad listener based on the dry_run flag.
/// Every frame source gets its own pipeline; the dispatch gate is shared.
pub fn create_trackpad_listener(
    config: Arc<Config>,
    gate: Arc<DispatchGate>,
    dry_run: bool,
) -> Result<Box<dyn TrackpadListenerTrait + Send>> {
    if dry_run {
        let pipeline = GesturePipeline::new(&config, gate);
        Ok(Box::new(
            super::dry_trackpad_listener::DryRunTrackpadListener::new(pipeline)?,
        ))
    } else {
        Ok(Box::new(super::trackpad_listener::RealTrackpadListener::new(
            config, gate,
        )?))
    }
}
