use crate::prelude::*;
use anyhow::anyhow;
use tracing_subscriber::{fmt, util::SubscriberInitExt};

pub fn set_logging(level: tracing::Level) -> Result<()> {
    match fmt().with_max_level(level).with_target(false).finish().try_init() {
        Ok(()) => {
            tracing::debug!("Logging at {} level", level);
            Ok(())
        }
        Err(e) => Err(anyhow!("Failed to install tracing subscriber: {}", e)),
    }
}
