//! Chain timing parameters.

use crate::source::DataSource;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Chain parameters needed to turn slots into wall-clock time. Fetched once
/// and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub genesis_time: u64,
    pub seconds_per_slot: u64,
}

impl ChainConfig {
    #[must_use]
    pub const fn new(genesis_time: u64, seconds_per_slot: u64) -> Self {
        Self {
            genesis_time,
            seconds_per_slot,
        }
    }

    /// Read the parameters from a data source.
    ///
    /// # Errors
    /// Propagates the source's error.
    pub async fn fetch<S: DataSource>(source: &S) -> Result<Self, S::Error> {
        let (genesis_time, seconds_per_slot) =
            tokio::try_join!(source.genesis_time(), source.seconds_per_slot())?;
        info!(genesis_time, seconds_per_slot, "Loaded chain config");
        Ok(Self::new(genesis_time, seconds_per_slot))
    }

    /// Unix timestamp of `slot`, or `None` if it does not fit in a u64.
    #[must_use]
    pub fn slot_timestamp(&self, slot: u64) -> Option<u64> {
        slot.checked_mul(self.seconds_per_slot)?
            .checked_add(self.genesis_time)
    }
}
