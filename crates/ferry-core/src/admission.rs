//! Size-based admission control.
//!
//! # Design
//! - Pure check over the declared size; no I/O, no state.
//! - The channel ceiling is evaluated before the store ceiling so the more
//!   restrictive upstream limit is reported first.
//! - An unknown (absent or zero) size is always admitted.

use crate::error::TransferError;

/// Two-threshold size gate evaluated before any resource is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGate {
    channel_limit: u64,
    store_limit: u64,
}

impl SizeGate {
    /// Build a gate from the channel and store ceilings (in bytes).
    #[must_use]
    pub const fn new(channel_limit: u64, store_limit: u64) -> Self {
        Self {
            channel_limit,
            store_limit,
        }
    }

    /// Ceiling applied by the messaging channel.
    #[must_use]
    pub const fn channel_limit(&self) -> u64 {
        self.channel_limit
    }

    /// Ceiling applied by the remote store.
    #[must_use]
    pub const fn store_limit(&self) -> u64 {
        self.store_limit
    }

    /// Decide whether an object of the declared size may enter the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::TooLargeForChannel`] or
    /// [`TransferError::TooLargeForStore`] when a ceiling is exceeded.
    pub const fn admit(&self, declared: Option<u64>) -> Result<(), TransferError> {
        let size = match declared {
            None | Some(0) => return Ok(()),
            Some(size) => size,
        };
        if size > self.channel_limit {
            return Err(TransferError::TooLargeForChannel {
                size,
                limit: self.channel_limit,
            });
        }
        if size > self.store_limit {
            return Err(TransferError::TooLargeForStore {
                size,
                limit: self.store_limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const CHANNEL: u64 = 2_000 * MIB;
    const STORE: u64 = 5 * 1024 * MIB;

    fn gate() -> SizeGate {
        SizeGate::new(CHANNEL, STORE)
    }

    #[test]
    fn unknown_sizes_are_admitted() {
        assert!(gate().admit(None).is_ok());
        assert!(gate().admit(Some(0)).is_ok());
    }

    #[test]
    fn channel_ceiling_is_inclusive() {
        assert!(gate().admit(Some(CHANNEL)).is_ok());
        assert!(matches!(
            gate().admit(Some(CHANNEL + 1)),
            Err(TransferError::TooLargeForChannel { size, limit })
                if size == CHANNEL + 1 && limit == CHANNEL
        ));
    }

    #[test]
    fn channel_ceiling_reported_before_store_ceiling() {
        assert!(matches!(
            gate().admit(Some(STORE + 1)),
            Err(TransferError::TooLargeForChannel { .. })
        ));
    }

    #[test]
    fn store_ceiling_applies_when_channel_is_larger() {
        let gate = SizeGate::new(10 * 1024 * MIB, STORE);
        assert!(gate.admit(Some(STORE)).is_ok());
        assert!(matches!(
            gate.admit(Some(STORE + 1)),
            Err(TransferError::TooLargeForStore { limit, .. }) if limit == STORE
        ));
    }
}
