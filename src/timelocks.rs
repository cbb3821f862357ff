use near_sdk::{env, near, BlockHeight};

/// Current ledger time. Order timelocks are measured in blocks.
pub fn current_height() -> BlockHeight {
    env::block_height()
}

/// Creation height of an order together with the number of blocks after which
/// it can be refunded without the redeemer's consent.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timelock {
    pub initiated_at: BlockHeight,
    pub duration: u64,
}

impl Timelock {
    pub fn new(initiated_at: BlockHeight, duration: u64) -> Self {
        Self {
            initiated_at,
            duration,
        }
    }

    /// First block at which `refund` is accepted.
    pub fn expires_at(&self) -> BlockHeight {
        self.initiated_at.saturating_add(self.duration)
    }

    pub fn has_expired(&self, now: BlockHeight) -> bool {
        now >= self.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive() {
        let lock = Timelock::new(100, 7200);
        assert_eq!(lock.expires_at(), 7300);
        assert!(!lock.has_expired(100));
        assert!(!lock.has_expired(7299));
        assert!(lock.has_expired(7300));
        assert!(lock.has_expired(10_000));
    }

    #[test]
    fn huge_duration_never_wraps() {
        let lock = Timelock::new(5, u64::MAX);
        assert_eq!(lock.expires_at(), u64::MAX);
        assert!(!lock.has_expired(u64::MAX - 1));
    }
}
