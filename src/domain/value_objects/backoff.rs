use std::time::Duration;

pub const DEFAULT_PHOTO_BACKOFF_SECS: [u64; 5] = [5, 15, 45, 120, 300];

/// Fixed, ordered retry waits indexed by attempt count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffTable {
    steps: Vec<Duration>,
}

impl BackoffTable {
    pub fn new(steps: Vec<Duration>) -> Result<Self, String> {
        if steps.is_empty() {
            return Err("Backoff table cannot be empty".to_string());
        }
        if steps.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err("Backoff table must be non-decreasing".to_string());
        }
        Ok(Self { steps })
    }

    pub fn from_secs(secs: &[u64]) -> Result<Self, String> {
        Self::new(secs.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    /// Wait before the next attempt after `retry_count` failures.
    ///
    /// A count of 0 is treated as 1; counts past the table reuse the last entry.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let attempt = retry_count.max(1) as usize;
        let index = (attempt - 1).min(self.steps.len() - 1);
        self.steps[index]
    }

    pub fn steps(&self) -> &[Duration] {
        &self.steps
    }
}

impl Default for BackoffTable {
    fn default() -> Self {
        Self {
            steps: DEFAULT_PHOTO_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_table_and_caps_at_last_entry() {
        let table = BackoffTable::default();
        assert_eq!(table.backoff_for(0), Duration::from_secs(5));
        assert_eq!(table.backoff_for(1), Duration::from_secs(5));
        assert_eq!(table.backoff_for(2), Duration::from_secs(15));
        assert_eq!(table.backoff_for(4), Duration::from_secs(120));
        assert_eq!(table.backoff_for(5), Duration::from_secs(300));
        assert_eq!(table.backoff_for(50), Duration::from_secs(300));
    }

    #[test]
    fn consecutive_failures_never_shorten_the_wait() {
        let table = BackoffTable::default();
        let waits: Vec<_> = (1..=12).map(|n| table.backoff_for(n)).collect();
        assert!(waits.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(waits.last().copied(), table.steps().last().copied());
    }

    #[test]
    fn rejects_invalid_tables() {
        assert!(BackoffTable::from_secs(&[]).is_err());
        assert!(BackoffTable::from_secs(&[10, 5]).is_err());
        assert!(BackoffTable::from_secs(&[1, 1, 2]).is_ok());
    }
}
