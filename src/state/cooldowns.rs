use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Last-action timestamps (epoch millis) per normalized user, in memory only
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_action: DashMap<String, i64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an action at `now` unless one happened within `window_ms`.
    ///
    /// Check and update happen under the same shard lock. On rejection the
    /// stored timestamp is left alone and the remaining wait is returned.
    pub fn try_acquire(&self, user: &str, now: i64, window_ms: u64) -> Result<(), u64> {
        match self.last_action.entry(user.to_string()) {
            Entry::Occupied(mut entry) => {
                let remaining = remaining_ms(*entry.get(), now, window_ms);
                if remaining > 0 {
                    return Err(remaining);
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn last_action(&self, user: &str) -> Option<i64> {
        self.last_action.get(user).map(|r| *r)
    }

    /// Drop entries whose window has long passed
    pub fn prune(&self, now: i64, window_ms: u64) {
        self.last_action.retain(|_, last| remaining_ms(*last, now, window_ms) > 0);
    }

    pub fn len(&self) -> usize {
        self.last_action.len()
    }
}

fn remaining_ms(last: i64, now: i64, window_ms: u64) -> u64 {
    let elapsed = now.saturating_sub(last).max(0) as u64;
    window_ms.saturating_sub(elapsed)
}
