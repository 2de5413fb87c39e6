/// Deferred cleanup keyed by GPU completion tokens
///
/// Each submission gets a monotonically increasing token. Cleanup registered
/// against a token runs once that token (or a later one) is known complete.
/// Submissions on one queue signal in submission order, so "complete through
/// token N" retires everything queued at or before N.

use std::collections::VecDeque;
use std::fmt;

/// Action run when its token retires
pub type RetireAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct RetireQueue {
    pending: VecDeque<(u64, RetireAction)>,
}

impl fmt::Debug for RetireQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetireQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl RetireQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to run once `token` completes
    ///
    /// Tokens must be pushed in non-decreasing order.
    pub fn push(&mut self, token: u64, action: RetireAction) {
        debug_assert!(self.pending.back().map_or(true, |(last, _)| *last <= token));
        self.pending.push_back((token, action));
    }

    /// Run every action whose token is `<= completed`, returning how many ran
    pub fn retire_through(&mut self, completed: u64) -> usize {
        let mut retired = 0;
        while self.pending.front().is_some_and(|(token, _)| *token <= completed) {
            if let Some((_, action)) = self.pending.pop_front() {
                action();
                retired += 1;
            }
        }
        retired
    }

    /// Run everything (device idle)
    pub fn retire_all(&mut self) -> usize {
        self.retire_through(u64::MAX)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
