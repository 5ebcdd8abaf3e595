//! External view counting
//!
//! The embedding layer reports how many views (windows, tabs, handles) show a
//! session. When the count drops back to zero an auto-disconnecting session
//! closes itself.

use parking_lot::Mutex;

/// What a release did to the count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Views remain
    Remaining(usize),
    /// The last view went away
    LastReleased,
    /// Nothing was retained
    Untracked,
}

/// Reference count of external views
#[derive(Debug, Default)]
pub struct ViewCounter {
    count: Mutex<usize>,
}

impl ViewCounter {
    /// Start with no views
    pub fn new() -> Self {
        Self::default()
    }

    /// One more view; returns the new count
    pub fn retain(&self) -> usize {
        let mut count = self.count.lock();
        *count += 1;
        *count
    }

    /// One view fewer
    pub fn release(&self) -> Release {
        let mut count = self.count.lock();
        match *count {
            0 => Release::Untracked,
            1 => {
                *count = 0;
                Release::LastReleased
            }
            n => {
                *count = n - 1;
                Release::Remaining(n - 1)
            }
        }
    }

    /// Current count
    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}
