use std::fmt;
use std::time::Duration;

use crate::Selector;

/// A page-state marker the flow waits for before acting.
///
/// The marker is visible text that only appears once the page the next step
/// expects has rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWaypoint {
    pub marker: String,
    pub timeout: Duration,
}

impl PageWaypoint {
    pub fn new(marker: impl Into<String>, timeout: Duration) -> Self {
        Self {
            marker: marker.into(),
            timeout,
        }
    }

    /// Exact-text selector for the marker element
    pub fn selector(&self) -> Selector {
        Selector::Text(self.marker.clone())
    }
}

impl fmt::Display for PageWaypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (within {:?})", self.marker, self.timeout)
    }
}
