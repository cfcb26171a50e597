//! Scroll tracking for the table of contents
//!
//! A [`HeadingObserver`] watches the headings of one loaded article. The
//! rendering side reports how much of each heading is visible in the content
//! viewport; the most recent heading reported at or above the threshold
//! becomes the single active navigation entry. The viewer owns exactly one
//! observer per content load and disconnects it before the next load, so
//! reports about headings from a previous article are never applied.

use std::collections::HashSet;

/// Fraction of a heading that must be visible for it to become active
pub const DEFAULT_THRESHOLD: f64 = 0.3;

/// Visibility report for one heading
#[derive(Debug, Clone, PartialEq)]
pub struct Visibility {
    /// Id of the heading element
    pub id: String,
    /// Visible fraction of the heading, 0.0-1.0
    pub ratio: f64,
}

impl Visibility {
    pub fn new(id: impl Into<String>, ratio: f64) -> Self {
        Self {
            id: id.into(),
            ratio,
        }
    }
}

/// Tracks which heading is the active navigation entry
#[derive(Debug)]
pub struct HeadingObserver {
    threshold: f64,
    observed: HashSet<String>,
    active: Option<String>,
    connected: bool,
}

impl HeadingObserver {
    /// Start observing the given heading ids
    pub fn observe<I, S>(ids: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let observed: HashSet<String> = ids.into_iter().map(Into::into).collect();
        log::debug!("Observing {} headings", observed.len());
        Self {
            threshold,
            observed,
            active: None,
            connected: true,
        }
    }

    pub fn is_observing(&self, id: &str) -> bool {
        self.connected && self.observed.contains(id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Apply a batch of visibility reports in order
    ///
    /// Returns the active heading id after the batch.
    pub fn report(&mut self, entries: &[Visibility]) -> Option<&str> {
        for entry in entries {
            if !self.is_observing(&entry.id) {
                log::debug!("Ignoring visibility report for unobserved heading '{}'", entry.id);
                continue;
            }
            if entry.ratio > 0.0 && entry.ratio >= self.threshold {
                self.active = Some(entry.id.clone());
            }
        }
        self.active()
    }

    /// Currently active heading id
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Stop observing; later reports are ignored
    pub fn disconnect(&mut self) {
        if self.connected {
            log::debug!("Disconnecting observer over {} headings", self.observed.len());
        }
        self.connected = false;
        self.observed.clear();
        self.active = None;
    }
}

impl Drop for HeadingObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}
