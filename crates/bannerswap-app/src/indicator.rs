//! Loading indicators with bounded lifetimes.
//!
//! An indicator is shown while a decode or render is outstanding. Each one
//! carries a deadline; once it passes the indicator is taken down even if
//! the work never reports back.

use bannerswap_core::Timeouts;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Operations that show a loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingOperation {
    ImageLoad,
    PdfLoad,
    PageRender,
    BannerLoad,
}

impl LoadingOperation {
    /// How long the indicator may stay up.
    pub fn timeout(self, timeouts: &Timeouts) -> Duration {
        match self {
            LoadingOperation::ImageLoad => timeouts.image_load(),
            LoadingOperation::PdfLoad => timeouts.pdf_load(),
            LoadingOperation::PageRender => timeouts.page_render(),
            LoadingOperation::BannerLoad => timeouts.banner_load(),
        }
    }
}

/// An indicator was taken down by its deadline rather than by completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation:?} did not finish within {limit:?}")]
pub struct RenderTimeout {
    pub operation: LoadingOperation,
    pub generation: u64,
    pub limit: Duration,
}

/// A visible loading indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingIndicator {
    pub operation: LoadingOperation,
    /// Load generation that raised the indicator.
    pub generation: u64,
    pub shown_at: Instant,
    pub deadline: Instant,
}

/// Holds at most one indicator. Showing a new one replaces the old.
#[derive(Debug, Default)]
pub struct IndicatorSlot {
    current: Option<LoadingIndicator>,
}

impl IndicatorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&LoadingIndicator> {
        self.current.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    /// Show an indicator for `operation`, replacing any other.
    pub fn show(&mut self, operation: LoadingOperation, generation: u64, now: Instant, timeouts: &Timeouts) {
        self.current = Some(LoadingIndicator {
            operation,
            generation,
            shown_at: now,
            deadline: now + operation.timeout(timeouts),
        });
    }

    /// Take down the indicator if it belongs to `generation`.
    pub fn clear_for(&mut self, generation: u64) -> bool {
        if self.current.as_ref().is_some_and(|i| i.generation == generation) {
            self.current = None;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Take down the indicator if its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<RenderTimeout> {
        let indicator = self.current.as_ref()?;
        if now < indicator.deadline {
            return None;
        }
        let timeout = RenderTimeout {
            operation: indicator.operation,
            generation: indicator.generation,
            limit: indicator.deadline - indicator.shown_at,
        };
        self.current = None;
        Some(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_per_operation() {
        let timeouts = Timeouts::default();
        assert_eq!(LoadingOperation::ImageLoad.timeout(&timeouts), Duration::from_secs(10));
        assert_eq!(LoadingOperation::PdfLoad.timeout(&timeouts), Duration::from_secs(15));
        assert_eq!(LoadingOperation::PageRender.timeout(&timeouts), Duration::from_secs(10));
        assert_eq!(LoadingOperation::BannerLoad.timeout(&timeouts), Duration::from_secs(8));
    }

    #[test]
    fn test_show_replaces() {
        let now = Instant::now();
        let mut slot = IndicatorSlot::new();
        slot.show(LoadingOperation::ImageLoad, 1, now, &Timeouts::default());
        slot.show(LoadingOperation::PdfLoad, 2, now, &Timeouts::default());
        let current = slot.current().unwrap();
        assert_eq!(current.operation, LoadingOperation::PdfLoad);
        assert_eq!(current.generation, 2);
    }

    #[test]
    fn test_clear_for_ignores_other_generations() {
        let mut slot = IndicatorSlot::new();
        slot.show(LoadingOperation::ImageLoad, 2, Instant::now(), &Timeouts::default());
        assert!(!slot.clear_for(1));
        assert!(slot.is_visible());
        assert!(slot.clear_for(2));
        assert!(!slot.is_visible());
    }

    #[test]
    fn test_expire_after_deadline() {
        let now = Instant::now();
        let mut slot = IndicatorSlot::new();
        slot.show(LoadingOperation::BannerLoad, 3, now, &Timeouts::default());
        assert_eq!(slot.expire(now + Duration::from_secs(7)), None);
        assert!(slot.is_visible());

        let timeout = slot.expire(now + Duration::from_secs(8)).unwrap();
        assert_eq!(timeout.operation, LoadingOperation::BannerLoad);
        assert_eq!(timeout.limit, Duration::from_secs(8));
        assert!(!slot.is_visible());
        assert_eq!(slot.expire(now + Duration::from_secs(60)), None);
    }
}
