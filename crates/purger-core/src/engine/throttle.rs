//! Ad throttle: decides whether the next reveal is replaced by an ad pause.

/// Default number of counted reveals between two ads.
pub const DEFAULT_AD_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    Reveal,
    Pause,
}

/// Counts reveals that follow a decision.
///
/// The counter always stays in `0..threshold`: it is reset the moment a pause
/// is emitted, so the retry after the dismissal starts from zero.
#[derive(Debug, Clone)]
pub struct AdThrottle {
    threshold: u32,
    counter: u32,
}

impl AdThrottle {
    /// `threshold` of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counter: 0,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Count one reveal. Ad-free users bypass the throttle and the counter.
    pub fn on_reveal(&mut self, ad_free: bool) -> ThrottleVerdict {
        if ad_free {
            return ThrottleVerdict::Reveal;
        }
        self.counter += 1;
        if self.counter >= self.threshold {
            self.counter = 0;
            ThrottleVerdict::Pause
        } else {
            ThrottleVerdict::Reveal
        }
    }
}

impl Default for AdThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_AD_THRESHOLD)
    }
}
