//! ReviewSession - 1 か月分のレビュー状態機械
//!
//! I/O を一切持たない純粋な状態機械です。各操作は「次に何を見せるか」を
//! `Advance` として返し、実際の取得やキャッシュ操作は owner が行います。
//!
//! # 不変条件
//! - Reviewing 中は `cursor == decisions.len()`（表示中のアセットはまだ未判定）
//! - decision 直後と AdPause 中は `cursor == decisions.len() - 1`
//! - Exhausted では `cursor == bucket.len()`
//! - `pending_delete` は Delete を付けた順に並び、重複しない
//! - AdPause は decision のスロットを消費しない
//!
//! 月を選び直すときは新しい `ReviewSession` を作ります（既存のものは捨てる）。

use crate::domain::{
    AssetRef, Decision, MonthBucket, MonthKey, Position, RejectReason, ReviewError, SessionState,
};

use super::throttle::{AdThrottle, ThrottleVerdict};

/// The asset the caller should now show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub index: usize,
    pub asset: AssetRef,
}

/// Result of an advance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Reveal(Reveal),
    /// An interstitial replaces the reveal. The cursor stays on the last
    /// decided asset until the ad is dismissed.
    AdPause,
    /// Every asset has a decision; hand off to deletion.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
    bucket: MonthBucket,
    cursor: isize,
    decisions: Vec<Decision>,
    pending_delete: Vec<AssetRef>,
    throttle: AdThrottle,
    state: SessionState,
}

impl ReviewSession {
    /// Open a bucket and perform the opening reveal.
    ///
    /// The opening reveal is not counted by the throttle.
    pub fn start(bucket: MonthBucket, ad_threshold: u32) -> (Self, Advance) {
        let mut session = Self {
            bucket,
            cursor: -1,
            decisions: Vec::new(),
            pending_delete: Vec::new(),
            throttle: AdThrottle::new(ad_threshold),
            state: SessionState::Reviewing,
        };
        let advance = session.step_forward();
        (session, advance)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn month(&self) -> MonthKey {
        self.bucket.month()
    }

    pub fn bucket(&self) -> &MonthBucket {
        &self.bucket
    }

    /// -1 before the opening reveal.
    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn pending_delete(&self) -> &[AssetRef] {
        &self.pending_delete
    }

    pub fn ad_counter(&self) -> u32 {
        self.throttle.counter()
    }

    /// The asset on screen while Reviewing.
    pub fn current(&self) -> Option<Reveal> {
        if self.state != SessionState::Reviewing {
            return None;
        }
        let index = usize::try_from(self.cursor).ok()?;
        self.bucket.get(index).map(|asset| Reveal {
            index,
            asset: asset.clone(),
        })
    }

    /// 1-based position for display, `None` for an empty bucket.
    pub fn position(&self) -> Option<Position> {
        let total = self.bucket.len();
        if total == 0 || self.cursor < 0 {
            return None;
        }
        let index = (self.cursor as usize + 1).min(total);
        Some(Position { index, total })
    }

    pub fn undo_available(&self) -> bool {
        !self.decisions.is_empty() && self.state != SessionState::AdPause
    }

    pub fn keep(&mut self, ad_free: bool) -> Result<Advance, ReviewError> {
        self.decide(Decision::Keep, ad_free)
    }

    pub fn delete(&mut self, ad_free: bool) -> Result<Advance, ReviewError> {
        self.decide(Decision::Delete, ad_free)
    }

    fn decide(&mut self, decision: Decision, ad_free: bool) -> Result<Advance, ReviewError> {
        self.ensure_reviewing()?;
        let Some(asset) = self.bucket.get(self.decisions.len()).cloned() else {
            return Err(ReviewError::Rejected(RejectReason::Exhausted));
        };

        self.decisions.push(decision);
        if decision.is_delete() && !self.pending_delete.contains(&asset) {
            self.pending_delete.push(asset);
        }

        // decision 直後のみカウントする
        if self.throttle.on_reveal(ad_free) == ThrottleVerdict::Pause {
            self.state = SessionState::AdPause;
            return Ok(Advance::AdPause);
        }
        Ok(self.step_forward())
    }

    /// Err with the reason a decision would be refused right now.
    pub fn ensure_reviewing(&self) -> Result<(), ReviewError> {
        match self.state {
            SessionState::Reviewing => Ok(()),
            SessionState::AdPause => Err(ReviewError::Rejected(RejectReason::AdOnScreen)),
            SessionState::Exhausted => Err(ReviewError::Rejected(RejectReason::Exhausted)),
            SessionState::Idle => Err(ReviewError::Rejected(RejectReason::NoMonthSelected)),
        }
    }

    /// Move the cursor one step and report what is there.
    fn step_forward(&mut self) -> Advance {
        self.cursor += 1;
        match self.bucket.get(self.cursor as usize) {
            Some(asset) => {
                self.state = SessionState::Reviewing;
                Advance::Reveal(Reveal {
                    index: self.cursor as usize,
                    asset: asset.clone(),
                })
            }
            None => {
                self.cursor = self.bucket.len() as isize;
                self.state = SessionState::Exhausted;
                Advance::Exhausted
            }
        }
    }

    /// Retract the most recent decision and re-reveal its asset.
    ///
    /// `Ok(None)` when there is nothing to undo. Undo never lands on an ad:
    /// it goes straight back to the previous asset and leaves the throttle
    /// counter alone.
    pub fn undo(&mut self) -> Result<Option<Reveal>, ReviewError> {
        match self.state {
            SessionState::Reviewing | SessionState::Exhausted => {}
            SessionState::AdPause => return Err(ReviewError::Rejected(RejectReason::AdOnScreen)),
            SessionState::Idle => {
                return Err(ReviewError::Rejected(RejectReason::NoMonthSelected));
            }
        }

        let Some(decision) = self.decisions.pop() else {
            return Ok(None);
        };
        let index = self.decisions.len();
        let Some(asset) = self.bucket.get(index).cloned() else {
            return Ok(None);
        };
        if decision.is_delete() {
            self.pending_delete.retain(|a| a != &asset);
        }

        self.cursor = index as isize;
        self.state = SessionState::Reviewing;
        Ok(Some(Reveal { index, asset }))
    }

    /// Resume after the interstitial went away.
    ///
    /// Returns `None` outside AdPause. The retry is not counted, so it can
    /// never produce a second pause.
    pub fn ad_dismissed(&mut self) -> Option<Advance> {
        if self.state != SessionState::AdPause {
            return None;
        }
        Some(self.step_forward())
    }

    /// The deletion for this month reached a terminal result.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
    }
}
