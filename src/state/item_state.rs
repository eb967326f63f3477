/// Item lifecycle definitions for tracking one episode through a worker
///
/// This module defines the states a worker drives an item through and which transitions
/// between them are legal.
use std::fmt;

/// Represents the current state of an item inside its worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item is assigned to a worker slot but not yet started
    Pending,

    /// Checking the dedup store
    DedupCheck,

    /// Renderer is loading the item URL
    Navigating,

    /// Waiting for the content marker to appear
    WaitingContent,

    /// An interstitial verification gate is showing
    GateWait,

    /// Paging down so lazy content loads
    Scrolling,

    /// Parsing the rendered document
    Extracting,

    /// Downloading assets
    FetchingAssets,

    // ===== Terminal States =====
    /// Assets downloaded and the item recorded as done
    Succeeded,

    /// Item failed; eligible for a retry on a future run
    Failed,

    /// Item was not processed (already done, no content section, or cancelled)
    Skipped,
}

impl ItemState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if this is an active state (item may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` follows the worker's state machine
    ///
    /// Any active state may end in `Failed` or `Skipped`; only asset fetching ends in
    /// `Succeeded`. The gate wait is optional, so content waiting may go straight to scrolling.
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Skipped) {
            return true;
        }

        matches!(
            (self, next),
            (Pending, DedupCheck)
                | (DedupCheck, Navigating)
                | (Navigating, WaitingContent)
                | (WaitingContent, GateWait)
                | (WaitingContent, Scrolling)
                | (GateWait, Scrolling)
                | (Scrolling, Extracting)
                | (Extracting, FetchingAssets)
                | (FetchingAssets, Succeeded)
        )
    }

    /// Short lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DedupCheck => "dedup_check",
            Self::Navigating => "navigating",
            Self::WaitingContent => "waiting_content",
            Self::GateWait => "gate_wait",
            Self::Scrolling => "scrolling",
            Self::Extracting => "extracting",
            Self::FetchingAssets => "fetching_assets",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
