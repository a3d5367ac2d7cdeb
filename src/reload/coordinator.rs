// ABOUTME: Single-slot coalescing state machine serializing execution swaps
// Idle -> Swapping -> Swapping+Queued; only the newest queued snapshot survives

use crate::models::SourceSnapshot;
use std::mem;
use tracing::{debug, warn};

/// A swap the caller must start. The sequence number identifies its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTicket {
    pub seq: u64,
    pub snapshot: SourceSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReloadState {
    #[default]
    Idle,
    Swapping {
        current: SwapTicket,
    },
    SwappingQueued {
        current: SwapTicket,
        queued: SourceSnapshot,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub submitted: u64,
    pub started: u64,
    pub discarded: u64,
    pub stale_completions: u64,
}

#[derive(Debug, Default)]
pub struct ReloadCoordinator {
    state: ReloadState,
    next_seq: u64,
    stats: CoordinatorStats,
}

impl ReloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReloadState {
        &self.state
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ReloadState::Idle)
    }

    /// Sequence number of the swap currently in flight
    pub fn in_flight(&self) -> Option<u64> {
        match &self.state {
            ReloadState::Idle => None,
            ReloadState::Swapping { current } | ReloadState::SwappingQueued { current, .. } => {
                Some(current.seq)
            }
        }
    }

    /// Admit a snapshot. Returns a ticket when a swap must start right away.
    pub fn submit(&mut self, snapshot: SourceSnapshot) -> Option<SwapTicket> {
        self.stats.submitted += 1;
        match mem::take(&mut self.state) {
            ReloadState::Idle => {
                let ticket = self.issue(snapshot);
                self.state = ReloadState::Swapping {
                    current: ticket.clone(),
                };
                Some(ticket)
            }
            ReloadState::Swapping { current } => {
                debug!("Swap {} in flight, queueing snapshot", current.seq);
                self.state = ReloadState::SwappingQueued {
                    current,
                    queued: snapshot,
                };
                None
            }
            ReloadState::SwappingQueued { current, .. } => {
                debug!("Swap {} in flight, replacing queued snapshot", current.seq);
                self.stats.discarded += 1;
                self.state = ReloadState::SwappingQueued {
                    current,
                    queued: snapshot,
                };
                None
            }
        }
    }

    /// Handle a swap-complete signal. Returns the follow-up swap if one was queued.
    ///
    /// Completions that do not belong to the in-flight swap are ignored.
    pub fn complete(&mut self, seq: u64) -> Option<SwapTicket> {
        if self.in_flight() != Some(seq) {
            warn!(
                "Ignoring stale swap completion {} (in flight: {:?})",
                seq,
                self.in_flight()
            );
            self.stats.stale_completions += 1;
            return None;
        }

        match mem::take(&mut self.state) {
            ReloadState::SwappingQueued { queued, .. } => {
                let ticket = self.issue(queued);
                self.state = ReloadState::Swapping {
                    current: ticket.clone(),
                };
                Some(ticket)
            }
            _ => None,
        }
    }

    /// Drop a queued snapshot without touching the in-flight swap
    pub fn clear_queue(&mut self) -> Option<SourceSnapshot> {
        match mem::take(&mut self.state) {
            ReloadState::SwappingQueued { current, queued } => {
                self.stats.discarded += 1;
                self.state = ReloadState::Swapping { current };
                Some(queued)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    fn issue(&mut self, snapshot: SourceSnapshot) -> SwapTicket {
        self.next_seq += 1;
        self.stats.started += 1;
        SwapTicket {
            seq: self.next_seq,
            snapshot,
        }
    }
}
