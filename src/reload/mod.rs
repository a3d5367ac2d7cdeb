// ABOUTME: Reload coordination - coalesces rapid edits into at most one in-flight swap

pub mod coordinator;

pub use coordinator::{CoordinatorStats, ReloadCoordinator, ReloadState, SwapTicket};
