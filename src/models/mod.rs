// ABOUTME: Core data models shared by the sandbox, router and host contexts

pub mod session;
pub mod snapshot;

pub use session::Session;
pub use snapshot::SourceSnapshot;
