//! Lifecycle subsystem: shutdown signalling and the background sweep task.

pub mod shutdown;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use sweeper::Sweeper;
