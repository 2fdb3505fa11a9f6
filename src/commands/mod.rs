//! CLI commands implementation

pub mod analyze;
pub mod crawl;
pub mod init;
pub mod tick;

pub use analyze::*;
pub use crawl::*;
pub use init::*;
pub use tick::*;
