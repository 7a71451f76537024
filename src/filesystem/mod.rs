//! Source scanning and destination management

pub mod destination;
pub mod scanner;

pub use destination::DestinationManager;
pub use scanner::FileScanner;
