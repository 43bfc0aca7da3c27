pub mod audit;
pub mod cleaner;
pub mod cli;
pub mod clock;
pub mod config;
pub mod layout;
pub mod scanner;
pub mod utils;

// Re-export commonly used types
pub use cleaner::{CleanOptions, CleanOutcome, TemporaryCleaner};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use layout::DirectoryLayout;
pub use scanner::{Entry, FileEntry, FileMeta, ScanResult, Scanner};
