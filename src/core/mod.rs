pub mod errors;
mod loc;
mod output;
mod report;

pub use loc::SourceLocation;
pub use output::CaptureOutput;
pub use report::{CaptureReports, LogReporter, Reporter};
