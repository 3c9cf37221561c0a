//! Services that sit at the edges of the pipeline
//!
//! Image I/O and progress reporting are kept apart from the numeric core so
//! frontends can swap them out.

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
