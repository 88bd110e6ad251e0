pub mod input;

pub use input::{InteractiveReader, LineReader, PipedReader, ReadOutcome};
