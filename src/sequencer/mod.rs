pub mod allocator;
pub mod registry;

pub use allocator::{AccountSequencer, InitialSequences};
pub use registry::{load_initial_sequences, SubmissionRegistry};
