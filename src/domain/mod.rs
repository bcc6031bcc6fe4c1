pub mod order;
pub mod report;
pub mod sequenced;

pub use order::*;
pub use report::*;
pub use sequenced::*;
