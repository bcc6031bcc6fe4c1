pub mod account_query;
pub mod translator;

pub use account_query::*;
pub use translator::{has_live_check, translate_filter, translate_range};
