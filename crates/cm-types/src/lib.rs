pub mod market;
pub mod record;
pub mod errors;

pub use market::*;
pub use record::*;
pub use errors::*;
