pub mod providers;
pub mod calendar;
pub mod reconcile;
pub mod storage;

pub use providers::*;
pub use calendar::*;
pub use reconcile::*;
pub use storage::*;
