pub mod contract;
pub mod greeks;
pub mod pricing;
pub mod returns;

pub use contract::*;
pub use greeks::*;
pub use pricing::*;
pub use returns::*;
