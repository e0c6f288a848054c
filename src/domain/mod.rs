pub mod category;
pub mod market;
pub mod signal;

pub use category::*;
pub use market::*;
pub use signal::*;
