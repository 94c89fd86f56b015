pub mod enums;
pub mod prescription;
pub mod tracking;

pub use enums::*;
pub use prescription::*;
pub use tracking::*;
