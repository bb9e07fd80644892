/*
[INPUT]:  Provider selectors, channel names, credentials
[OUTPUT]: Typed Rust structs/enums shared across layers
[POS]:    Data layer - type definitions
[UPDATE]: When domain types are added
*/

pub mod enums;
pub mod models;

pub use enums::*;
pub use models::*;
