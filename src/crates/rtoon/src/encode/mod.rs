//! TOON encoding module

pub mod encoders;
pub mod folding;
pub mod normalize;
pub mod primitives;
pub mod writer;

pub use encoders::*;
pub use normalize::*;
pub use primitives::*;
pub use writer::*;
