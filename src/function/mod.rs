pub mod color;
pub mod convert;
pub mod cubemap;

pub use color::*;
pub use convert::*;
pub use cubemap::*;
