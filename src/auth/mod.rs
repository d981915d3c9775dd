pub mod sigv4;

pub use sigv4::*;
