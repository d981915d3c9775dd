pub mod bucket;
pub mod quota;
pub mod usage;
pub mod user;

pub use bucket::*;
pub use quota::*;
pub use usage::*;
pub use user::*;
