pub mod common;
pub mod pipeline;
pub mod requests;
pub mod responses;

pub use common::*;
pub use pipeline::*;
pub use requests::*;
pub use responses::*;
