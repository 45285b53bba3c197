pub mod layout;
pub mod manifest;
pub mod templates;
pub mod writer;

pub use layout::*;
pub use manifest::*;
pub use writer::*;
