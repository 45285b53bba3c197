pub mod api;
pub mod tracker;
