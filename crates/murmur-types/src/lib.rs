pub mod api;
pub mod events;
