pub mod api;
pub mod format;
pub mod store;
pub mod types;
pub mod websocket;
