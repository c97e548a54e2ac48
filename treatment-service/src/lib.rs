pub mod api;
pub mod assignment;
pub mod cache;
pub mod config;
pub mod consumer;
pub mod matching;
pub mod request_handler;
pub mod router;
pub mod segmenters;
pub mod selection;
pub mod server;
pub mod time;
