pub mod api;
pub mod config;
pub mod handlers;
pub mod history;
pub mod orthogonality;
pub mod pagination;
pub mod router;
pub mod server;
pub mod services;
pub mod store;
pub mod validation;
