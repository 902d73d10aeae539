pub mod cache;
pub mod cache_store;
pub mod config;
pub mod logging;
pub mod menu;
pub mod model;
pub mod report;
pub mod runtime;
pub mod search;
pub mod selection;
pub mod session;
pub mod session_lock;
