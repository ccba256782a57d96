pub mod classify;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod ticketmaster;
