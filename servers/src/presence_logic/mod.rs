pub mod config;
pub mod logger;
pub mod transport;
pub mod web;
pub mod xsrf;
