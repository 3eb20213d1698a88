// Carrier Relay - Library root for testing

pub mod auth;
pub mod carrier;
pub mod config;
pub mod converters;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod slack;
pub mod store;
