pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod operations;
pub mod rate_limit;
pub mod recorder;
pub mod rest;
