pub mod config;
pub mod filewatcher;
pub mod http;
pub mod metrics;
pub mod tester;
pub mod validation;
