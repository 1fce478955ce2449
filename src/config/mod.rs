pub mod compiled;
pub mod errors;
pub mod manager;
pub mod raw;
pub mod resolved;
pub mod resolver;
pub mod resource;
