pub mod cache;
pub mod endpoint;
pub mod errors;
pub mod executor;
pub mod graphql;
pub mod server;
pub mod tools;
