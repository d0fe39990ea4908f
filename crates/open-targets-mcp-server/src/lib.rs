pub mod batch;
pub mod errors;
pub mod graphql;
pub(crate) mod json_schema;
pub mod projection;
pub mod resolve;
pub mod runtime;
pub mod server;
pub mod tools;
