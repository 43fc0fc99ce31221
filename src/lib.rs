pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod resources;
pub mod shared;
pub mod workflows;

pub use error::CrmError;
