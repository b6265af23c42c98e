pub mod builder;
pub mod errors;
pub mod factory;
pub mod service;
pub mod types;

pub use factory::AppFactory;
