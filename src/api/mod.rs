pub mod openapi;

pub use openapi::build_openapi;
