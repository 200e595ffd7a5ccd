pub mod api;
pub mod capability;
pub mod error;
pub mod model;
pub mod quality;
pub mod store;
