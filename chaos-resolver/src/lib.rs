pub mod config;
pub mod download;
pub mod events;
pub mod lyrics;
pub mod music;
pub mod resolve;

pub use config::ResolverConfig;
pub use resolve::error::ResolveError;
pub use resolve::{ResolveOptions, Resolver, TriedSources};
