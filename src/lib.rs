//! testprof core library: per-test call-graph capture, infrastructure-noise
//! filtering and artifact persistence.

mod artifact;
mod collection;
mod config;
mod error;
mod filter;
mod fsutil;
mod listener;
mod metadata;
mod profile;
mod sample;
mod sampler;

pub use artifact::*;
pub use collection::*;
pub use config::*;
pub use error::*;
pub use filter::*;
pub use fsutil::*;
pub use listener::*;
pub use metadata::*;
pub use profile::*;
pub use sample::*;
pub use sampler::*;
