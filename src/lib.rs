//! feedrace: fetch RSS/Atom feeds through unreliable network paths.
//!
//! - [`feed`] - the fetch/parse/race/cache engine
//! - [`refresh`] - batch refresh and article merging on top of the engine
//! - [`config`] - endpoints, timeouts and cache sizing
//! - [`util`] - URL normalization

pub mod config;
pub mod feed;
pub mod refresh;
pub mod util;
