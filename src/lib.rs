//! SocialSKK - An SKK dictionary server backed by Social IME
//!
//! Answers SKK conversion requests by querying a remote kana-to-kanji API,
//! caching every answer (including failures) for a configurable time.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod lookup;
pub mod server;

pub use config::{Cli, Config};
pub use error::{Result, SkkError};
pub use lookup::LookupService;
pub use server::Server;
