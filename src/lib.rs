//! Translation helps server.
//!
//! Serves Bible text, translation notes, questions, word links, dictionary
//! articles and training modules published as zip archives in a
//! Door43-style content catalog. Archives are downloaded once and kept in
//! an in-memory cache; concurrent requests for the same archive share one
//! download. Requests may span several publishing organizations.
//!
//! Two surfaces sit on the [`fetcher::UnifiedFetcher`]: a REST API
//! ([`rest`]) and an MCP server over stdio or HTTP ([`server`]). Both
//! report cache activity per request through the [`trace`] module.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod handlers;
pub mod protocol;
pub mod reference;
pub mod resolver;
pub mod rest;
pub mod schema;
pub mod server;
pub mod testing;
pub mod trace;
