//! Data pipeline behind a personal academic site: publications merged from a curated file and
//! PubMed, a review ledger for them, a blog store with an admin mode, and persisted preferences.

pub mod blog;
pub mod config;
pub mod identity;
pub mod merge;
pub mod pipeline;
pub mod publication;
pub mod render;
pub mod review;
pub mod source;
pub mod store;
pub mod theme;
pub mod view;
