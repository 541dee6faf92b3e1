#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

//! Shared building blocks for the groupchat client: wire models, the
//! timeline reconciler, and client configuration.

pub mod config;
pub mod models;
pub mod timeline;
