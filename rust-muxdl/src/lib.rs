//! rust-muxdl library crate.
//!
//! Resolves the stream variants of an online video, relays single variants
//! directly, and fetches and muxes separate audio and video tracks into one
//! MP4.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod resolver;
pub mod services;
pub mod staging;

pub use error::{Error, Result};
