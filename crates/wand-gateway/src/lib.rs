//! Wand Gateway
//!
//! HTTP implementations of the generation and critic contracts from
//! `wand-core`. Both clients POST JSON and map failures onto
//! [`wand_core::GatewayError`]:
//! - connection failures and timeouts become `Request`
//! - non-2xx answers become `Status`, carrying a truncated body
//! - bodies of the wrong shape become `Decode`

#![warn(unreachable_pub)]

mod client;
mod critic;
mod generation;

pub use client::JsonEndpoint;
pub use critic::{CriticPayload, HttpCriticGateway, WireReviews};
pub use generation::{GenerationPayload, HttpGenerationGateway};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
