//! Wand Sketch
//!
//! User-declared topic intervals ("sketches") over a fixed-length document
//! and the engine that blends them into per-slot influence curves.
//!
//! # Core Concepts
//!
//! - [`Sketch`]: a `(topic, start, end)` control signal, inclusive on both ends
//! - [`SketchBook`]: the ordered, session-scoped list of sketches
//! - [`generate_weights`]: turns sketches into one normalized curve per topic
//! - [`weights_at`]: the topic mix requested for a single slot
//!
//! # Example
//!
//! ```rust
//! use wand_sketch::{generate_weights, Sketch};
//!
//! let sketches = vec![Sketch::new("Sports", 0, 4)];
//! let weights = generate_weights(&sketches, 5, 1.0).unwrap();
//!
//! let curve = &weights["Sports"];
//! let total: f64 = curve.iter().sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

#![warn(unreachable_pub)]

mod sketch;
mod weights;

pub use sketch::{Sketch, SketchBook, SketchError};
pub use weights::{
    generate_weights, standard_normal_pdf, weights_at, TopicMix, TopicWeights, SPREAD_EPSILON,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
