//! URL handling module
//!
//! This module provides URL normalization, href resolution, origin keys for
//! same-domain checks, and regex scope evaluation.

mod domain;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::{origin_key, seed_origins};
pub use normalize::{normalize_url, resolve_url};
pub use scope::ScopeEvaluator;
