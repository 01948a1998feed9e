//! Feature derivation: city tiers and the model-ready feature record.

pub mod derive;
pub mod tier;

pub use derive::*;
pub use tier::*;
