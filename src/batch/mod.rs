pub mod columns;
pub mod rows;
pub mod stats;

pub use columns::*;
pub use rows::*;
pub use stats::*;
