//! Flash navigation and active firmware selection

mod navigator;
mod selector;

pub use navigator::*;
pub use selector::*;
