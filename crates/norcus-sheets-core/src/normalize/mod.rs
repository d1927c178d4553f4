//! Clean-up of duplicate names created by cloud sync clients

mod fixer;
mod versioned;

pub use fixer::*;
pub use versioned::*;
