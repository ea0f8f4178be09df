//! Command implementations.

pub mod families;
pub mod follow;
pub mod show;
