//! Session token models.

pub mod secret;
pub mod set;
