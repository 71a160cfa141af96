//! Auth-domain identifiers, scope sets, token sets, and upstream profiles.

pub mod id;
pub mod profile;
pub mod scope;
pub mod token;

pub use id::*;
pub use profile::*;
pub use scope::*;
pub use token::{secret::*, set::*};
