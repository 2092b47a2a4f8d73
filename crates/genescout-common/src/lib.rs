//! genescout-common: Shared errors and the allowlisted HTTP client used by every genescout crate.

pub mod error;
pub mod sandbox;

pub use error::{GenescoutError, Result};
pub use sandbox::SandboxClient;
