pub mod alert;
pub mod extraction;
pub mod site_profile;
pub mod target;

// Re-exports for convenience
pub use alert::*;
pub use extraction::*;
pub use site_profile::*;
pub use target::*;
