//! Request handlers.

pub mod admin;
pub mod clips;
pub mod health;
pub mod review;

pub use admin::*;
pub use clips::*;
pub use health::*;
pub use review::*;
