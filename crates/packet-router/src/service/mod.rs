//! Service Layer
//!
//! The routing loop and the handle that drives it.

pub mod distributor;
pub mod handle;

pub use distributor::Distributor;
pub use handle::RouterHandle;
