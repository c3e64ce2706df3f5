//! Router Module Index
//!
//! Routes are split by the public/private path partition. The auth gate in
//! `crate::auth` decides access purely from the path prefix: `public` is nested
//! under the configured public prefix, and every route in `private` must live
//! outside it.

/// Anonymous read endpoints plus registration and login.
pub mod public;

/// Article management. Reached only with a valid token.
pub mod private;
