//! Consolidated test modules.
//!
//! End-to-end tests drive the real router built by [`crate::build_app`].
