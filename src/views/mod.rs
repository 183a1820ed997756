//! Role-specific views over the shared order state.
//!
//! Each staff view pairs an [`crate::board::OrderBoard`] with its poll loop
//! and the transitions that role may perform; the customer tracking view is
//! read-only and unauthenticated. All backend traffic goes through the one
//! [`crate::api::ApiClient`].

pub mod kitchen;
pub mod tracking;
pub mod waiter;
