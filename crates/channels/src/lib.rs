//! Outbound channel providers.
//!
//! Email: SendGrid delivery of campaign batches.

pub mod email;

pub use email::SendGridProvider;
