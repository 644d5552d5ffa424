//! Resolve an AWS identity from static or ambient credentials, optionally
//! assume an IAM role with it, and enumerate the accounts of an AWS
//! Organization.

pub mod aws;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod validators;

pub use client::Client;
pub use context::{CallContext, CancelHandle};
pub use error::{BoxError, Error, Result};
