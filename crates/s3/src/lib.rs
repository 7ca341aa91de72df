//! r2up-s3: S3 SDK adapter for r2up
//!
//! This crate provides the implementation of the ObjectStore trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod body;
pub mod client;

pub use client::S3Store;
