//! Core library for mpdeploy.
//!
//! Everything with side effects lives here: reading and rewriting the
//! package manifest, bundling the package directory, talking to the
//! distribution bucket, and the [`PackageDeployer`] pipeline that ties them
//! together.

pub mod archive;
pub mod config;
pub mod deployer;
pub mod error;
pub mod manifest;
pub mod store;

pub use config::{Credentials, DeployConfig, StoreConfig};
pub use deployer::PackageDeployer;
pub use error::{DeployError, Result};
pub use store::ObjectStore;
