//! Shared types and wire format for mpdeploy.
//!
//! Everything in this crate is pure data: the release version derived from
//! the CI ref, the projection of a `pubspec.yaml` that gets published, the
//! remote package index document, and the object-key layout that downstream
//! tools rely on. No filesystem or network access happens here.

pub mod index;
pub mod layout;
pub mod pubspec;
pub mod release;

// Re-exports
pub use index::{IndexError, PackageIndex, Upsert};
pub use layout::*;
pub use pubspec::{Environment, EnvironmentSnapshot, Pubspec, PubspecSnapshot, PublishedEntry};
pub use release::{DEV_BRANCHES, DEV_VERSION, ReleaseError, ReleaseVersion};
