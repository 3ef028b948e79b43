//! salsa2lp core library — domain types, configuration, overrides, tool runner.
//!
//! - [`types`] — newtypes and domain structs
//! - [`config`] — [`SyncConfig`] load / defaults
//! - [`overrides`] — `Packages.txt` parsing and package list augmentation
//! - [`tool`] — [`ToolRunner`] capability and [`ProcessRunner`]
//! - [`cancel`] — [`CancelFlag`]
//! - [`error`] — [`ConfigError`], [`ToolError`]

pub mod cancel;
pub mod config;
pub mod error;
pub mod overrides;
pub mod tool;
pub mod types;

pub use cancel::{CancelFlag, Cancelled};
pub use config::{Committer, SyncConfig};
pub use error::{ConfigError, ToolError};
pub use overrides::Overrides;
pub use tool::{Invocation, ProcessRunner, ToolOutput, ToolRunner};
pub use types::{
    BuildRecipe, DistributionChannel, PackageName, PackageRef, PackagingFormat, SourceGroup,
    VersionInfo,
};
