//! Build pipeline descriptor for chute.
//!
//! A [`Descriptor`] is a read-only description of a production asset build:
//! entries, ordered dispatch rules with their stage chains, lifecycle
//! plugins, output templates and resolution settings. It is assembled once
//! (see [`DescriptorLoader`]) and handed to `chute-bundler`.

pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod loading;
pub mod preset;
pub mod validation;

pub use descriptor::*;
pub use error::{ConfigError, Result};

pub use discovery::{ConfigDiscovery, ConfigSource};
pub use loading::{DescriptorLoader, Overrides, Preset};
pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
