//! Shared helpers for steprun: versions, logging, notices and text

pub mod logging;
pub mod notice;
pub mod text;
pub mod version;

pub use logging::{Logger, TracingLogger};
pub use version::{CompatibilityError, FRAMEWORK_VERSION, Version, VersionParseError, VersionSupport};
