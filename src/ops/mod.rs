//! High-level operations.
//!
//! This module contains the implementation of nuconvert commands.

pub mod apply;
pub mod convert;
pub mod rewrite;
pub mod synthesize;

pub use apply::{apply, ApplyOptions, ApplyReport, FileAction};
pub use convert::{convert, ConversionState, ConvertOptions};
