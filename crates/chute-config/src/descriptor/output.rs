use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::helpers::{default_output_filename, default_output_path, default_public_path};

/// Where emitted artifacts go and how they are addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Script filename template, e.g. `local/[name]/[name].js`.
    #[serde(default = "default_output_filename")]
    pub filename: String,

    /// Output directory, relative to the descriptor context unless absolute.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// URL prefix under which the output directory is served.
    #[serde(default = "default_public_path")]
    pub public_path: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            filename: default_output_filename(),
            path: default_output_path(),
            public_path: default_public_path(),
        }
    }
}
