use chute_config::{Descriptor, DescriptorLoader, Overrides, validate_fs};
use tracing::debug;

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// Load the project's descriptor and check that its entries exist.
///
/// Entries given on the command line replace the configured ones.
pub(crate) fn load_descriptor(project: &ProjectArgs, mut overrides: Overrides) -> Result<Descriptor> {
    if !project.root.is_dir() {
        return Err(CliError::FileNotFound(project.root.clone()));
    }

    overrides.entries = project.entries.iter().cloned().collect();
    let mut loader = DescriptorLoader::new(&project.root).overrides(overrides);
    if let Some(config) = &project.config {
        loader = loader.config_file(config.clone());
    }

    let descriptor = loader.load()?;
    validate_fs(&descriptor, &project.root)?;
    debug!(
        context = %descriptor.context.display(),
        entries = descriptor.entry.len(),
        rules = descriptor.module.rules.len(),
        "descriptor loaded"
    );
    Ok(descriptor)
}
