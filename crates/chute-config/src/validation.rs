//! Descriptor validation.
//!
//! Schema checks need no filesystem and run for every descriptor. Regex
//! syntax and stage/plugin names are checked when the bundler compiles the
//! descriptor, since only it knows its registries.

use std::path::{Path, PathBuf};

use crate::descriptor::Descriptor;
use crate::error::{ConfigError, Result};

pub trait ConfigValidator {
    fn validate(&self, descriptor: &Descriptor) -> Result<()>;
}

/// Schema-only validation (no filesystem checks).
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, descriptor: &Descriptor) -> Result<()> {
        if descriptor.entry.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, source) in &descriptor.entry {
            if name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "entry names cannot be empty".to_string(),
                    hint: None,
                });
            }
            if source.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("entry '{name}' has no source modules"),
                    hint: Some(format!("Give '{name}' a path, e.g. {name} = \"src/{name}.js\"")),
                });
            }
        }

        if descriptor.output.filename.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "output.filename cannot be empty".to_string(),
                hint: Some("Use a template such as \"[name].js\"".to_string()),
            });
        }

        // Every target would otherwise be written to the same file.
        if descriptor.entry.len() > 1
            && !["[name]", "[id]", "[hash", "[contenthash", "[chunkhash"]
                .iter()
                .any(|p| descriptor.output.filename.contains(p))
        {
            return Err(ConfigError::SchemaValidation {
                message: format!(
                    "output.filename '{}' is the same for every entry",
                    descriptor.output.filename
                ),
                hint: Some("Include [name] in output.filename".to_string()),
            });
        }

        for (index, rule) in descriptor.module.rules.iter().enumerate() {
            if rule.test.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("module.rules[{index}] has an empty test"),
                    hint: None,
                });
            }
            if rule.stages.is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("module.rules[{index}] ({}) has no stages", rule.test),
                    hint: Some("Add at least one loader to 'use'".to_string()),
                });
            }
            if let Some(stage) = rule.stages.iter().find(|s| s.loader.trim().is_empty()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!(
                        "module.rules[{index}] has a stage without a loader name (options: {})",
                        stage.options
                    ),
                    hint: None,
                });
            }
        }

        for plugin in descriptor
            .plugins
            .iter()
            .chain(&descriptor.optimization.minimizer)
        {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "plugin names cannot be empty".to_string(),
                    hint: None,
                });
            }
        }

        if !descriptor.devtool.is_disabled() {
            return Err(ConfigError::Unsupported {
                option: "devtool".to_string(),
                reason: "source maps are not produced; set devtool = false".to_string(),
            });
        }

        Ok(())
    }
}

/// Schema validation plus on-disk checks of the context and entry modules.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, descriptor: &Descriptor) -> Result<()> {
        SchemaValidator.validate(descriptor)?;

        let context = if descriptor.context.is_absolute() {
            descriptor.context.clone()
        } else {
            self.root.join(&descriptor.context)
        };
        if !context.is_dir() {
            return Err(ConfigError::NotFound(context));
        }

        for source in descriptor.entry.values() {
            for path in source.paths() {
                let resolved = context.join(path);
                if !resolved.exists() {
                    return Err(ConfigError::EntryNotFound(resolved));
                }
            }
        }

        Ok(())
    }
}

/// Run [`SchemaValidator`].
pub fn validate_schema(descriptor: &Descriptor) -> Result<()> {
    SchemaValidator.validate(descriptor)
}

/// Run [`FsValidator`] rooted at `root`.
pub fn validate_fs(descriptor: &Descriptor, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(descriptor)
}
