use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chute_config::preset::plugin;
use path_clean::PathClean;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{LifecyclePlugin, PluginContext, PluginPhase};
use crate::stages::parse_options;

#[derive(Debug, Default, Deserialize)]
struct CleanOptions {
    #[serde(default)]
    paths: Vec<PathBuf>,
}

/// Removes output directories before the build writes anything.
#[derive(Debug, Clone, Default)]
pub struct CleanPlugin {
    paths: Vec<PathBuf>,
}

impl CleanPlugin {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn from_options(options: &Value) -> anyhow::Result<Self> {
        let options: CleanOptions = parse_options(options)?;
        for path in &options.paths {
            if path.as_os_str().is_empty() {
                anyhow::bail!("empty path");
            }
        }
        Ok(Self::new(options.paths))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// `path` below `root`, or an error when it would escape it or name the
/// root itself.
fn target(root: &Path, path: &Path) -> anyhow::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.clean()
    } else {
        root.join(path).clean()
    };
    let inside = joined.strip_prefix(root).is_ok_and(|rest| {
        rest.components().next().is_some()
            && rest.components().all(|c| matches!(c, Component::Normal(_)))
    });
    if !inside {
        anyhow::bail!(
            "refusing to remove {}: it is not below the project root {}",
            joined.display(),
            root.display()
        );
    }
    Ok(joined)
}

#[async_trait]
impl LifecyclePlugin for CleanPlugin {
    fn name(&self) -> &str {
        plugin::CLEAN
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Start
    }

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        let targets = self
            .paths
            .iter()
            .map(|path| target(&cx.env.context, path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        for path in targets {
            info!(path = %path.display(), "removing");
            cx.runtime.remove_path(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::output::AssetMap;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn targets_stay_below_the_root() {
        let root = Path::new("/srv/site");
        assert_eq!(
            target(root, Path::new("local/assets/local")).unwrap(),
            PathBuf::from("/srv/site/local/assets/local")
        );
        assert!(target(root, Path::new("/srv/site/dist")).is_ok());
        assert!(target(root, Path::new("../other")).is_err());
        assert!(target(root, Path::new("local/../..")).is_err());
        assert!(target(root, Path::new(".")).is_err());
        assert!(target(root, Path::new("/etc")).is_err());
    }

    #[tokio::test]
    async fn removes_listed_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("local/assets/local/app")).unwrap();
        fs::write(root.join("local/assets/local/app/app.js"), "old").unwrap();
        fs::create_dir_all(root.join("local/assets/vendor")).unwrap();

        let plugin = CleanPlugin::from_options(&json!({
            "paths": ["local/assets/local", "local/assets/mustache"]
        }))
        .unwrap();
        let env = BuildEnv::from_descriptor(&Descriptor::default().with_context(root));
        let runtime = NativeRuntime::new(root);
        let mut assets = AssetMap::new();
        let mut cx = PluginContext {
            env: &env,
            runtime: &runtime,
            graph: None,
            assets: &mut assets,
        };
        plugin.apply(&mut cx).await.unwrap();

        assert!(!root.join("local/assets/local").exists());
        assert!(root.join("local/assets/vendor").exists());
    }
}
