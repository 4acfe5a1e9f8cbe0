use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chute_config::preset::stage;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Stage, StageContext, parse_options};
use crate::module::Source;

const DEFAULT_EXECUTABLE: &str = "sass";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolOptions {
    indented_syntax: Option<bool>,
    #[serde(default)]
    include_paths: Vec<PathBuf>,
    output_style: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SassOptions {
    indented_syntax: Option<bool>,
    #[serde(default)]
    sass_options: ToolOptions,
    #[serde(default)]
    include_paths: Vec<PathBuf>,
    /// Compiler binary; `sass` on `PATH` by default.
    executable: Option<String>,
    /// Kill the compiler after this many milliseconds.
    timeout: Option<u64>,
}

impl SassOptions {
    fn output_style(&self) -> &str {
        self.sass_options.output_style.as_deref().unwrap_or("expanded")
    }
}

/// Compiles Sass by piping the source through an external `sass` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SassStage;

#[async_trait]
impl Stage for SassStage {
    fn name(&self) -> &str {
        stage::SASS
    }

    fn validate(&self, options: &Value) -> anyhow::Result<()> {
        let options: SassOptions = parse_options(options)?;
        match options.output_style() {
            "expanded" | "compressed" => Ok(()),
            other => anyhow::bail!("unsupported outputStyle '{other}'"),
        }
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let options: SassOptions = cx.options()?;
        let indented = options
            .indented_syntax
            .or(options.sass_options.indented_syntax)
            .unwrap_or_else(|| cx.resource.extension().is_some_and(|e| e == "sass"));
        let executable = options.executable.as_deref().unwrap_or(DEFAULT_EXECUTABLE);

        let mut command = Command::new(executable);
        command.arg("--stdin");
        if indented {
            command.arg("--indented");
        }
        command.arg(format!("--load-path={}", cx.resource_dir().display()));
        for dir in options
            .include_paths
            .iter()
            .chain(&options.sass_options.include_paths)
        {
            let dir = if dir.is_absolute() {
                dir.clone()
            } else {
                cx.env.context.join(dir)
            };
            command.arg(format!("--load-path={}", dir.display()));
        }
        command
            .arg("--no-source-map")
            .arg(format!("--style={}", options.output_style()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(module = %cx.resource.display(), executable, indented, "compiling sass");
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!(
                    "sass executable '{executable}' not found; install Dart Sass or set the `executable` option"
                )
            } else {
                anyhow::anyhow!("failed to start '{executable}': {e}")
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .context("sass process has no stdin")?;
        let source = input.into_bytes();
        let feed = async move {
            stdin.write_all(&source).await?;
            stdin.shutdown().await
        };
        let run = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, output) = match options.timeout {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), run)
                .await
                .map_err(|_| anyhow::anyhow!("'{executable}' timed out after {ms}ms"))?,
            None => run.await,
        };
        let output = output.with_context(|| format!("failed to wait for '{executable}'"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("'{executable}' exited with {}: {}", output.status, stderr.trim());
        }
        fed.with_context(|| format!("failed to write to '{executable}'"))?;

        let css = String::from_utf8(output.stdout).context("sass produced non-UTF-8 output")?;
        Ok(Source::Style(css))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_sass(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-sass");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    async fn run(options: Value, source: &str) -> anyhow::Result<Source> {
        let env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        let path = Path::new("/p/styles/main.sass");
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(path, None, source.as_bytes(), &env, &runtime);
        cx.options = &options;
        SassStage
            .run(Source::Raw(source.as_bytes().to_vec()), &mut cx)
            .await
    }

    #[tokio::test]
    async fn pipes_source_and_passes_flags() {
        let dir = TempDir::new().unwrap();
        let exe = fake_sass(dir.path(), r#"printf '/* %s */\n' "$*"; cat"#);

        let out = run(
            json!({ "indentedSyntax": true, "executable": exe, "includePaths": ["lib"] }),
            ".a\n  color: red\n",
        )
        .await
        .unwrap();

        let Source::Style(css) = out else {
            panic!("expected style output");
        };
        assert!(css.contains("--stdin --indented --load-path=/p/styles --load-path=/p/lib"));
        assert!(css.contains("--style=expanded"));
        assert!(css.ends_with(".a\n  color: red\n"));
    }

    #[tokio::test]
    async fn failures_carry_stderr() {
        let dir = TempDir::new().unwrap();
        let exe = fake_sass(dir.path(), "cat >/dev/null; echo 'Error: expected \"{\"' >&2; exit 65");
        let err = run(json!({ "executable": exe }), ".a {").await.unwrap_err();
        assert!(err.to_string().contains("expected"), "{err}");
    }

    #[tokio::test]
    async fn missing_executable() {
        let err = run(json!({ "executable": "/nonexistent/sass" }), "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn output_style_is_checked() {
        assert!(SassStage.validate(&json!({ "sassOptions": { "outputStyle": "nested" } })).is_err());
        assert!(SassStage.validate(&Value::Null).is_ok());
    }
}
