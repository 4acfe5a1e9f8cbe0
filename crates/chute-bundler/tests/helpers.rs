//! Shared fixtures for chute-bundler integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chute_bundler::runtime::RuntimeResult;
use chute_bundler::{Descriptor, NativeRuntime, Runtime, Source, Stage, StageContext};
use parking_lot::Mutex;
use tempfile::TempDir;

/// A throwaway project directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> &Self {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(path, content).expect("write fixture");
        self
    }

    pub fn output(&self, relative: &str) -> PathBuf {
        self.root().join("local/assets").join(relative)
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.output(relative))
            .unwrap_or_else(|e| panic!("missing output {relative}: {e}"))
    }

    /// The production descriptor rooted here with one `app` entry.
    pub fn production(&self) -> Descriptor {
        Descriptor::production()
            .with_context(self.root())
            .with_entry("app", "src/app.js")
    }
}

/// A side effect observed by [`RecordingRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(PathBuf),
    Remove(PathBuf),
}

/// Native filesystem access that records every write and removal.
#[derive(Debug)]
pub struct RecordingRuntime {
    inner: NativeRuntime,
    pub ops: Mutex<Vec<Op>>,
}

impl RecordingRuntime {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: NativeRuntime::new(root),
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }
}

#[async_trait]
impl Runtime for RecordingRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        self.ops.lock().push(Op::Write(path.to_path_buf()));
        self.inner.write_file(path, content).await
    }

    async fn remove_path(&self, path: &Path) -> RuntimeResult<()> {
        self.ops.lock().push(Op::Remove(path.to_path_buf()));
        self.inner.remove_path(path).await
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}

/// Shared log of `(stage, file name)` invocations.
pub type StageLog = Arc<Mutex<Vec<(String, String)>>>;

/// Stands in for a built-in stage: records the call and produces a script.
/// Scripts keep their text so their imports are still followed.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: StageLog,
}

impl RecordingStage {
    pub fn new(name: &str, log: &StageLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        let file = cx
            .resource
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.log.lock().push((self.name.clone(), file));

        let is_script = cx.resource.extension().is_some_and(|ext| ext == "js");
        Ok(match input {
            Source::Script(code) => Source::Script(code),
            raw if is_script => Source::Script(raw.into_text()?),
            _ => Source::Script("module.exports = {};".to_string()),
        })
    }
}
