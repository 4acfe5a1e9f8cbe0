use std::path::PathBuf;

/// Fallback for the `HOST` environment variable.
pub const DEFAULT_HOST: &str = "http://127.0.0.1";

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_context() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_output_path() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_output_filename() -> String {
    "[name].js".to_string()
}

pub(crate) fn default_public_path() -> String {
    "/".to_string()
}

pub(crate) fn default_host() -> String {
    std::env::var("HOST")
        .ok()
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

pub(crate) fn default_aggregate_timeout() -> u64 {
    300
}

pub(crate) fn default_modules() -> Vec<String> {
    vec!["node_modules".to_string()]
}

pub(crate) fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string()]
}

pub(crate) fn default_module_extensions() -> Vec<String> {
    vec!["*-loader".to_string(), "*".to_string()]
}

pub(crate) fn is_null(value: &serde_json::Value) -> bool {
    value.is_null()
}
