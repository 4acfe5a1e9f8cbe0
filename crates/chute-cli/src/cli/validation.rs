use std::path::PathBuf;

use chute_config::EntrySource;

/// Parse a `NAME=PATH` build target.
///
/// The name becomes the `[name]` of output templates, so it must be
/// non-empty and free of path separators.
///
/// # Examples
///
/// Valid: `app=src/app.js`, `admin=./admin/main.js`
/// Invalid: `app`, `=src/app.js`, `a/b=src/app.js`, `app=`
pub fn parse_entry(s: &str) -> Result<(String, EntrySource), String> {
    let Some((name, path)) = s.split_once('=') else {
        return Err(format!("Expected NAME=PATH, got '{s}'"));
    };
    let name = name.trim();
    let path = path.trim();

    if name.is_empty() {
        return Err(format!("Entry name cannot be empty: '{s}'"));
    }
    if name.contains(['/', '\\']) {
        return Err(format!("Entry name cannot contain path separators: '{name}'"));
    }
    if path.is_empty() {
        return Err(format!("Entry path cannot be empty: '{s}'"));
    }

    Ok((name.to_string(), EntrySource::Single(PathBuf::from(path))))
}
