//! Output name templates (`local/[name]/[name].js`, `[name].[ext]?[hash]`).
//!
//! Templates are parsed when the descriptor is compiled, so an unknown
//! placeholder is a build-start error rather than a surprise at emit time.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::hash::{DEFAULT_HASH_LENGTH, truncate};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([a-z]+)(?::(\d+))?\]").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Build target name for scripts and extracted styles, file stem for
    /// emitted files.
    Name,
    /// Extension without the dot.
    Ext,
    /// Directory of the source file relative to the context, with a
    /// trailing slash.
    Path,
    Id,
    Hash,
    ContentHash,
    ChunkHash,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "name" => Placeholder::Name,
            "ext" => Placeholder::Ext,
            "path" => Placeholder::Path,
            "id" => Placeholder::Id,
            "hash" => Placeholder::Hash,
            "contenthash" => Placeholder::ContentHash,
            "chunkhash" => Placeholder::ChunkHash,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Placeholder::Name => "name",
            Placeholder::Ext => "ext",
            Placeholder::Path => "path",
            Placeholder::Id => "id",
            Placeholder::Hash => "hash",
            Placeholder::ContentHash => "contenthash",
            Placeholder::ChunkHash => "chunkhash",
        }
    }

    fn is_hash(self) -> bool {
        matches!(
            self,
            Placeholder::Hash | Placeholder::ContentHash | Placeholder::ChunkHash
        )
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_str())
    }
}

/// Placeholders accepted by script and extracted-stylesheet filenames.
pub const CHUNK_PLACEHOLDERS: &[Placeholder] = &[
    Placeholder::Name,
    Placeholder::Id,
    Placeholder::Hash,
    Placeholder::ContentHash,
    Placeholder::ChunkHash,
];

/// Placeholders accepted by `file-loader` / `url-loader` names.
pub const FILE_PLACEHOLDERS: &[Placeholder] = &[
    Placeholder::Name,
    Placeholder::Ext,
    Placeholder::Path,
    Placeholder::Hash,
    Placeholder::ContentHash,
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '[{placeholder}]' in '{template}'")]
    Unknown {
        template: String,
        placeholder: String,
    },

    #[error("placeholder {placeholder} is not available in '{template}'")]
    NotAllowed {
        template: String,
        placeholder: Placeholder,
    },

    #[error("length is only allowed on hash placeholders, found {placeholder} in '{template}'")]
    LengthOnNonHash {
        template: String,
        placeholder: Placeholder,
    },

    #[error("no value for {placeholder} when rendering '{template}'")]
    Missing {
        template: String,
        placeholder: Placeholder,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Placeholder(Placeholder, Option<usize>),
}

/// A parsed name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
}

/// Values substituted into a [`Template`]. Hashes are full hex digests and
/// are truncated per placeholder.
#[derive(Debug, Clone, Default)]
pub struct TemplateData<'a> {
    pub name: Option<&'a str>,
    pub ext: Option<&'a str>,
    pub path: Option<&'a str>,
    pub id: Option<&'a str>,
    pub hash: Option<&'a str>,
    pub content_hash: Option<&'a str>,
    pub chunk_hash: Option<&'a str>,
}

impl TemplateData<'_> {
    fn value(&self, placeholder: Placeholder) -> Option<&str> {
        match placeholder {
            Placeholder::Name => self.name,
            Placeholder::Ext => self.ext,
            Placeholder::Path => self.path,
            Placeholder::Id => self.id,
            Placeholder::Hash => self.hash,
            Placeholder::ContentHash => self.content_hash.or(self.hash),
            Placeholder::ChunkHash => self.chunk_hash.or(self.hash),
        }
    }
}

impl Template {
    /// Parse `raw`, accepting only the placeholders in `allowed`.
    pub fn parse(raw: &str, allowed: &[Placeholder]) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(raw) {
            let Some(whole) = caps.get(0) else { continue };
            let name = &caps[1];
            let Some(placeholder) = Placeholder::parse(name) else {
                return Err(TemplateError::Unknown {
                    template: raw.to_string(),
                    placeholder: name.to_string(),
                });
            };
            if !allowed.contains(&placeholder) {
                return Err(TemplateError::NotAllowed {
                    template: raw.to_string(),
                    placeholder,
                });
            }
            let len = caps.get(2).and_then(|m| m.as_str().parse().ok());
            if len.is_some() && !placeholder.is_hash() {
                return Err(TemplateError::LengthOnNonHash {
                    template: raw.to_string(),
                    placeholder,
                });
            }

            if whole.start() > last {
                parts.push(Part::Literal(raw[last..whole.start()].to_string()));
            }
            parts.push(Part::Placeholder(placeholder, len));
            last = whole.end();
        }
        if last < raw.len() {
            parts.push(Part::Literal(raw[last..].to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::Placeholder(p, _) if *p == placeholder))
    }

    pub fn render(&self, data: &TemplateData<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Placeholder(placeholder, len) => {
                    let value = data.value(*placeholder).ok_or(TemplateError::Missing {
                        template: self.raw.clone(),
                        placeholder: *placeholder,
                    })?;
                    if placeholder.is_hash() {
                        out.push_str(truncate(value, len.unwrap_or(DEFAULT_HASH_LENGTH)));
                    } else {
                        out.push_str(value);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
