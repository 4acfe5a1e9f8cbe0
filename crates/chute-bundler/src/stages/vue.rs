//! Single file components.
//!
//! The `<script>` block becomes a virtual module `<file>.vue.script.<lang>`
//! and each `<style>` block a virtual module `<file>.vue.<n>.<lang>`; both go
//! through the rule list like any other file. The component module imports
//! them and attaches the `<template>` as a string.

use async_trait::async_trait;
use chute_config::preset::{plugin, stage};
use memchr::memmem;
use tracing::{debug, warn};

use super::{Stage, StageContext, js_string};
use crate::module::Source;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Block<'s> {
    content: &'s str,
    attrs: Vec<(&'s str, &'s str)>,
}

impl<'s> Block<'s> {
    fn attr(&self, name: &str) -> Option<&'s str> {
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    fn has(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn lang(&self, default: &'s str) -> &'s str {
        self.attr("lang").filter(|l| !l.is_empty()).unwrap_or(default)
    }
}

#[derive(Debug, Default)]
struct Sfc<'s> {
    template: Option<Block<'s>>,
    script: Option<Block<'s>>,
    styles: Vec<Block<'s>>,
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// `name="value"`, `name='value'`, `name=value` and bare `name`.
fn parse_attrs(text: &str) -> Vec<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (is_space(bytes[i]) || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !is_space(bytes[i]) && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        if name_start == i {
            i += 1;
            continue;
        }
        let name = &text[name_start..i];

        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            attrs.push((name, ""));
            continue;
        }
        i += 1;
        while i < bytes.len() && is_space(bytes[i]) {
            i += 1;
        }
        let value = match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                let start = i + 1;
                let end = memchr::memchr(quote, &bytes[start..]).map_or(bytes.len(), |p| start + p);
                i = end + 1;
                &text[start..end]
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_space(bytes[i]) {
                    i += 1;
                }
                &text[start..i]
            }
        };
        attrs.push((name, value));
    }
    attrs
}

/// Closing `>` of a tag, skipping quoted attribute values.
fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote = None;
    for (i, &byte) in bytes[start..].iter().enumerate() {
        match (byte, quote) {
            (b'"' | b'\'', None) => quote = Some(byte),
            (b, Some(q)) if b == q => quote = None,
            (b'>', None) => return Some(start + i),
            _ => {}
        }
    }
    None
}

fn is_tag_boundary(bytes: &[u8], at: usize) -> bool {
    bytes
        .get(at)
        .is_none_or(|b| is_space(*b) || matches!(b, b'>' | b'/'))
}

/// Start of `</name>` closing the block opened before `from`, and the
/// position after it. Nested `<template>` elements are balanced.
fn find_block_end(bytes: &[u8], from: usize, name: &str) -> Option<(usize, usize)> {
    let open = format!("<{name}");
    let close = format!("</{name}");
    let nests = name == "template";
    let mut depth = 0usize;
    let mut pos = from;

    loop {
        let next_close = pos + memmem::find(&bytes[pos..], close.as_bytes())?;
        let next_open = if nests {
            memmem::find(&bytes[pos..next_close], open.as_bytes()).map(|o| pos + o)
        } else {
            None
        };
        match next_open {
            Some(o) => {
                if is_tag_boundary(bytes, o + open.len()) {
                    depth += 1;
                }
                pos = o + open.len();
            }
            None if depth == 0 => {
                let end = next_close + memchr::memchr(b'>', &bytes[next_close..])? + 1;
                return Some((next_close, end));
            }
            None => {
                depth -= 1;
                pos = next_close + close.len();
            }
        }
    }
}

fn parse_sfc(source: &str) -> anyhow::Result<Sfc<'_>> {
    let bytes = source.as_bytes();
    let mut sfc = Sfc::default();
    let mut pos = 0;

    while let Some(offset) = memchr::memchr(b'<', &bytes[pos..]) {
        let start = pos + offset;
        if bytes[start + 1..].starts_with(b"!--") {
            let end = memmem::find(&bytes[start..], b"-->")
                .ok_or_else(|| anyhow::anyhow!("unclosed comment at byte {start}"))?;
            pos = start + end + 3;
            continue;
        }

        let name_len = bytes[start + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-')
            .count();
        if name_len == 0 {
            pos = start + 1;
            continue;
        }
        let name = &source[start + 1..start + 1 + name_len];
        let tag_end = find_closing_angle(bytes, start + 1 + name_len)
            .ok_or_else(|| anyhow::anyhow!("unclosed <{name}> tag at byte {start}"))?;
        let attr_text = &source[start + 1 + name_len..tag_end];
        let self_closing = attr_text.trim_end().ends_with('/');

        let (content, next) = if self_closing {
            ("", tag_end + 1)
        } else {
            let (close, after) = find_block_end(bytes, tag_end + 1, name)
                .ok_or_else(|| anyhow::anyhow!("missing </{name}> for block at byte {start}"))?;
            (&source[tag_end + 1..close], after)
        };
        let block = Block {
            content,
            attrs: parse_attrs(attr_text),
        };

        match name {
            "template" if sfc.template.is_none() => sfc.template = Some(block),
            "template" => anyhow::bail!("more than one <template> block"),
            "script" if sfc.script.is_none() => sfc.script = Some(block),
            "script" => anyhow::bail!("more than one <script> block"),
            "style" => sfc.styles.push(block),
            other => debug!(block = other, "skipping custom block"),
        }
        pos = next;
    }
    Ok(sfc)
}

/// Splits single file components into script, style and template parts.
#[derive(Debug, Clone, Copy, Default)]
pub struct VueStage;

#[async_trait]
impl Stage for VueStage {
    fn name(&self) -> &str {
        stage::VUE
    }

    async fn run(&self, input: Source, cx: &mut StageContext<'_>) -> anyhow::Result<Source> {
        if !cx.env.has_plugin(plugin::VUE) {
            anyhow::bail!(
                "{} requires the '{}' plugin to be registered",
                stage::VUE,
                plugin::VUE
            );
        }

        let text = input.into_text()?;
        let sfc = parse_sfc(&text)?;
        let file_name = cx
            .resource
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("component path has no file name"))?;
        let dir = cx.resource_dir().to_path_buf();

        let mut module = String::new();
        let virtual_module = |cx: &mut StageContext<'_>, suffix: String, content: &str| {
            let name = format!("{file_name}.{suffix}");
            cx.add_virtual_module(dir.join(&name), content.as_bytes().to_vec());
            format!("./{name}")
        };

        match &sfc.script {
            Some(script) => {
                let request = match script.attr("src") {
                    Some(src) => src.to_string(),
                    None => virtual_module(
                        cx,
                        format!("script.{}", script.lang("js")),
                        script.content,
                    ),
                };
                module.push_str(&format!("import component from {};\n", js_string(&request)));
            }
            None => module.push_str("var component = {};\n"),
        }

        for (index, style) in sfc.styles.iter().enumerate() {
            if style.has("scoped") || style.has("module") {
                warn!(
                    component = %cx.resource.display(),
                    index,
                    "scoped and module styles are emitted as global styles"
                );
            }
            let request = match style.attr("src") {
                Some(src) => src.to_string(),
                None => virtual_module(cx, format!("{index}.{}", style.lang("css")), style.content),
            };
            module.push_str(&format!("import {};\n", js_string(&request)));
        }

        if let Some(template) = &sfc.template {
            let lang = template.lang("html");
            if lang != "html" {
                anyhow::bail!("unsupported template language '{lang}'");
            }
            module.push_str(&format!(
                "component.template = {};\n",
                js_string(template.content.trim())
            ));
        }

        module.push_str("export default component;\n");
        Ok(Source::Script(module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::BuildEnv;
    use crate::runtime::NativeRuntime;
    use chute_config::Descriptor;
    use std::path::{Path, PathBuf};

    const COMPONENT: &str = r#"<template>
  <div class="card">
    <template v-if="open"><slot /></template>
  </div>
</template>

<!-- <style>ignored</style> -->
<script>
export default { name: "card", data() { return { open: true }; } };
</script>

<style lang="sass" scoped>
.card
  color: red
</style>
<style>
.card { margin: 0 }
</style>
"#;

    #[test]
    fn splits_blocks() {
        let sfc = parse_sfc(COMPONENT).unwrap();
        let template = sfc.template.unwrap();
        assert!(template.content.contains(r#"<template v-if="open"><slot /></template>"#));
        assert!(template.content.trim_end().ends_with("</div>"));
        assert!(sfc.script.unwrap().content.contains("name: \"card\""));
        assert_eq!(sfc.styles.len(), 2);
        assert_eq!(sfc.styles[0].lang("css"), "sass");
        assert!(sfc.styles[0].has("scoped"));
        assert_eq!(sfc.styles[1].lang("css"), "css");
    }

    #[test]
    fn attributes() {
        assert_eq!(
            parse_attrs(r#" lang="scss" scoped src='./a.scss' data-x=1 /"#),
            vec![("lang", "scss"), ("scoped", ""), ("src", "./a.scss"), ("data-x", "1")]
        );
    }

    fn env(plugins: &[&str]) -> BuildEnv {
        let mut env = BuildEnv::from_descriptor(&Descriptor::default().with_context("/p"));
        env.plugins = plugins.iter().map(|p| p.to_string()).collect();
        env
    }

    #[tokio::test]
    async fn generates_component_module() {
        let env = env(&[plugin::VUE]);
        let path = Path::new("/p/src/Card.vue");
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(path, None, COMPONENT.as_bytes(), &env, &runtime);
        let out = VueStage
            .run(Source::Raw(COMPONENT.as_bytes().to_vec()), &mut cx)
            .await
            .unwrap();

        let Source::Script(code) = out else {
            panic!("expected script output");
        };
        assert!(code.starts_with("import component from \"./Card.vue.script.js\";\n"));
        assert!(code.contains("import \"./Card.vue.0.sass\";\n"));
        assert!(code.contains("import \"./Card.vue.1.css\";\n"));
        assert!(code.contains("component.template = \"<div class=\\\"card\\\">"));
        assert!(code.ends_with("export default component;\n"));

        let virtual_paths: Vec<_> = cx.effects.virtual_modules.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            virtual_paths,
            vec![
                PathBuf::from("/p/src/Card.vue.script.js"),
                PathBuf::from("/p/src/Card.vue.0.sass"),
                PathBuf::from("/p/src/Card.vue.1.css"),
            ]
        );
    }

    #[tokio::test]
    async fn requires_the_plugin() {
        let env = env(&[]);
        let runtime = NativeRuntime::new("/");
        let mut cx = StageContext::new(Path::new("/p/A.vue"), None, b"", &env, &runtime);
        let err = VueStage
            .run(Source::Raw(b"<template></template>".to_vec()), &mut cx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("plugin"));
    }

    #[test]
    fn unclosed_block_is_an_error() {
        assert!(parse_sfc("<script>var a;").is_err());
    }
}
