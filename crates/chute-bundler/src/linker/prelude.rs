//! The module runtime every linked script starts with.

use std::fmt::Write;

use crate::module::ModuleId;

/// Name the module functions receive the loader under.
pub(crate) const REQUIRE: &str = "__chute_require__";

const RUNTIME: &str = r#"  var installed = {};
  function __chute_require__(id) {
    if (installed[id]) return installed[id].exports;
    var module = (installed[id] = { exports: {} });
    modules[id].call(module.exports, module, module.exports, __chute_require__);
    return module.exports;
  }
  __chute_require__.r = function (exports) {
    Object.defineProperty(exports, "__esModule", { value: true });
  };
  __chute_require__.d = function (exports, getters) {
    for (var name in getters) {
      Object.defineProperty(exports, name, { enumerable: true, get: getters[name] });
    }
  };
  __chute_require__.n = function (m) {
    if (m && m.__esModule) return m;
    var ns = { default: m };
    if (m && (typeof m === "object" || typeof m === "function")) {
      for (var key in m) {
        if (key !== "default" && Object.prototype.hasOwnProperty.call(m, key)) ns[key] = m[key];
      }
    }
    return ns;
  };
  __chute_require__.x = function (exports, m) {
    Object.keys(m).forEach(function (key) {
      if (key === "default" || Object.prototype.hasOwnProperty.call(exports, key)) return;
      Object.defineProperty(exports, key, {
        enumerable: true,
        get: function () { return m[key]; }
      });
    });
  };
"#;

/// Wrap module bodies (sorted by id) into one self-starting script that
/// runs `entries` in order.
pub(crate) fn bundle(modules: &[(ModuleId, String)], entries: &[ModuleId]) -> String {
    let body_len: usize = modules.iter().map(|(_, body)| body.len() + 64).sum();
    let mut out = String::with_capacity(RUNTIME.len() + body_len + 128);

    out.push_str("(function (modules) {\n");
    out.push_str(RUNTIME);
    for entry in entries {
        let _ = writeln!(out, "  {REQUIRE}({entry});");
    }
    out.push_str("})({\n");
    for (id, body) in modules {
        let _ = writeln!(out, "\"{id}\": function (module, exports, {REQUIRE}) {{");
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("},\n");
    }
    out.push_str("});\n");
    out
}
