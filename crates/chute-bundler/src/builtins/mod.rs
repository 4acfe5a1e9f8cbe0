//! Shared tool integrations used by several stages and plugins.
//!
//! - [`css`]: stylesheet parsing, dependency analysis and minification via
//!   lightningcss.
//! - [`script`]: script parsing, lowering and printing via oxc.

pub mod css;
pub mod script;
