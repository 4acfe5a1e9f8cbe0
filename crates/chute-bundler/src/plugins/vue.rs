use async_trait::async_trait;
use chute_config::preset::plugin;
use tracing::debug;

use super::{LifecyclePlugin, PluginContext, PluginPhase};

/// Companion of the `vue-loader` stage. Its registration is what lets the
/// stage re-dispatch `<style>` and `<script>` blocks through the rule list.
#[derive(Debug, Clone, Copy, Default)]
pub struct VuePlugin;

#[async_trait]
impl LifecyclePlugin for VuePlugin {
    fn name(&self) -> &str {
        plugin::VUE
    }

    fn phase(&self) -> PluginPhase {
        PluginPhase::Start
    }

    async fn apply(&self, cx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        debug!(context = %cx.env.context.display(), "single file components enabled");
        Ok(())
    }
}
