//! Lifecycle driver.
//!
//! Runs one request's plugins through Initialize, the mode-specific hook and
//! Deinitialize, writing the fixed frame of the response around them. The
//! first failing hook aborts the run; nothing after it is called.

use netpreseed_core::{ClientContext, OutputMode, ScriptLink, ScriptPhase};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::manager::LoadedPlugins;
use crate::output::{Directive, Output};
use crate::plugin::Hook;

/// Shell helper made available to every generated script.
const DOWNLOAD_FILE_HELPER: &str = r#"download_file() {
URL="$1"
DEST="$2"
if [ ! -z "$URL" -a ! -z "$DEST" ]; then
    wget -q -O $DEST "$URL" 2>&1
    RES=$?
else
    RES=1
fi
return $RES
}"#;

/// Drives one lifecycle pass for one request.
#[derive(Debug, Clone)]
pub struct LifecycleDriver {
    mode: OutputMode,
    client: Arc<ClientContext>,
    link: ScriptLink,
    plugin_filter: Option<String>,
}

impl LifecycleDriver {
    pub fn new(mode: OutputMode, client: Arc<ClientContext>, link: ScriptLink) -> Self {
        Self {
            mode,
            client,
            link,
            plugin_filter: None,
        }
    }

    /// Plugin filter to carry into the script callback URLs.
    pub fn plugin_filter(mut self, filter: Option<String>) -> Self {
        self.plugin_filter = filter;
        self
    }

    pub fn mode(&self) -> &OutputMode {
        &self.mode
    }

    /// Runs every phase and writes the response into `out`.
    ///
    /// On error `out` holds whatever was written before the failing hook.
    pub async fn run(&self, plugins: &mut LoadedPlugins, out: &mut Output) -> PluginResult<()> {
        if self.mode.is_script() {
            out.line("#!/bin/bash");
        }
        if let OutputMode::Script(phase) = self.mode {
            self.write_script_preamble(phase, out);
        }

        for name in plugins.names() {
            out.comment(format!("Plugin {}", name));
        }

        let client = &self.client;
        out.line("#")
            .comment(format!(
                "Preseed installer for machine {} ({}, {}, {})",
                client.name, client.ip, client.hardware_address, client.distro
            ))
            .line("#")
            .blank();

        out.section("Initialize Plugins");
        run_hook(plugins, Hook::Initialize, out).await?;

        match self.mode {
            OutputMode::Preseed => {
                let filter = self.plugin_filter.as_deref();
                out.directive(&Directive::string(
                    "preseed/early_command",
                    self.link.command_line(ScriptPhase::Early, client, filter),
                ));
                out.directive(&Directive::string(
                    "preseed/late_command",
                    self.link.command_line(ScriptPhase::Late, client, filter),
                ));
                out.blank();

                out.section("Perform preseed");
                run_hook(plugins, Hook::Preseed, out).await?;
            }
            OutputMode::Script(phase) => {
                out.section(format!("Perform {} script", phase));
                out.line(format!("echo \"Running {} script\"", phase));
                run_hook(plugins, phase_hook(phase), out).await?;
                out.line(format!("echo \"Finished {} script\"", phase));
                out.blank();
            }
            OutputMode::UnknownScript(ref raw) => {
                debug!(script = %raw, "Unsupported script phase requested");
                out.comment(format!("Unsupported script phase: {}", raw));
                out.blank();
            }
        }

        out.section("Deinitialize Plugins");
        run_hook(plugins, Hook::Deinitialize, out).await?;

        out.line("#").comment("EOF").line("#");
        Ok(())
    }

    fn write_script_preamble(&self, phase: ScriptPhase, out: &mut Output) {
        let command = self
            .link
            .command_line(phase, &self.client, self.plugin_filter.as_deref());

        out.line("#")
            .comment(format!("Generate {} script", phase))
            .comment("manual execute:")
            .comment(command)
            .line("#")
            .blank()
            .line("#")
            .comment("helper functions")
            .line("#")
            .text(DOWNLOAD_FILE_HELPER)
            .blank();
    }
}

fn phase_hook(phase: ScriptPhase) -> Hook {
    match phase {
        ScriptPhase::Early => Hook::ScriptEarly,
        ScriptPhase::Late => Hook::ScriptLate,
    }
}

/// Calls `hook` on every plugin in order, stopping at the first error.
async fn run_hook(plugins: &mut LoadedPlugins, hook: Hook, out: &mut Output) -> PluginResult<()> {
    for loaded in plugins.iter_mut() {
        debug!(plugin = %loaded.name, hook = %hook, "Calling plugin hook");
        let plugin = &mut loaded.plugin;
        let result = match hook {
            Hook::Initialize => plugin.initialize(out).await,
            Hook::Preseed => plugin.preseed(out).await,
            Hook::ScriptEarly => plugin.script_early(out).await,
            Hook::ScriptLate => plugin.script_late(out).await,
            Hook::Deinitialize => plugin.deinitialize(out).await,
        };
        result.map_err(|e| PluginError::hook(loaded.name.clone(), hook, e))?;
    }
    Ok(())
}
