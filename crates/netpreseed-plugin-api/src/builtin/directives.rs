use async_trait::async_trait;
use netpreseed_core::ClientContext;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::PluginResult;
use crate::output::{Directive, Output};
use crate::plugin::{PluginInit, PreseedPlugin};

/// Static directives and script lines, globally and per class.
///
/// ```yaml
/// kind: Directives
/// settings:
///   preseed:
///     - key: debian-installer/locale
///       value: en_US
///   late:
///     - echo "installed {hostname}" > /target/etc/motd
///   classes:
///     gpu:
///       preseed:
///         - key: pkgsel/include
///           value: nvidia-driver
/// ```
///
/// Values and script lines expand the client placeholders
/// (`{hostname}`, `{ip}`, ...). Class sections apply in the client's class
/// order, each at most once.
pub struct DirectivesPlugin {
    common: Section,
    classes: BTreeMap<String, Section>,
    client: Arc<ClientContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DirectivesSettings {
    preseed: Vec<Directive>,
    early: Vec<String>,
    late: Vec<String>,
    classes: BTreeMap<String, Section>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Section {
    preseed: Vec<Directive>,
    early: Vec<String>,
    late: Vec<String>,
}

impl DirectivesPlugin {
    pub const KIND: &'static str = "Directives";

    pub fn create(init: PluginInit) -> PluginResult<Box<dyn PreseedPlugin>> {
        let settings: DirectivesSettings = init.settings()?;
        Ok(Box::new(Self {
            common: Section {
                preseed: settings.preseed,
                early: settings.early,
                late: settings.late,
            },
            classes: settings.classes,
            client: init.client,
        }))
    }

    /// Common section followed by the sections of the client's classes.
    fn sections(&self) -> Vec<&Section> {
        let mut seen = HashSet::new();
        let mut sections = vec![&self.common];
        for class in &self.client.classes {
            if !seen.insert(class.as_str()) {
                continue;
            }
            if let Some(section) = self.classes.get(class) {
                sections.push(section);
            }
        }
        sections
    }

    fn write_lines(&self, out: &mut Output, pick: fn(&Section) -> &[String]) {
        for section in self.sections() {
            for line in pick(section) {
                out.line(self.client.expand(line));
            }
        }
    }
}

#[async_trait]
impl PreseedPlugin for DirectivesPlugin {
    async fn preseed(&mut self, out: &mut Output) -> PluginResult<()> {
        for section in self.sections() {
            for directive in &section.preseed {
                let expanded = Directive {
                    value: self.client.expand(&directive.value),
                    ..directive.clone()
                };
                out.directive(&expanded);
            }
        }
        Ok(())
    }

    async fn script_early(&mut self, out: &mut Output) -> PluginResult<()> {
        self.write_lines(out, |section| section.early.as_slice());
        Ok(())
    }

    async fn script_late(&mut self, out: &mut Output) -> PluginResult<()> {
        self.write_lines(out, |section| section.late.as_slice());
        Ok(())
    }
}
