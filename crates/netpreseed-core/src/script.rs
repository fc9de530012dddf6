//! Callback URLs and shell command lines for installer scripts.
//!
//! A preseed response embeds `early_command`/`late_command` directives that
//! make the installer call this service again for the script body. The URL
//! carries everything needed to rebuild the same client view; the command
//! line downloads the script into the installer (or the chroot of the target
//! system) and runs it.

use crate::types::{ClientContext, ScriptPhase};
use url::Url;

/// Marker file present while debian-installer runs preseeding.
const PRESEED_LOG: &str = "/var/lib/preseed/log";

/// Builds callback URLs and command lines relative to the endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLink {
    base: Url,
}

impl ScriptLink {
    /// `base` is the URL of the preseed endpoint; its query is discarded.
    pub fn new(mut base: Url) -> Self {
        base.set_query(None);
        base.set_fragment(None);
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL that fetches the script for `phase`.
    ///
    /// Query: `v=0`, `script`, then `arch`, `distro`, `plugin` and `node`
    /// when known. Values are form-encoded.
    pub fn url(&self, phase: ScriptPhase, client: &ClientContext, plugin: Option<&str>) -> Url {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("v", "0");
            query.append_pair("script", phase.as_str());
            if let Some(ref arch) = client.architecture {
                query.append_pair("arch", arch);
            }
            if !client.distro.is_empty() {
                query.append_pair("distro", &client.distro);
            }
            if let Some(plugin) = plugin.filter(|p| !p.is_empty()) {
                query.append_pair("plugin", plugin);
            }
            if let Some(ref node) = client.node {
                query.append_pair("node", node);
            }
        }
        url
    }

    /// POSIX shell line that downloads and runs the script for `phase`.
    ///
    /// Inside a preseeding installer with a mounted target the script lands
    /// in `/target/tmp` and runs chrooted into the target; anywhere else it
    /// lands in `/tmp` and runs with `/bin/sh`.
    pub fn command_line(
        &self,
        phase: ScriptPhase,
        client: &ClientContext,
        plugin: Option<&str>,
    ) -> String {
        let url = self.url(phase, client, plugin);
        let file = format!("preseed_{}.sh", phase.as_str());

        format!(
            "if [ -f {log} -a -d /target ]; then echo \"Preseed environment detected\"; \
             DEST=/target/tmp/{file}; SH=\"chroot /target /bin/sh\"; \
             else echo \"Non-Preseed environment detected\"; DEST=/tmp/{file}; SH=\"/bin/sh\"; fi; \
             arch=`uname -m`; wget -q -O $DEST {url}; $SH /tmp/{file}",
            log = PRESEED_LOG,
            file = file,
            url = shell_quote(url.as_str()),
        )
    }
}

/// Quotes `value` as a single POSIX shell word.
///
/// Strings made only of characters the shell never interprets are returned
/// unchanged; everything else is wrapped in single quotes with embedded
/// single quotes written as `'\''`.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestParams;

    fn link() -> ScriptLink {
        ScriptLink::new(Url::parse("http://install.lab.example/preseed?stale=1").unwrap())
    }

    fn client(query: &str) -> ClientContext {
        ClientContext::builder("10.0.0.5".parse().unwrap())
            .apply_params(&RequestParams::parse(query))
            .build()
    }

    #[test]
    fn test_url_minimal() {
        let url = link().url(ScriptPhase::Early, &client(""), None);
        assert_eq!(url.as_str(), "http://install.lab.example/preseed?v=0&script=early");
    }

    #[test]
    fn test_url_full() {
        let ctx = client("arch=amd64&distro=bookworm&node=n7");
        let url = link().url(ScriptPhase::Late, &ctx, Some("Locale"));
        assert_eq!(
            url.as_str(),
            "http://install.lab.example/preseed?v=0&script=late&arch=amd64&distro=bookworm&plugin=Locale&node=n7"
        );
    }

    #[test]
    fn test_url_encodes_values() {
        let params = RequestParams {
            node: Some("a&b=c d".to_string()),
            ..Default::default()
        };
        let ctx = ClientContext::builder("10.0.0.5".parse().unwrap())
            .apply_params(&params)
            .build();
        let url = link().url(ScriptPhase::Early, &ctx, None);
        assert!(url.as_str().ends_with("&node=a%26b%3Dc+d"));
    }

    #[test]
    fn test_command_line() {
        let cmd = link().command_line(ScriptPhase::Early, &client(""), None);
        assert!(cmd.starts_with("if [ -f /var/lib/preseed/log -a -d /target ]; then"));
        assert!(cmd.contains("DEST=/target/tmp/preseed_early.sh; SH=\"chroot /target /bin/sh\";"));
        assert!(cmd.contains("DEST=/tmp/preseed_early.sh; SH=\"/bin/sh\"; fi;"));
        assert!(cmd.contains("wget -q -O $DEST 'http://install.lab.example/preseed?v=0&script=early';"));
        assert!(cmd.ends_with("$SH /tmp/preseed_early.sh"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain-value_1.0"), "plain-value_1.0");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
    }
}
