//! Core types for the netpreseed generator.
//!
//! This module defines the request parameters an installer sends, the output
//! mode they select, and the resolved facts about the requesting client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::warn;

/// Class every client belongs to.
pub const DEFAULT_CLASS: &str = "default";

/// Phase of the installer a generated shell script runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptPhase {
    /// Runs before the installation starts (`preseed/early_command`)
    Early,
    /// Runs just before the installer finishes (`preseed/late_command`)
    Late,
}

impl ScriptPhase {
    /// Returns the query/file-name form of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptPhase::Early => "early",
            ScriptPhase::Late => "late",
        }
    }
}

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "early" => Ok(ScriptPhase::Early),
            "late" => Ok(ScriptPhase::Late),
            other => Err(format!("unknown script phase: {}", other)),
        }
    }
}

/// What a request asks to be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Installer directives (no `script` parameter)
    Preseed,
    /// Shell script for a known phase
    Script(ScriptPhase),
    /// `script` was given with a value that names no phase
    UnknownScript(String),
}

impl OutputMode {
    /// Returns true for any script mode, known phase or not.
    pub fn is_script(&self) -> bool {
        !matches!(self, OutputMode::Preseed)
    }
}

/// Parameters of a preseed request, decoded from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestParams {
    /// Overrides the client name used for the directory search
    pub client: Option<String>,
    /// Explicit classes, in the order given
    pub classes: Vec<String>,
    /// Node identifier, also added as a class
    pub node: Option<String>,
    pub arch: Option<String>,
    pub distro: Option<String>,
    /// Restricts loading to one plugin (case-insensitive)
    pub plugin: Option<String>,
    /// Raw `script` value; presence selects script mode
    pub script: Option<String>,
    /// Diagnostic page requested
    pub info: bool,
    /// Protocol tag (`v`), carried but not interpreted
    pub version: Option<String>,
}

impl RequestParams {
    /// Decodes a form-encoded query string (without the leading `?`).
    ///
    /// `class` may repeat; for every other key the last occurrence wins.
    /// Empty values count as absent, except for `script` and `info`.
    ///
    /// Values end up in line-oriented output and shell scripts, so a value
    /// holding anything outside [`is_safe_value`] is dropped as if absent.
    /// `script` and `v` keep their presence with unsafe characters removed.
    pub fn parse(query: &str) -> Self {
        let mut params = RequestParams::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "client" => params.client = checked(&key, value),
                "class" => {
                    if let Some(class) = checked(&key, value) {
                        params.classes.push(class);
                    }
                }
                "node" => params.node = checked(&key, value),
                "arch" => params.arch = checked(&key, value),
                "distro" => params.distro = checked(&key, value),
                "plugin" => params.plugin = checked(&key, value),
                "script" => params.script = Some(strip_unsafe(value)),
                "info" => params.info = true,
                "v" => params.version = Some(strip_unsafe(value)),
                _ => {}
            }
        }

        params
    }

    /// Returns the output mode selected by the `script` parameter.
    pub fn output_mode(&self) -> OutputMode {
        match self.script.as_deref() {
            None => OutputMode::Preseed,
            Some(raw) => match raw.parse::<ScriptPhase>() {
                Ok(phase) => OutputMode::Script(phase),
                Err(_) => OutputMode::UnknownScript(raw.to_string()),
            },
        }
    }
}

/// Returns true if `value` only holds characters that are inert in both
/// installer directives and shell: ASCII letters, digits and `.-_:+@`.
pub fn is_safe_value(value: &str) -> bool {
    value.chars().all(is_safe_char)
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '+' | '@')
}

fn checked(key: &str, value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else if is_safe_value(&value) {
        Some(value)
    } else {
        warn!(parameter = %key, value = ?value, "Ignoring parameter with unsafe characters");
        None
    }
}

fn strip_unsafe(value: String) -> String {
    if is_safe_value(&value) {
        value
    } else {
        value.chars().filter(|c| is_safe_char(*c)).collect()
    }
}

/// Resolved facts about the requesting host.
///
/// Built once per request by [`ClientContextBuilder`] and shared read-only
/// with every plugin afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientContext {
    pub ip: IpAddr,
    /// Name from reverse DNS, or the textual IP when the lookup failed
    pub reverse_name: String,
    /// Effective client name: `client` parameter or the reverse name
    pub name: String,
    /// First label of the reverse name
    pub derived_hostname: String,
    /// Hardware address, empty when unknown
    pub hardware_address: String,
    /// Accumulated classes, starting with `default`; not deduplicated
    pub classes: Vec<String>,
    pub architecture: Option<String>,
    pub distro: String,
    pub node: Option<String>,
}

impl ClientContext {
    /// Starts building the context for a client address.
    pub fn builder(ip: IpAddr) -> ClientContextBuilder {
        ClientContextBuilder::new(ip)
    }

    /// Returns true if the client is a member of `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Domain part of the reverse name, if the name has more than one label.
    pub fn domain(&self) -> Option<&str> {
        if self.reverse_name.parse::<IpAddr>().is_ok() {
            return None;
        }
        self.reverse_name
            .split_once('.')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }

    /// Substitutes `{name}`, `{hostname}`, `{domain}`, `{ip}`, `{hwaddr}`,
    /// `{arch}`, `{distro}` and `{node}` in `template`. Unknown values expand
    /// to the empty string; unknown placeholders are kept verbatim.
    ///
    /// The template is scanned once, so substituted text is never expanded
    /// again.
    pub fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let value = after
                .find('}')
                .and_then(|end| self.placeholder(&after[..end]).map(|v| (end, v)));
            match value {
                Some((end, value)) => {
                    out.push_str(&value);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn placeholder(&self, key: &str) -> Option<String> {
        let value = match key {
            "name" => self.name.clone(),
            "hostname" => self.derived_hostname.clone(),
            "domain" => self.domain().unwrap_or_default().to_string(),
            "ip" => self.ip.to_string(),
            "hwaddr" => self.hardware_address.clone(),
            "arch" => self.architecture.clone().unwrap_or_default(),
            "distro" => self.distro.clone(),
            "node" => self.node.clone().unwrap_or_default(),
            _ => return None,
        };
        Some(value)
    }
}

/// Builder for [`ClientContext`].
///
/// Classes accumulate in call order: `default`, explicit `class` parameters,
/// the `node`, then whatever [`extend_classes`](Self::extend_classes) adds.
#[derive(Debug, Clone)]
pub struct ClientContextBuilder {
    ip: IpAddr,
    reverse_name: Option<String>,
    client_override: Option<String>,
    hardware_address: String,
    classes: Vec<String>,
    architecture: Option<String>,
    distro: String,
    node: Option<String>,
}

impl ClientContextBuilder {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            reverse_name: None,
            client_override: None,
            hardware_address: String::new(),
            classes: vec![DEFAULT_CLASS.to_string()],
            architecture: None,
            distro: String::new(),
            node: None,
        }
    }

    /// Sets the reverse DNS name; `None` keeps the textual IP. A name with
    /// characters outside [`is_safe_value`] counts as a failed lookup.
    pub fn reverse_name(mut self, name: Option<String>) -> Self {
        self.reverse_name = name.filter(|n| !n.is_empty() && is_safe_value(n));
        self
    }

    /// Sets the hardware address; `None` leaves it empty.
    pub fn hardware_address(mut self, hwaddr: Option<String>) -> Self {
        self.hardware_address = hwaddr.unwrap_or_default();
        self
    }

    /// Applies the request overrides and explicit classes.
    pub fn apply_params(mut self, params: &RequestParams) -> Self {
        if let Some(ref client) = params.client {
            self.client_override = Some(client.clone());
        }
        self.classes.extend(params.classes.iter().cloned());
        if let Some(ref node) = params.node {
            self.classes.push(node.clone());
            self.node = Some(node.clone());
        }
        if let Some(ref arch) = params.arch {
            self.architecture = Some(arch.clone());
        }
        if let Some(ref distro) = params.distro {
            self.distro = distro.clone();
        }
        self
    }

    /// Name the directory search should use for this client.
    pub fn lookup_name(&self) -> String {
        self.client_override
            .clone()
            .unwrap_or_else(|| self.resolved_reverse_name())
    }

    /// Appends classes found in the directory.
    pub fn extend_classes<I>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.classes.extend(classes);
        self
    }

    pub fn build(self) -> ClientContext {
        let reverse_name = self.resolved_reverse_name();
        let derived_hostname = derive_hostname(&reverse_name);
        let name = self.client_override.unwrap_or_else(|| reverse_name.clone());

        ClientContext {
            ip: self.ip,
            reverse_name,
            name,
            derived_hostname,
            hardware_address: self.hardware_address,
            classes: self.classes,
            architecture: self.architecture,
            distro: self.distro,
            node: self.node,
        }
    }

    fn resolved_reverse_name(&self) -> String {
        self.reverse_name
            .clone()
            .unwrap_or_else(|| self.ip.to_string())
    }
}

/// First DNS label of `name`; an IP literal is returned whole.
pub fn derive_hostname(name: &str) -> String {
    if name.parse::<IpAddr>().is_ok() {
        return name.to_string();
    }
    name.split('.').next().unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[test]
    fn test_parse_params() {
        let params = RequestParams::parse(
            "v=0&client=host1&class=labX&class=gpu&node=n7&arch=amd64&distro=bookworm&plugin=locale&script=early",
        );
        assert_eq!(params.client.as_deref(), Some("host1"));
        assert_eq!(params.classes, vec!["labX", "gpu"]);
        assert_eq!(params.node.as_deref(), Some("n7"));
        assert_eq!(params.arch.as_deref(), Some("amd64"));
        assert_eq!(params.distro.as_deref(), Some("bookworm"));
        assert_eq!(params.plugin.as_deref(), Some("locale"));
        assert_eq!(params.version.as_deref(), Some("0"));
        assert_eq!(params.output_mode(), OutputMode::Script(ScriptPhase::Early));
        assert!(!params.info);
    }

    #[test]
    fn test_parse_decodes_and_ignores_unknown() {
        let params = RequestParams::parse("client=host%2D1&foo=bar&info");
        assert_eq!(params.client.as_deref(), Some("host-1"));
        assert!(params.info);
    }

    #[test]
    fn test_parse_drops_values_with_line_breaks_or_shell_syntax() {
        let params = RequestParams::parse(
            "client=%24(reboot)&distro=x%0Ad-i%20passwd/root-password&arch=amd64%0D&node=n7%3Becho&class=a%20b&class=web&plugin=%60id%60",
        );
        assert_eq!(params.client, None);
        assert_eq!(params.distro, None);
        assert_eq!(params.arch, None);
        assert_eq!(params.node, None);
        assert_eq!(params.plugin, None);
        assert_eq!(params.classes, vec!["web"]);
    }

    #[test]
    fn test_parse_strips_unsafe_script_and_version() {
        let params = RequestParams::parse("script=mid%0Adle&v=0%0A1");
        assert_eq!(params.output_mode(), OutputMode::UnknownScript("middle".to_string()));
        assert_eq!(params.version.as_deref(), Some("01"));

        let params = RequestParams::parse("script=late%0A");
        assert_eq!(params.output_mode(), OutputMode::Script(ScriptPhase::Late));
    }

    #[test]
    fn test_unsafe_reverse_name_counts_as_failed_lookup() {
        let ctx = ClientContext::builder(ip())
            .reverse_name(Some("host1\nd-i.example".to_string()))
            .build();
        assert_eq!(ctx.reverse_name, "10.0.0.5");
    }

    #[test]
    fn test_output_modes() {
        assert_eq!(RequestParams::parse("").output_mode(), OutputMode::Preseed);
        assert_eq!(
            RequestParams::parse("script=late").output_mode(),
            OutputMode::Script(ScriptPhase::Late)
        );
        let unknown = RequestParams::parse("script=middle").output_mode();
        assert_eq!(unknown, OutputMode::UnknownScript("middle".to_string()));
        assert!(unknown.is_script());
    }

    #[test]
    fn test_classes_without_directory_entries() {
        let params = RequestParams::parse("class=web&node=n7&class=db");
        let ctx = ClientContext::builder(ip()).apply_params(&params).build();
        assert_eq!(ctx.classes, vec!["default", "web", "db", "n7"]);
        assert_eq!(ctx.node.as_deref(), Some("n7"));
    }

    #[test]
    fn test_no_params_only_default() {
        let ctx = ClientContext::builder(ip()).build();
        assert_eq!(ctx.classes, vec![DEFAULT_CLASS]);
    }

    #[test]
    fn test_directory_classes_appended_last() {
        let params = RequestParams::parse("class=web");
        let ctx = ClientContext::builder(ip())
            .apply_params(&params)
            .extend_classes(vec!["labX".to_string(), "gpu".to_string()])
            .build();
        assert_eq!(ctx.classes, vec!["default", "web", "labX", "gpu"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let params = RequestParams::parse("class=default");
        let ctx = ClientContext::builder(ip()).apply_params(&params).build();
        assert_eq!(ctx.classes, vec!["default", "default"]);
    }

    #[test]
    fn test_hostname_derivation() {
        let ctx = ClientContext::builder(ip())
            .reverse_name(Some("host1.lab.example".to_string()))
            .build();
        assert_eq!(ctx.derived_hostname, "host1");
        assert_eq!(ctx.name, "host1.lab.example");
        assert_eq!(ctx.domain(), Some("lab.example"));
    }

    #[test]
    fn test_failed_reverse_lookup_uses_ip() {
        let ctx = ClientContext::builder(ip()).reverse_name(None).build();
        assert_eq!(ctx.reverse_name, "10.0.0.5");
        assert_eq!(ctx.derived_hostname, "10.0.0.5");
        assert_eq!(ctx.domain(), None);
        assert_eq!(ctx.hardware_address, "");
    }

    #[test]
    fn test_client_override_keeps_reverse_facts() {
        let params = RequestParams::parse("client=other.lab.example");
        let builder = ClientContext::builder(ip())
            .reverse_name(Some("host1.lab.example".to_string()))
            .apply_params(&params);
        assert_eq!(builder.lookup_name(), "other.lab.example");

        let ctx = builder.build();
        assert_eq!(ctx.name, "other.lab.example");
        assert_eq!(ctx.reverse_name, "host1.lab.example");
        assert_eq!(ctx.derived_hostname, "host1");
    }

    #[test]
    fn test_expand_template() {
        let params = RequestParams::parse("arch=amd64&node=n7");
        let ctx = ClientContext::builder(ip())
            .reverse_name(Some("host1.lab.example".to_string()))
            .hardware_address(Some("aa:bb:cc:dd:ee:ff".to_string()))
            .apply_params(&params)
            .build();
        assert_eq!(
            ctx.expand("{hostname}.{domain} {ip} {hwaddr} {arch} {node} [{distro}]"),
            "host1.lab.example 10.0.0.5 aa:bb:cc:dd:ee:ff amd64 n7 []"
        );
        assert_eq!(ctx.expand("no placeholders"), "no placeholders");
        assert_eq!(ctx.expand("{unknown} {name"), "{unknown} {name");
        assert_eq!(ctx.expand("${{ip}}"), "${10.0.0.5}");
    }

    #[test]
    fn test_expand_does_not_rescan_substituted_values() {
        let params = RequestParams {
            client: Some("{hwaddr}".to_string()),
            node: Some("{ip}".to_string()),
            ..Default::default()
        };
        let ctx = ClientContext::builder(ip())
            .hardware_address(Some("aa:bb:cc:dd:ee:ff".to_string()))
            .apply_params(&params)
            .build();
        assert_eq!(ctx.name, "{hwaddr}");
        assert_eq!(ctx.expand("{name}"), "{hwaddr}");
        assert_eq!(ctx.expand("{node}-{hwaddr}"), "{ip}-aa:bb:cc:dd:ee:ff");
    }
}
