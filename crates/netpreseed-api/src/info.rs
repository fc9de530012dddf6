//! Diagnostic page for `?info` requests.
//!
//! Shows what the service resolved for the caller without touching the
//! directory, so it works even when LDAP is down.

use netpreseed_core::{ClientContext, RequestParams};
use netpreseed_plugin_api::PluginDescriptor;
use std::fmt::Write;

/// Everything the page shows.
pub struct InfoPage<'a> {
    pub client: &'a ClientContext,
    pub params: &'a RequestParams,
    pub plugins: &'a [PluginDescriptor],
    pub kinds: &'a [&'a str],
    pub request_headers: Vec<(String, String)>,
}

impl InfoPage<'_> {
    pub fn render(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html><head><title>netpreseed info</title></head><body>\n");
        let _ = writeln!(
            html,
            "<h1>netpreseed {}</h1>",
            escape(env!("CARGO_PKG_VERSION"))
        );

        let client = self.client;
        let arch = client.architecture.as_deref().unwrap_or("");
        let node = client.node.as_deref().unwrap_or("");
        let classes = client.classes.join(", ");
        table(
            &mut html,
            "Client",
            &[
                ("IP address", client.ip.to_string().as_str()),
                ("Reverse name", client.reverse_name.as_str()),
                ("Name", client.name.as_str()),
                ("Hostname", client.derived_hostname.as_str()),
                ("Domain", client.domain().unwrap_or("")),
                ("Hardware address", client.hardware_address.as_str()),
                ("Architecture", arch),
                ("Distribution", client.distro.as_str()),
                ("Node", node),
                ("Classes (before directory)", classes.as_str()),
            ],
        );

        let params = self.params;
        let explicit_classes = params.classes.join(", ");
        table(
            &mut html,
            "Parameters",
            &[
                ("client", params.client.as_deref().unwrap_or("")),
                ("class", explicit_classes.as_str()),
                ("node", params.node.as_deref().unwrap_or("")),
                ("arch", params.arch.as_deref().unwrap_or("")),
                ("distro", params.distro.as_deref().unwrap_or("")),
                ("plugin", params.plugin.as_deref().unwrap_or("")),
                ("script", params.script.as_deref().unwrap_or("")),
                ("v", params.version.as_deref().unwrap_or("")),
            ],
        );

        let plugin_rows: Vec<(String, String)> = self
            .plugins
            .iter()
            .map(|p| (p.name.clone(), p.source_path.display().to_string()))
            .collect();
        let plugin_rows: Vec<(&str, &str)> = plugin_rows
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_str()))
            .collect();
        table(&mut html, "Plugin definitions", &plugin_rows);

        let kinds = self.kinds.join(", ");
        table(&mut html, "Plugin kinds", &[("Registered", kinds.as_str())]);

        let header_rows: Vec<(&str, &str)> = self
            .request_headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        table(&mut html, "Request headers", &header_rows);

        html.push_str("</body></html>\n");
        html
    }
}

fn table(html: &mut String, title: &str, rows: &[(&str, &str)]) {
    let _ = writeln!(html, "<h2>{}</h2>", escape(title));
    html.push_str("<table>\n");
    for (key, value) in rows {
        let _ = writeln!(
            html,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape(key),
            escape(value)
        );
    }
    html.push_str("</table>\n");
}

/// Escapes text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_render_escapes_parameters() {
        let params = RequestParams {
            classes: vec!["<script>".to_string()],
            node: Some("n7".to_string()),
            ..Default::default()
        };
        let client = ClientContext::builder("10.0.0.5".parse().unwrap())
            .apply_params(&params)
            .build();
        let page = InfoPage {
            client: &client,
            params: &params,
            plugins: &[],
            kinds: &["Directives"],
            request_headers: vec![("host".to_string(), "install.lab.example".to_string())],
        };

        let html = page.render();
        assert!(html.contains("<tr><th>IP address</th><td>10.0.0.5</td></tr>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<tr><th>Registered</th><td>Directives</td></tr>"));
        assert!(html.contains("<tr><th>host</th><td>install.lab.example</td></tr>"));
    }
}
