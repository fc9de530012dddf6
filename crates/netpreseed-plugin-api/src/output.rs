//! Line-oriented response text.
//!
//! The driver and every plugin write into one `Output`; lines come out in
//! call order.

use serde::{Deserialize, Serialize};

/// Accumulates the lines of a preseed file or shell script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    lines: Vec<String>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw line. Embedded newlines are kept as-is.
    pub fn line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    /// Appends every line of a multi-line block.
    pub fn text(&mut self, block: &str) -> &mut Self {
        for line in block.lines() {
            self.line(line);
        }
        self
    }

    /// Appends `# text`.
    pub fn comment(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(format!("# {}", text.as_ref()))
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    /// Appends a banner block: `#`, `# title`, `#` and a blank line.
    pub fn section(&mut self, title: impl AsRef<str>) -> &mut Self {
        self.line("#").comment(title).line("#").blank()
    }

    /// Appends an installer directive line.
    pub fn directive(&mut self, directive: &Directive) -> &mut Self {
        self.line(directive.to_string())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Joins the lines with `\n`, with a trailing newline.
    pub fn render(&self) -> String {
        let mut text = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// One debconf answer: `<owner> <key> <type> <value>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    #[serde(default = "default_owner")]
    pub owner: String,
    pub key: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

fn default_owner() -> String {
    "d-i".to_string()
}

fn default_type() -> String {
    "string".to_string()
}

impl Directive {
    /// A `d-i <key> string <value>` directive.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            owner: default_owner(),
            key: key.into(),
            kind: default_type(),
            value: value.into(),
        }
    }

    /// A `d-i <key> boolean <true|false>` directive.
    pub fn boolean(key: impl Into<String>, value: bool) -> Self {
        Self {
            owner: default_owner(),
            key: key.into(),
            kind: "boolean".to_string(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.owner, self.key, self.kind)?;
        if !self.value.is_empty() {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_order() {
        let mut out = Output::new();
        out.comment("header").blank().line("echo hi");
        assert_eq!(out.render(), "# header\n\necho hi\n");
    }

    #[test]
    fn test_text_block_split() {
        let mut out = Output::new();
        out.text("a() {\n  true\n}");
        assert_eq!(out.lines().len(), 3);
        assert_eq!(out.render(), "a() {\n  true\n}\n");
    }

    #[test]
    fn test_section_layout() {
        let mut out = Output::new();
        out.section("Initialize Plugins");
        assert_eq!(out.render(), "#\n# Initialize Plugins\n#\n\n");
    }

    #[test]
    fn test_directive_formatting() {
        assert_eq!(
            Directive::string("netcfg/get_hostname", "host1").to_string(),
            "d-i netcfg/get_hostname string host1"
        );
        assert_eq!(
            Directive::boolean("clock-setup/utc", true).to_string(),
            "d-i clock-setup/utc boolean true"
        );
        assert_eq!(
            Directive::string("netcfg/wireless_wep", "").to_string(),
            "d-i netcfg/wireless_wep string"
        );
    }

    #[test]
    fn test_directive_yaml_defaults() {
        let directive: Directive =
            serde_yaml::from_str("key: debian-installer/locale\nvalue: en_US").unwrap();
        assert_eq!(directive, Directive::string("debian-installer/locale", "en_US"));
    }

    #[test]
    fn test_empty_output() {
        let out = Output::new();
        assert!(out.is_empty());
        assert_eq!(out.render(), "");
    }
}
