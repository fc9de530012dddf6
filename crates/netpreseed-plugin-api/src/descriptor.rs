//! Plugin definition files and their discovery.
//!
//! A plugin definition is a YAML file `<stem>.<extension>` in the plugin
//! directory. The plugin name is the stem with its first letter uppercased;
//! the file declares which compiled plugin kind it instantiates:
//!
//! ```yaml
//! kind: Directives
//! settings:
//!   preseed:
//!     - key: debian-installer/locale
//!       value: en_US
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PluginResult;

/// A discovered definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub source_path: PathBuf,
}

impl PluginDescriptor {
    /// Reads and parses the definition file.
    pub fn read_definition(&self) -> PluginResult<PluginDefinition> {
        let contents = std::fs::read_to_string(&self.source_path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// Contents of a definition file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginDefinition {
    /// Plugin kind to instantiate; a file without one declares nothing
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub settings: serde_yaml::Value,
}

/// Derives the plugin name from a file name, if the file is a definition.
///
/// `locale.yaml` gives `Locale`; `locale.yaml.bak`, `.yaml` and `locale.txt`
/// give nothing.
pub fn plugin_name(file_name: &str, extension: &str) -> Option<String> {
    let (stem, ext) = file_name.split_once('.')?;
    if stem.is_empty() || ext != extension {
        return None;
    }

    let mut chars = stem.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Lists the definition files in `dir`, sorted by plugin name.
///
/// With `filter`, only the plugin whose name matches case-insensitively is
/// returned. A missing directory yields no plugins. When two files map to
/// the same name, the first in sorted file-name order wins.
pub fn discover(
    dir: &Path,
    extension: &str,
    filter: Option<&str>,
) -> PluginResult<Vec<PluginDescriptor>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!("Plugin directory does not exist: {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        files.push((file_name, path));
    }
    files.sort();

    let mut descriptors: Vec<PluginDescriptor> = Vec::new();
    for (file_name, path) in files {
        let Some(name) = plugin_name(&file_name, extension) else {
            continue;
        };
        if let Some(wanted) = filter {
            if !wanted.eq_ignore_ascii_case(&name) {
                continue;
            }
        }
        if descriptors.iter().any(|d| d.name == name) {
            tracing::warn!(plugin = %name, path = %path.display(), "Duplicate plugin name, file ignored");
            continue;
        }
        descriptors.push(PluginDescriptor {
            name,
            source_path: path,
        });
    }

    descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_plugin_name() {
        assert_eq!(plugin_name("locale.yaml", "yaml").as_deref(), Some("Locale"));
        assert_eq!(plugin_name("netcfg.yaml", "yaml").as_deref(), Some("Netcfg"));
        assert_eq!(plugin_name("Mirror.yaml", "yaml").as_deref(), Some("Mirror"));
        assert_eq!(plugin_name("locale.yaml.bak", "yaml"), None);
        assert_eq!(plugin_name("locale.txt", "yaml"), None);
        assert_eq!(plugin_name(".yaml", "yaml"), None);
        assert_eq!(plugin_name("README", "yaml"), None);
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["zeta.yaml", "alpha.yaml", "notes.txt", "mirror.yaml"] {
            fs::write(dir.path().join(file), "kind: Directives\n").unwrap();
        }
        fs::create_dir(dir.path().join("sub.yaml")).unwrap();

        let all = discover(dir.path(), "yaml", None).unwrap();
        let names: Vec<_> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Mirror", "Zeta"]);

        let one = discover(dir.path(), "yaml", Some("MIRROR")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "Mirror");
        assert!(one[0].source_path.ends_with("mirror.yaml"));
    }

    #[test]
    fn test_discover_missing_directory() {
        let all = discover(Path::new("/nonexistent/netpreseed/plugins"), "yaml", None).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Locale.yaml"), "kind: Directives\n").unwrap();
        fs::write(dir.path().join("locale.yaml"), "kind: Netcfg\n").unwrap();

        let all = discover(dir.path(), "yaml", None).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].source_path.ends_with("Locale.yaml"));
    }

    #[test]
    fn test_read_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locale.yaml");
        fs::write(&path, "kind: Directives\nsettings:\n  preseed: []\n").unwrap();

        let descriptor = PluginDescriptor {
            name: "Locale".to_string(),
            source_path: path,
        };
        let definition = descriptor.read_definition().unwrap();
        assert_eq!(definition.kind.as_deref(), Some("Directives"));
        assert!(definition.settings.is_mapping());
    }
}
