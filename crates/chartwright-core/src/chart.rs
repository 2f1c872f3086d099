//! Chart definition
//!
//! A [`Chart`] is consumed fully loaded: metadata, the raw text of every
//! template, default values and nested subcharts. Reading charts from disk
//! is left to the caller.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::values::Values;

/// A chart with its templates, default values and subcharts
#[derive(Debug, Clone)]
pub struct Chart {
    /// Chart metadata (Chart.yaml)
    pub metadata: ChartMetadata,

    /// Template files, relative to the chart's `templates/` directory
    pub templates: Vec<TemplateFile>,

    /// Default values (values.yaml)
    pub values: Values,

    /// Nested subcharts (the `charts/` directory)
    pub dependencies: Vec<Chart>,
}

impl Chart {
    /// Create a chart with no templates, empty values and no subcharts
    pub fn new(metadata: ChartMetadata) -> Self {
        Self {
            metadata,
            templates: Vec::new(),
            values: Values::new(),
            dependencies: Vec::new(),
        }
    }

    /// Chart name
    #[inline]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Add a template file
    pub fn with_template(mut self, name: impl Into<String>, data: impl Into<String>) -> Self {
        self.templates.push(TemplateFile::new(name, data));
        self
    }

    /// Replace the default values
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Add a subchart
    pub fn with_dependency(mut self, chart: Chart) -> Self {
        self.dependencies.push(chart);
        self
    }

    /// Look up the parent's dependency declaration for a subchart
    pub fn dependency_for(&self, subchart: &Chart) -> Option<&Dependency> {
        self.metadata
            .dependencies
            .iter()
            .find(|d| d.name == subchart.metadata.name)
    }
}

/// One template file of a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    /// Path relative to `templates/`, e.g. `deployment.yaml` or `_helpers.tpl`
    pub name: String,

    /// Raw template text
    pub data: String,
}

impl TemplateFile {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Base file name, without any directory component
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Helper files only contribute named templates and are never rendered
    pub fn is_helper(&self) -> bool {
        self.file_name().starts_with('_') || self.name.ends_with(".tpl")
    }

    /// Files that produce manifest output
    pub fn is_manifest(&self) -> bool {
        !self.is_helper() && (self.name.ends_with(".yaml") || self.name.ends_with(".yml"))
    }

    /// Whether this is the chart's NOTES.txt
    pub fn is_notes(&self) -> bool {
        self.name.eq_ignore_ascii_case("NOTES.txt")
    }
}

/// Chart kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Application,
    Library,
}

/// Chart metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (required, SemVer)
    #[serde(with = "version_serde")]
    pub version: Version,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Kubernetes version constraint
    #[serde(default)]
    pub kube_version: Option<String>,

    /// Chart type
    #[serde(default, rename = "type")]
    pub kind: ChartKind,

    /// Home URL
    #[serde(default)]
    pub home: Option<String>,

    /// Icon URL
    #[serde(default)]
    pub icon: Option<String>,

    /// Source URLs
    #[serde(default)]
    pub sources: Vec<String>,

    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Maintainers
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,

    /// Annotations
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,

    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Whether the chart is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

fn default_api_version() -> String {
    "v2".to_string()
}

impl ChartMetadata {
    /// Minimal metadata with a name and version
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            api_version: default_api_version(),
            name: name.into(),
            version,
            description: None,
            app_version: None,
            kube_version: None,
            kind: ChartKind::default(),
            home: None,
            icon: None,
            sources: Vec::new(),
            keywords: Vec::new(),
            maintainers: Vec::new(),
            annotations: Default::default(),
            dependencies: Vec::new(),
            deprecated: false,
        }
    }

    /// Parse Chart.yaml content
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let metadata: ChartMetadata = serde_yaml::from_str(yaml)?;
        if metadata.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "chart name must not be empty".to_string(),
            });
        }
        Ok(metadata)
    }
}

/// Maintainer information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Dependency declaration in the parent's metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Dependency (subchart) name
    pub name: String,

    /// Version constraint (semver)
    #[serde(default)]
    pub version: Option<String>,

    /// Repository URL
    #[serde(default)]
    pub repository: Option<String>,

    /// Runtime condition: comma-separated dotted paths into the parent values
    ///
    /// Example: `redis.enabled,global.redis.enabled`.
    #[serde(default)]
    pub condition: Option<String>,

    /// Tags for conditional inclusion, looked up under `values.tags`
    #[serde(default)]
    pub tags: Vec<String>,

    /// Alias name (overrides dependency name for values and template prefixes)
    #[serde(default)]
    pub alias: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the effective name (alias if set, otherwise name)
    #[inline]
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Evaluate `condition` against the parent values
    ///
    /// Paths are tried in order; the first one that resolves to a bool
    /// decides. Returns `None` when no path resolves to a bool.
    pub fn condition_result(&self, values: &Values) -> Option<bool> {
        let condition = self.condition.as_deref()?;
        condition
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .find_map(|path| values.get(path).and_then(|v| v.as_bool()))
    }

    /// Evaluate `tags` against `values.tags`
    ///
    /// Returns `None` when no tag is set; otherwise whether any set tag is true.
    pub fn tags_result(&self, values: &Values) -> Option<bool> {
        let tags = values.get("tags")?;
        let mut seen = false;
        for tag in &self.tags {
            if let Some(v) = tags.get(tag).and_then(|v| v.as_bool()) {
                if v {
                    return Some(true);
                }
                seen = true;
            }
        }
        seen.then_some(false)
    }
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(s.trim_start_matches('v')).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_deserialize() {
        let yaml = r#"
apiVersion: v2
name: myapp
version: 1.2.3
appVersion: "2.0"
type: application
dependencies:
  - name: redis
    version: ">=17.0.0"
    condition: redis.enabled
    tags: [cache]
    alias: cache
"#;
        let meta = ChartMetadata::from_yaml(yaml).unwrap();

        assert_eq!(meta.name, "myapp");
        assert_eq!(meta.version, Version::new(1, 2, 3));
        assert_eq!(meta.app_version.as_deref(), Some("2.0"));
        assert_eq!(meta.dependencies.len(), 1);
        assert_eq!(meta.dependencies[0].effective_name(), "cache");
        assert_eq!(meta.dependencies[0].tags, vec!["cache".to_string()]);
    }

    #[test]
    fn test_metadata_rejects_empty_name() {
        assert!(ChartMetadata::from_yaml("name: ''\nversion: 1.0.0\n").is_err());
        assert!(ChartMetadata::from_yaml("name: x\nversion: nope\n").is_err());
    }

    #[test]
    fn test_template_file_kinds() {
        assert!(TemplateFile::new("_helpers.tpl", "").is_helper());
        assert!(TemplateFile::new("sub/_partial.yaml", "").is_helper());
        assert!(TemplateFile::new("functions.tpl", "").is_helper());
        assert!(TemplateFile::new("deployment.yaml", "").is_manifest());
        assert!(TemplateFile::new("sub/svc.yml", "").is_manifest());
        assert!(!TemplateFile::new("NOTES.txt", "").is_manifest());
        assert!(TemplateFile::new("NOTES.txt", "").is_notes());
    }

    #[test]
    fn test_condition_first_bool_wins() {
        let values =
            Values::from_yaml("redis:\n  enabled: \"yes\"\nglobal:\n  redis:\n    enabled: false\n")
                .unwrap();
        let dep = Dependency {
            condition: Some("redis.enabled, global.redis.enabled".to_string()),
            ..Dependency::new("redis")
        };

        assert_eq!(dep.condition_result(&values), Some(false));
    }

    #[test]
    fn test_condition_missing_path_falls_back_to_tags() {
        let values = Values::from_yaml("tags:\n  cache: true\n").unwrap();
        let dep = Dependency {
            condition: Some("redis.enabled".to_string()),
            tags: vec!["cache".to_string()],
            ..Dependency::new("redis")
        };

        assert_eq!(dep.condition_result(&values), None);
        assert_eq!(dep.tags_result(&values), Some(true));
    }

    #[test]
    fn test_tags_all_false_disables() {
        let values = Values::from_yaml("tags:\n  a: false\n  b: false\n").unwrap();
        let dep = Dependency {
            tags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..Dependency::new("x")
        };

        assert_eq!(dep.tags_result(&values), Some(false));
    }

    #[test]
    fn test_no_condition_no_tags_is_undecided() {
        let dep = Dependency::new("x");
        assert_eq!(dep.condition_result(&Values::new()), None);
        assert_eq!(dep.tags_result(&Values::new()), None);
    }
}
