//! Template rendering context

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::chart::{ChartKind, ChartMetadata};
use crate::release::ReleaseInfo;
use crate::values::Values;

/// The top-level dot handed to every template of one chart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenderContext {
    /// Merged values
    pub values: JsonValue,

    /// Release information
    pub release: ReleaseInfo,

    /// Chart metadata
    pub chart: ChartInfo,

    /// Cluster capabilities
    pub capabilities: Capabilities,

    /// Current template info
    pub template: TemplateInfo,
}

/// Chart information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChartInfo {
    pub name: String,
    pub version: String,
    pub app_version: String,
    pub description: String,
    #[serde(rename = "APIVersion")]
    pub api_version: String,
    pub kube_version: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub home: String,
    pub icon: String,
    pub keywords: Vec<String>,
    pub sources: Vec<String>,
    pub annotations: std::collections::BTreeMap<String, String>,
    pub deprecated: bool,
}

impl From<&ChartMetadata> for ChartInfo {
    fn from(meta: &ChartMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version.to_string(),
            app_version: meta.app_version.clone().unwrap_or_default(),
            description: meta.description.clone().unwrap_or_default(),
            api_version: meta.api_version.clone(),
            kube_version: meta.kube_version.clone().unwrap_or_default(),
            kind: match meta.kind {
                ChartKind::Application => "application".to_string(),
                ChartKind::Library => "library".to_string(),
            },
            home: meta.home.clone().unwrap_or_default(),
            icon: meta.icon.clone().unwrap_or_default(),
            keywords: meta.keywords.clone(),
            sources: meta.sources.clone(),
            annotations: meta.annotations.clone(),
            deprecated: meta.deprecated,
        }
    }
}

/// Cluster capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    /// Kubernetes version
    pub kube_version: KubeVersion,

    /// Available API versions
    #[serde(rename = "APIVersions")]
    pub api_versions: Vec<String>,

    /// Version of the renderer pretending to be Helm
    pub helm_version: HelmVersion,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            kube_version: KubeVersion::default(),
            api_versions: DEFAULT_API_VERSIONS.iter().map(|s| s.to_string()).collect(),
            helm_version: HelmVersion::default(),
        }
    }
}

impl Capabilities {
    /// Capabilities for a given Kubernetes version with the default API list
    pub fn for_kube_version(version: &str) -> Self {
        Self {
            kube_version: KubeVersion::new(version),
            ..Self::default()
        }
    }

    /// Add an API version (`group/version` or `group/version/Kind`)
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_versions.push(api_version.into());
        self
    }
}

const DEFAULT_API_VERSIONS: &[&str] = &[
    "v1",
    "apps/v1",
    "batch/v1",
    "autoscaling/v1",
    "autoscaling/v2",
    "policy/v1",
    "networking.k8s.io/v1",
    "rbac.authorization.k8s.io/v1",
    "storage.k8s.io/v1",
    "apiextensions.k8s.io/v1",
    "admissionregistration.k8s.io/v1",
    "coordination.k8s.io/v1",
    "scheduling.k8s.io/v1",
];

/// Kubernetes version info
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KubeVersion {
    pub version: String,
    pub major: String,
    pub minor: String,
    pub git_version: String,
}

impl Default for KubeVersion {
    fn default() -> Self {
        // Default to a recent stable Kubernetes version for offline rendering
        Self::new("v1.28.0")
    }
}

impl KubeVersion {
    pub fn new(version: &str) -> Self {
        let version = version.trim_start_matches('v');
        let parts: Vec<&str> = version.split('.').collect();

        Self {
            version: format!("v{}", version),
            major: parts.first().unwrap_or(&"1").to_string(),
            minor: parts.get(1).unwrap_or(&"28").to_string(),
            git_version: format!("v{}", version),
        }
    }
}

/// Helm version info
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HelmVersion {
    pub version: String,
    pub git_commit: String,
    pub git_tree_state: String,
    pub go_version: String,
}

impl Default for HelmVersion {
    fn default() -> Self {
        Self {
            version: "v3.14.0".to_string(),
            git_commit: String::new(),
            git_tree_state: "clean".to_string(),
            go_version: "go1.21".to_string(),
        }
    }
}

/// Current template information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateInfo {
    /// Template name (`<chart>/templates/<file>`)
    pub name: String,

    /// Base path (`<chart>/templates`)
    pub base_path: String,
}

impl RenderContext {
    /// Create a new render context
    pub fn new(values: Values, release: ReleaseInfo, chart: &ChartMetadata) -> Self {
        Self {
            values: values.into_inner(),
            release,
            chart: ChartInfo::from(chart),
            capabilities: Capabilities::default(),
            template: TemplateInfo::default(),
        }
    }

    /// Set the current template info
    pub fn with_template(mut self, name: &str, base_path: &str) -> Self {
        self.template = TemplateInfo {
            name: name.to_string(),
            base_path: base_path.to_string(),
        };
        self
    }

    /// Set capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Convert to the JSON tree templates are evaluated against
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_render_context_keys() {
        let values = Values::from_yaml("replicas: 3").unwrap();
        let release = ReleaseInfo::for_install("myapp", "default");
        let mut meta = ChartMetadata::new("mychart", Version::new(1, 0, 0));
        meta.app_version = Some("2.1".to_string());

        let ctx = RenderContext::new(values, release, &meta)
            .with_template("mychart/templates/cm.yaml", "mychart/templates");
        let json = ctx.to_json();

        assert_eq!(json["Values"]["replicas"], 3);
        assert_eq!(json["Release"]["Name"], "myapp");
        assert_eq!(json["Chart"]["Name"], "mychart");
        assert_eq!(json["Chart"]["Version"], "1.0.0");
        assert_eq!(json["Chart"]["AppVersion"], "2.1");
        assert_eq!(json["Chart"]["APIVersion"], "v2");
        assert_eq!(json["Template"]["Name"], "mychart/templates/cm.yaml");
        assert_eq!(json["Template"]["BasePath"], "mychart/templates");
        assert_eq!(json["Capabilities"]["KubeVersion"]["Version"], "v1.28.0");
        assert_eq!(json["Capabilities"]["KubeVersion"]["Minor"], "28");
        assert!(json["Capabilities"]["APIVersions"].is_array());
    }

    #[test]
    fn test_kube_version_parse() {
        let kv = KubeVersion::new("1.30.2");
        assert_eq!(kv.version, "v1.30.2");
        assert_eq!(kv.major, "1");
        assert_eq!(kv.minor, "30");
        assert_eq!(kv.git_version, "v1.30.2");
    }
}
