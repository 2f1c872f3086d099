//! Release information exposed to templates as `.Release`

use serde::{Deserialize, Serialize};

/// Service name reported by `.Release.Service`
pub const DEFAULT_SERVICE: &str = "Helm";

/// Release information for templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Name of the service performing the release
    pub service: String,
}

impl Default for ReleaseInfo {
    fn default() -> Self {
        Self::for_install("release-name", "default")
    }
}

impl ReleaseInfo {
    /// Create release info for a new install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: DEFAULT_SERVICE.to_string(),
        }
    }

    /// Create release info for an upgrade
    pub fn for_upgrade(name: &str, namespace: &str, revision: u32) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision,
            is_install: false,
            is_upgrade: true,
            service: DEFAULT_SERVICE.to_string(),
        }
    }

    /// Override the service name
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_serializes_pascal_case() {
        let release = ReleaseInfo::for_upgrade("web", "prod", 4);
        let json = serde_json::to_value(&release).unwrap();

        assert_eq!(json["Name"], "web");
        assert_eq!(json["Namespace"], "prod");
        assert_eq!(json["Revision"], 4);
        assert_eq!(json["IsInstall"], false);
        assert_eq!(json["IsUpgrade"], true);
        assert_eq!(json["Service"], "Helm");
    }
}
