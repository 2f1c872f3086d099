//! Subchart resolution and configuration
//!
//! Decides, for each subchart of a chart, the name it is scoped under and
//! whether it renders given the parent's merged values.

use chartwright_core::{Chart, Dependency, Values, json_truthy};

/// Configuration for subchart rendering
#[derive(Debug, Clone)]
pub struct SubchartConfig {
    /// Maximum depth for nested subcharts (default: 10)
    pub max_depth: usize,
}

impl Default for SubchartConfig {
    fn default() -> Self {
        Self { max_depth: 10 }
    }
}

impl SubchartConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum depth for nested subcharts
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// A subchart together with the parent's decision about it
#[derive(Debug)]
pub struct SubchartInfo<'c> {
    /// Effective name (alias if set, otherwise chart name)
    pub name: String,

    pub chart: &'c Chart,

    /// The dependency declaration from the parent metadata (if any)
    pub dependency: Option<&'c Dependency>,

    /// Whether enabled after evaluating condition, tags and `enabled`
    pub enabled: bool,

    /// Reason if disabled
    pub disabled_reason: Option<String>,
}

impl<'c> SubchartInfo<'c> {
    /// Resolve a subchart against the parent's merged values
    pub fn resolve(parent: &'c Chart, chart: &'c Chart, parent_values: &Values) -> Self {
        let dependency = parent.dependency_for(chart);
        let name = dependency
            .map(|d| d.effective_name().to_string())
            .unwrap_or_else(|| chart.name().to_string());
        let disabled_reason = disabled_reason(&name, dependency, parent_values);

        Self {
            name,
            chart,
            dependency,
            enabled: disabled_reason.is_none(),
            disabled_reason,
        }
    }
}

/// Condition first, then tags, then `values[name].enabled`
fn disabled_reason(
    name: &str,
    dependency: Option<&Dependency>,
    values: &Values,
) -> Option<String> {
    if let Some(dep) = dependency {
        if let Some(enabled) = dep.condition_result(values) {
            if !enabled {
                let condition = dep.condition.as_deref().unwrap_or_default();
                return Some(format!("condition '{}' evaluated to false", condition));
            }
        } else if dep.tags_result(values) == Some(false) {
            return Some(format!("tags {:?} are all false", dep.tags));
        }
    }

    let flag = values.get(&format!("{}.enabled", name))?;
    (!json_truthy(flag)).then(|| format!("'{}.enabled' is {}", name, flag))
}

/// Result of resolving every subchart of one chart
#[derive(Debug, Default)]
pub struct DiscoveryResult<'c> {
    /// Subcharts in declaration order
    pub subcharts: Vec<SubchartInfo<'c>>,
}

impl<'c> DiscoveryResult<'c> {
    /// Resolve every subchart of `parent`
    pub fn discover(parent: &'c Chart, parent_values: &Values) -> Self {
        Self {
            subcharts: parent
                .dependencies
                .iter()
                .map(|sub| SubchartInfo::resolve(parent, sub, parent_values))
                .collect(),
        }
    }

    /// Get enabled subcharts only
    pub fn enabled_subcharts(&self) -> impl Iterator<Item = &SubchartInfo<'c>> {
        self.subcharts.iter().filter(|s| s.enabled)
    }

    /// Get disabled subcharts only
    pub fn disabled_subcharts(&self) -> impl Iterator<Item = &SubchartInfo<'c>> {
        self.subcharts.iter().filter(|s| !s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwright_core::ChartMetadata;
    use semver::Version;

    fn chart(name: &str) -> Chart {
        Chart::new(ChartMetadata::new(name, Version::new(1, 0, 0)))
    }

    fn parent_with(dep: Dependency) -> Chart {
        let mut parent = chart("app");
        parent.metadata.dependencies.push(dep);
        parent.with_dependency(chart("redis"))
    }

    #[test]
    fn test_subchart_config_default() {
        assert_eq!(SubchartConfig::default().max_depth, 10);
        assert_eq!(SubchartConfig::new().with_max_depth(3).max_depth, 3);
    }

    #[test]
    fn test_undeclared_subchart_enabled() {
        let parent = chart("app").with_dependency(chart("redis"));
        let found = DiscoveryResult::discover(&parent, &Values::new());
        assert_eq!(found.enabled_subcharts().count(), 1);
        assert_eq!(found.subcharts[0].name, "redis");
        assert!(found.subcharts[0].dependency.is_none());
    }

    #[test]
    fn test_enabled_flag_false_disables() {
        let parent = chart("app").with_dependency(chart("redis"));
        let values = Values::from_yaml("redis:\n  enabled: false").unwrap();
        let found = DiscoveryResult::discover(&parent, &values);
        let info = &found.subcharts[0];
        assert!(!info.enabled);
        assert_eq!(info.disabled_reason.as_deref(), Some("'redis.enabled' is false"));
    }

    #[test]
    fn test_condition_wins_over_tags() {
        let mut dep = Dependency::new("redis");
        dep.condition = Some("cache.enabled".to_string());
        dep.tags = vec!["backend".to_string()];
        let parent = parent_with(dep);

        let values = Values::from_yaml("cache:\n  enabled: true\ntags:\n  backend: false").unwrap();
        assert!(DiscoveryResult::discover(&parent, &values).subcharts[0].enabled);

        let values = Values::from_yaml("tags:\n  backend: false").unwrap();
        let found = DiscoveryResult::discover(&parent, &values);
        assert_eq!(found.disabled_subcharts().count(), 1);
    }

    #[test]
    fn test_alias_renames_scope() {
        let mut dep = Dependency::new("redis");
        dep.alias = Some("cache".to_string());
        let parent = parent_with(dep);

        let values = Values::from_yaml("cache:\n  enabled: false").unwrap();
        let found = DiscoveryResult::discover(&parent, &values);
        assert_eq!(found.subcharts[0].name, "cache");
        assert!(!found.subcharts[0].enabled);
    }
}
