//! Template engine for Go templates with the Helm function library

use chartwright_core::{Capabilities, Chart, ReleaseInfo, RenderContext, Values};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::chart_renderer::{ChartRenderer, RenderedChart};
use crate::error::Result;
use crate::exec::{self, ExecOptions, Session};
use crate::subchart::SubchartConfig;
use crate::template_set::TemplateSet;
use crate::value::Value;

/// Template engine builder
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    options: ExecOptions,
    subcharts: SubchartConfig,
    capabilities: Capabilities,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            options: ExecOptions::default(),
            subcharts: SubchartConfig::default(),
            capabilities: Capabilities::default(),
        }
    }

    /// Set strict mode (fail on missing map keys)
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Turn `required` and `fail` into warnings
    pub fn lint_mode(mut self, lint_mode: bool) -> Self {
        self.options.lint_mode = lint_mode;
        self
    }

    /// Maximum depth for nested subcharts
    pub fn max_subchart_depth(mut self, depth: usize) -> Self {
        self.subcharts = self.subcharts.with_max_depth(depth);
        self
    }

    /// Maximum combined nesting of template calls and control blocks
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.options.max_nesting_depth = depth;
        self
    }

    /// Maximum nesting of `tpl`
    pub fn max_tpl_depth(mut self, depth: usize) -> Self {
        self.options.max_tpl_depth = depth;
        self
    }

    /// Cluster capabilities exposed as `.Capabilities`
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        Engine {
            options: self.options,
            subcharts: self.subcharts,
            capabilities: self.capabilities,
        }
    }
}

/// The template engine
///
/// An engine holds configuration only. Every render builds its own
/// template set, so one engine can serve any number of renders.
#[derive(Debug, Clone)]
pub struct Engine {
    options: ExecOptions,
    subcharts: SubchartConfig,
    capabilities: Capabilities,
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl Engine {
    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine where missing map keys are errors
    pub fn strict() -> Self {
        Self::builder().strict(true).build()
    }

    /// Engine where missing map keys are nil
    pub fn lenient() -> Self {
        Self::builder().strict(false).build()
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    pub fn subchart_config(&self) -> &SubchartConfig {
        &self.subcharts
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Render a single template string against `data`
    pub fn render_string(
        &self,
        template: &str,
        data: &JsonValue,
        template_name: &str,
    ) -> Result<String> {
        let mut set = TemplateSet::new();
        set.parse(template_name, template)?;

        let mut session = Session::default();
        let output = exec::execute(
            &set,
            template_name,
            Value::from(data),
            &self.options,
            &mut session,
        )?;
        for warning in session.take_warnings() {
            warn!(template = template_name, %warning, "lint");
        }
        Ok(output)
    }

    /// Render a single template string against a chart render context
    pub fn render_with_context(&self, template: &str, context: &RenderContext) -> Result<String> {
        let name = match context.template.name.as_str() {
            "" => "template",
            name => name,
        };
        self.render_string(template, &context.to_json(), name)
    }

    /// Render a chart and all enabled subcharts, failing on the first error
    pub fn render_chart(
        &self,
        chart: &Chart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderedChart> {
        ChartRenderer::new(self).render(chart, values, release)
    }

    /// Render a chart tree, collecting every error into the report
    pub fn render_chart_collect_errors(
        &self,
        chart: &Chart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> RenderedChart {
        ChartRenderer::new(self).render_collect_errors(chart, values, release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chartwright_core::ChartMetadata;
    use semver::Version;
    use serde_json::json;

    #[test]
    fn test_render_string_values() {
        let engine = Engine::default();
        let data = json!({"Values": {"name": "world", "enabled": true}});
        let out = engine
            .render_string(
                "hello {{ .Values.name }} {{ if .Values.enabled }}enabled{{ end }}",
                &data,
                "test",
            )
            .unwrap();
        assert_eq!(out, "hello world enabled");
    }

    #[test]
    fn test_strict_mode_missing_key() {
        let data = json!({"Values": {}});
        let lenient = Engine::lenient().render_string("[{{ .Values.missing }}]", &data, "t");
        assert_eq!(lenient.unwrap(), "[]");

        let err = Engine::strict()
            .render_string("{{ .Values.missing }}", &data, "t")
            .unwrap_err();
        assert!(err.to_string().contains(r#"map has no entry for key "missing""#));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = Engine::default()
            .render_string("{{ if }}", &json!({}), "broken")
            .unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_lint_mode_required() {
        let engine = Engine::builder().lint_mode(true).build();
        let out = engine
            .render_string(
                r#"a{{ required "name is required" .Values.name }}b"#,
                &json!({"Values": {}}),
                "t",
            )
            .unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_builder_settings() {
        let engine = Engine::builder()
            .max_subchart_depth(3)
            .max_nesting_depth(7)
            .max_tpl_depth(2)
            .capabilities(Capabilities::for_kube_version("1.30.0"))
            .build();
        assert_eq!(engine.subchart_config().max_depth, 3);
        assert_eq!(engine.options().max_nesting_depth, 7);
        assert_eq!(engine.options().max_tpl_depth, 2);
        assert_eq!(engine.capabilities().kube_version.minor, "30");
    }

    #[test]
    fn test_render_with_context() {
        let values = Values::from_yaml("replicas: 2").unwrap();
        let meta = ChartMetadata::new("web", Version::new(0, 3, 1));
        let context = RenderContext::new(values, ReleaseInfo::for_install("r1", "prod"), &meta)
            .with_template("web/templates/x.yaml", "web/templates");
        let out = Engine::default()
            .render_with_context(
                "{{ .Chart.Name }}-{{ .Chart.Version }} {{ .Release.Namespace }} {{ .Values.replicas }} {{ .Template.Name }}",
                &context,
            )
            .unwrap();
        assert_eq!(out, "web-0.3.1 prod 2 web/templates/x.yaml");
    }
}
