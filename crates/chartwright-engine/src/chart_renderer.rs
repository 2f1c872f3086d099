//! Chart renderer with subchart support
//!
//! `ChartRenderer` drives one render of a chart tree:
//! 1. collect the enabled charts, each with its merged values
//! 2. parse every template into one fresh [`TemplateSet`]
//! 3. execute each chart's manifests, parent before subcharts
//! 4. normalize the concatenated output
//!
//! Named templates live in a single namespace. Helpers of deeper charts are
//! parsed first so a parent's definitions win, and each definition from a
//! subchart helper is also reachable as `<subchart>.<name>`.

use std::cmp::Reverse;

use chartwright_core::{Chart, ReleaseInfo, RenderContext, TemplateFile, Values};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{
    EngineError, ExecError, ExecErrorKind, ParseError, RenderIssue, RenderReport, Result,
    TemplateFailure,
};
use crate::exec::{self, Session};
use crate::manifest;
use crate::subchart::DiscoveryResult;
use crate::suggestions::suggest_template_name;
use crate::template_set::TemplateSet;
use crate::value::Value;

/// Result of rendering a chart tree
#[derive(Debug, Default)]
pub struct RenderedChart {
    /// Normalized multi-document manifest
    pub manifest: String,

    /// Raw output of every manifest template that produced content, in
    /// render order (IndexMap preserves insertion order)
    pub templates: IndexMap<String, String>,

    /// Rendered NOTES.txt of the root chart
    pub notes: Option<String>,

    /// Error and warning report
    pub report: RenderReport,
}

impl RenderedChart {
    /// Check if rendering was fully successful (no errors)
    pub fn is_success(&self) -> bool {
        !self.report.has_errors()
    }

    /// Documents of the normalized manifest
    pub fn documents(&self) -> Vec<String> {
        manifest::split_documents(&self.manifest)
            .into_iter()
            .filter(|doc| !doc.trim().is_empty())
            .collect()
    }
}

/// One chart of the tree with the values it renders against
#[derive(Debug)]
struct ChartNode<'c> {
    chart: &'c Chart,
    /// Effective name (alias for subcharts that have one)
    name: String,
    /// `<chart>` for the root, `<parent>/charts/<name>` below it
    path: String,
    values: Values,
    depth: usize,
}

impl ChartNode<'_> {
    fn is_root(&self) -> bool {
        self.depth == 0
    }

    fn base_path(&self) -> String {
        format!("{}/templates", self.path)
    }

    fn template_name(&self, file: &TemplateFile) -> String {
        format!("{}/templates/{}", self.path, file.name)
    }

    /// Files this chart contributes to the template set
    fn parsed_files(&self) -> impl Iterator<Item = &TemplateFile> {
        let root = self.is_root();
        self.chart
            .templates
            .iter()
            .filter(move |f| f.is_helper() || f.is_manifest() || (root && f.is_notes()))
    }
}

#[derive(Debug, Default)]
struct ParseStats {
    attempted: usize,
    parsed: usize,
    errors: Vec<ParseError>,
}

/// Orchestrates rendering of a chart and its subcharts
pub struct ChartRenderer<'e> {
    engine: &'e Engine,
}

impl<'e> ChartRenderer<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Render a chart tree, failing on the first template error
    ///
    /// Templates that fail to parse are skipped with a warning unless every
    /// template of a chart fails, which is [`EngineError::AllTemplatesFailed`].
    pub fn render(
        &self,
        chart: &Chart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> Result<RenderedChart> {
        let mut rendered = self.render_collect_errors(chart, values, release);

        let errors = std::mem::take(&mut rendered.report.errors_by_template);
        if let Some((template, failures)) = errors.into_iter().next() {
            return Err(first_error(template, failures));
        }

        Ok(rendered)
    }

    /// Render with full error collection
    pub fn render_collect_errors(
        &self,
        chart: &Chart,
        values: &Values,
        release: &ReleaseInfo,
    ) -> RenderedChart {
        let mut report = RenderReport::new();

        let root = ChartNode {
            chart,
            name: chart.name().to_string(),
            path: chart.name().to_string(),
            values: Values::merged(&chart.values, values),
            depth: 0,
        };
        let mut nodes = Vec::new();
        self.collect(root, &mut Vec::new(), &mut nodes, &mut report);
        debug!(charts = nodes.len(), "collected chart tree");

        let set = self.parse_all(&nodes, &mut report);
        debug!(templates = set.len(), "parsed template set");

        let mut rendered = RenderedChart::default();
        let mut combined = String::new();
        for node in &nodes {
            self.render_node(node, &set, release, &mut combined, &mut rendered, &mut report);
        }

        rendered.manifest = manifest::normalize(&combined);
        rendered.report = report;
        debug!(
            documents = rendered.documents().len(),
            errors = rendered.report.total_errors,
            "rendered chart {}",
            chart.name()
        );
        rendered
    }

    /// Walk the enabled chart tree depth-first, parent before subcharts
    fn collect<'c>(
        &self,
        node: ChartNode<'c>,
        stack: &mut Vec<(String, String)>,
        nodes: &mut Vec<ChartNode<'c>>,
        report: &mut RenderReport,
    ) {
        let chart = node.chart;
        let discovery = DiscoveryResult::discover(chart, &node.values);
        let (path, values, depth) = (node.path.clone(), node.values.clone(), node.depth);
        stack.push(chart_key(chart));
        nodes.push(node);

        for sub in discovery.disabled_subcharts() {
            let reason = sub.disabled_reason.as_deref().unwrap_or("disabled");
            debug!(subchart = %sub.name, %reason, "skipping disabled subchart");
            report.add_issue(RenderIssue::warning(
                "subchart_disabled",
                format!("Subchart '{}' disabled: {}", sub.name, reason),
            ));
        }

        let max_depth = self.engine.subchart_config().max_depth;
        for sub in discovery.enabled_subcharts() {
            let sub_path = format!("{}/charts/{}", path, sub.name);
            if depth + 1 > max_depth {
                warn!(subchart = %sub_path, max_depth, "subchart depth exceeded, skipping");
                report.add_warning(
                    "subchart_depth",
                    format!(
                        "Maximum subchart depth ({}) exceeded at {}, skipping",
                        max_depth, sub_path
                    ),
                );
                continue;
            }

            let key = chart_key(sub.chart);
            if stack.contains(&key) {
                warn!(subchart = %sub_path, "subchart already on the render path, skipping");
                report.add_warning(
                    "subchart_cycle",
                    format!("Chart {}@{} is already being rendered at {}", key.0, key.1, sub_path),
                );
                continue;
            }

            let sub_values = Values::for_subchart(&sub.chart.values, &values, &sub.name);
            let child = ChartNode {
                chart: sub.chart,
                name: sub.name.clone(),
                path: sub_path,
                values: sub_values,
                depth: depth + 1,
            };
            self.collect(child, stack, nodes, report);
        }

        stack.pop();
    }

    /// Parse every chart's files into one set, helpers first
    fn parse_all(&self, nodes: &[ChartNode<'_>], report: &mut RenderReport) -> TemplateSet {
        let mut set = TemplateSet::new();
        let mut stats: Vec<ParseStats> = nodes.iter().map(|_| ParseStats::default()).collect();

        let mut helper_order: Vec<usize> = (0..nodes.len()).collect();
        helper_order.sort_by_key(|&i| Reverse(nodes[i].depth));
        for i in helper_order {
            let node = &nodes[i];
            for file in node.parsed_files().filter(|f| f.is_helper()) {
                parse_file(&mut set, node, file, &mut stats[i], report);
            }
        }
        for (i, node) in nodes.iter().enumerate() {
            for file in node.parsed_files().filter(|f| !f.is_helper()) {
                parse_file(&mut set, node, file, &mut stats[i], report);
            }
        }

        for (node, stats) in nodes.iter().zip(stats) {
            if stats.attempted > 0 && stats.parsed == 0 {
                warn!(chart = %node.path, "every template failed to parse");
                for error in stats.errors {
                    report.add_error(node.path.clone(), TemplateFailure::Parse(error));
                }
            }
        }
        set
    }

    fn render_node(
        &self,
        node: &ChartNode<'_>,
        set: &TemplateSet,
        release: &ReleaseInfo,
        combined: &mut String,
        rendered: &mut RenderedChart,
        report: &mut RenderReport,
    ) {
        let mut metadata = node.chart.metadata.clone();
        metadata.name = node.name.clone();
        let context = RenderContext::new(node.values.clone(), release.clone(), &metadata)
            .with_capabilities(self.engine.capabilities().clone());
        let base_path = node.base_path();

        for file in node.chart.templates.iter() {
            let is_notes = node.is_root() && file.is_notes();
            if !file.is_manifest() && !is_notes {
                continue;
            }
            let name = node.template_name(file);
            if !set.contains(&name) {
                continue;
            }

            let data = context.clone().with_template(&name, &base_path).to_json();
            match self.execute(set, &name, Value::from(&data), report) {
                Ok(text) if is_notes => {
                    report.add_success(name);
                    rendered.notes = Some(text);
                }
                Ok(text) => {
                    combined.push_str(&text);
                    if !manifest::ends_with_separator(&text) {
                        combined.push_str("\n---\n");
                    }
                    let trimmed = text.trim();
                    if !trimmed.is_empty() && trimmed != manifest::SEPARATOR {
                        rendered.templates.insert(name.clone(), text);
                    }
                    report.add_success(name);
                }
                Err(error) => {
                    if let ExecErrorKind::TemplateNotFound { name: missing } = error.kind() {
                        if let Some(hint) = suggest_template_name(missing, &set.names()) {
                            let warning = format!("{}: {}", missing, hint);
                            report.add_warning("template_not_found", warning);
                        }
                    }
                    debug!(template = %name, %error, "template failed");
                    report.add_error(name, TemplateFailure::Exec(error));
                }
            }
        }
    }

    /// Execute one template with its own session, surfacing lint warnings
    fn execute(
        &self,
        set: &TemplateSet,
        name: &str,
        data: Value,
        report: &mut RenderReport,
    ) -> std::result::Result<String, ExecError> {
        let mut session = Session::default();
        let result = exec::execute(set, name, data, self.engine.options(), &mut session);
        for warning in session.take_warnings() {
            warn!(template = name, %warning, "lint");
            report.add_warning("lint", format!("{}: {}", name, warning));
        }
        for truncated in session.take_truncated() {
            report.add_warning("recursion", format!("{}: {}", name, truncated));
        }
        result
    }
}

fn chart_key(chart: &Chart) -> (String, String) {
    (chart.name().to_string(), chart.metadata.version.to_string())
}

fn parse_file(
    set: &mut TemplateSet,
    node: &ChartNode<'_>,
    file: &TemplateFile,
    stats: &mut ParseStats,
    report: &mut RenderReport,
) {
    let name = node.template_name(file);
    stats.attempted += 1;
    match set.parse(&name, &file.data) {
        Ok(added) => {
            stats.parsed += 1;
            if !node.is_root() && file.is_helper() {
                let definitions: Vec<&String> = added.iter().filter(|n| **n != name).collect();
                alias_definitions(set, &node.name, &definitions);
            }
        }
        Err(error) => {
            warn!(template = %name, %error, "skipping template that failed to parse");
            report.add_warning("template_parse", format!("skipped {}: {}", name, error));
            stats.errors.push(error);
        }
    }
}

/// Register `<chart>.<definition>` for each definition a subchart helper added
fn alias_definitions(set: &mut TemplateSet, chart: &str, definitions: &[&String]) {
    let prefix = format!("{}.", chart);
    for definition in definitions {
        if definition.starts_with(&prefix) {
            continue;
        }
        let alias = format!("{}{}", prefix, definition);
        if set.alias(&alias, definition) {
            debug!(%alias, target = %definition, "aliased subchart template");
        }
    }
}

/// The error `render` reports for the first failing template
fn first_error(template: String, failures: Vec<TemplateFailure>) -> EngineError {
    let mut errors = Vec::new();
    for failure in failures {
        match failure {
            TemplateFailure::Exec(error) => return error.into(),
            TemplateFailure::Parse(error) => errors.push(error),
        }
    }
    EngineError::AllTemplatesFailed {
        chart: template,
        errors,
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

    fn render(chart: &Chart, values: &str) -> RenderedChart {
        let engine = Engine::default();
        let values = Values::from_yaml(values).unwrap();
        ChartRenderer::new(&engine).render_collect_errors(
            chart,
            &values,
            &ReleaseInfo::for_install("rel", "default"),
        )
    }

    #[test]
    fn test_template_names_follow_chart_paths() {
        let sub = chart("db").with_template("svc.yaml", "name: {{ .Template.Name }}");
        let root = chart("app")
            .with_template("cm.yaml", "base: {{ .Template.BasePath }}")
            .with_dependency(sub);
        let out = render(&root, "{}");
        let names: Vec<&str> = out.templates.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["app/templates/cm.yaml", "app/charts/db/templates/svc.yaml"]);
        assert_eq!(
            out.manifest,
            "base: app/templates\n---\nname: app/charts/db/templates/svc.yaml\n"
        );
    }

    #[test]
    fn test_helpers_are_not_rendered() {
        let root = chart("app")
            .with_template("_helpers.tpl", r#"{{ define "app.name" }}web{{ end }}stray text"#)
            .with_template("cm.yaml", r#"name: {{ include "app.name" . }}"#);
        let out = render(&root, "{}");
        assert_eq!(out.manifest, "name: web\n");
        assert!(out.is_success());
    }

    #[test]
    fn test_subchart_helpers_are_aliased() {
        let sub = chart("db")
            .with_template("_helpers.tpl", r#"{{ define "port" }}5432{{ end }}"#)
            .with_template("svc.yaml", r#"port: {{ include "port" . }}"#);
        let root = chart("app")
            .with_template("cm.yaml", r#"dbPort: {{ include "db.port" . }}"#)
            .with_dependency(sub);
        let out = render(&root, "{}");
        assert_eq!(out.manifest, "dbPort: 5432\n---\nport: 5432\n");
    }

    #[test]
    fn test_parent_definition_wins() {
        let sub = chart("db")
            .with_template("_helpers.tpl", r#"{{ define "who" }}db{{ end }}"#)
            .with_template("svc.yaml", r#"who: {{ include "who" . }}"#);
        let root = chart("app")
            .with_template("_helpers.tpl", r#"{{ define "who" }}app{{ end }}"#)
            .with_dependency(sub);
        let out = render(&root, "{}");
        assert_eq!(out.manifest, "who: app\n");
    }

    #[test]
    fn test_parse_failure_is_a_warning() {
        let root = chart("app")
            .with_template("bad.yaml", "{{ if }}")
            .with_template("good.yaml", "ok: true");
        let out = render(&root, "{}");
        assert!(out.is_success());
        assert_eq!(out.manifest, "ok: true\n");
        assert_eq!(out.report.warnings_in("template_parse").count(), 1);
    }

    #[test]
    fn test_all_templates_failing_is_fatal() {
        let root = chart("app").with_template("bad.yaml", "{{ end }}");
        let engine = Engine::default();
        let err = ChartRenderer::new(&engine)
            .render(&root, &Values::new(), &ReleaseInfo::default())
            .unwrap_err();
        match err {
            EngineError::AllTemplatesFailed { chart, errors } => {
                assert_eq!(chart, "app");
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_notes_rendered_separately() {
        let root = chart("app")
            .with_template("NOTES.txt", "Installed {{ .Release.Name }}")
            .with_template("cm.yaml", "a: 1")
            .with_dependency(chart("db").with_template("NOTES.txt", "db notes"));
        let out = render(&root, "{}");
        assert_eq!(out.notes.as_deref(), Some("Installed rel"));
        assert_eq!(out.manifest, "a: 1\n");
    }

    #[test]
    fn test_subchart_disabled_by_values() {
        let root = chart("app")
            .with_template("cm.yaml", "a: 1")
            .with_dependency(chart("db").with_template("svc.yaml", "b: 2"));
        let out = render(&root, "db:\n  enabled: false");
        assert_eq!(out.manifest, "a: 1\n");
        assert_eq!(out.report.warnings_in("subchart_disabled").count(), 1);
    }

    #[test]
    fn test_subchart_sees_scoped_and_global_values() {
        let sub = chart("db")
            .with_values(Values::from_yaml("port: 5432\nuser: admin").unwrap())
            .with_template(
                "svc.yaml",
                "port: {{ .Values.port }}\nuser: {{ .Values.user }}\nenv: {{ .Values.global.env }}",
            );
        let root = chart("app")
            .with_values(Values::from_yaml("global:\n  env: prod\ndb:\n  port: 6543").unwrap())
            .with_dependency(sub);
        let out = render(&root, "{}");
        assert_eq!(out.manifest, "port: 6543\nuser: admin\nenv: prod\n");
    }

    #[test]
    fn test_depth_ceiling_skips_branch() {
        let leaf = chart("c").with_template("c.yaml", "c: 1");
        let mid = chart("b").with_template("b.yaml", "b: 1").with_dependency(leaf);
        let root = chart("a").with_template("a.yaml", "a: 1").with_dependency(mid);

        let engine = Engine::builder().max_subchart_depth(1).build();
        let out = ChartRenderer::new(&engine).render_collect_errors(
            &root,
            &Values::new(),
            &ReleaseInfo::default(),
        );
        assert_eq!(out.manifest, "a: 1\n---\nb: 1\n");
        assert_eq!(out.report.warnings_in("subchart_depth").count(), 1);
    }

    #[test]
    fn test_same_chart_on_path_is_skipped() {
        let inner = chart("loop").with_template("x.yaml", "inner: 1");
        let root = chart("loop").with_template("x.yaml", "outer: 1").with_dependency(inner);
        let out = render(&root, "{}");
        assert_eq!(out.manifest, "outer: 1\n");
        assert_eq!(out.report.warnings_in("subchart_cycle").count(), 1);
    }

    #[test]
    fn test_missing_template_suggests_name() {
        let root = chart("app")
            .with_template("_helpers.tpl", r#"{{ define "app.fullname" }}x{{ end }}"#)
            .with_template("cm.yaml", r#"{{ include "app.fulname" . }}"#);
        let out = render(&root, "{}");
        assert_eq!(out.report.total_errors, 1);
        let hint = out.report.warnings_in("template_not_found").next().unwrap();
        assert!(hint.message.contains("app.fullname"));
    }
}
