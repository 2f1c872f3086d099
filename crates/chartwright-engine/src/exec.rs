//! Template execution
//!
//! A [`State`] walks one tree at a time. Calls through `template`, `include`
//! and `tpl` spawn a nested state that shares the render [`Session`], which
//! is where the nesting counters and lint warnings live.
//!
//! Named template calls and `if`/`with`/`range` bodies each take one level
//! of nesting. Past [`ExecOptions::max_nesting_depth`] the innermost call
//! fails with [`ExecErrorKind::Recursion`], and the outermost call site of
//! the chain renders as empty with a warning.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::ast::{
    Argument, ArgumentKind, Branch, Command, Node, NumberValue, Pipeline, Pos, TemplateCall, Tree,
};
use crate::error::{ExecError, ExecErrorKind};
use crate::format::quote;
use crate::functions::{self, Callable, FuncError};
use crate::template_set::TemplateSet;
use crate::value::Value;

/// Stack that must be left before entering another nesting level
const RED_ZONE: usize = 128 * 1024;

/// Size of each stack segment allocated once the red zone is reached
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Knobs that change how templates execute
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Missing map keys are errors instead of nil
    pub strict: bool,
    /// `required` and `fail` record a warning and yield an empty string
    pub lint_mode: bool,
    /// Ceiling for combined nesting of template calls and control blocks
    pub max_nesting_depth: usize,
    /// Ceiling for nested `tpl` calls
    pub max_tpl_depth: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            strict: false,
            lint_mode: false,
            max_nesting_depth: 64,
            max_tpl_depth: 10,
        }
    }
}

/// Bookkeeping shared by every nested execution of one render
#[derive(Debug, Default)]
pub struct Session {
    nesting: usize,
    tpl_depth: usize,
    /// Messages raised by `required`/`fail` in lint mode
    pub warnings: Vec<String>,
    /// Calls rendered as empty because they nested too deeply
    pub truncated: Vec<String>,
}

impl Session {
    /// Warnings raised so far, leaving the session empty
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Truncated calls so far, leaving the session empty
    pub fn take_truncated(&mut self) -> Vec<String> {
        std::mem::take(&mut self.truncated)
    }
}

/// Execute the template registered as `name` against `data`
pub fn execute(
    set: &TemplateSet,
    name: &str,
    data: Value,
    options: &ExecOptions,
    session: &mut Session,
) -> Result<String, ExecError> {
    let tree = set.get(name).cloned().ok_or_else(|| {
        ExecError::bare(
            ExecErrorKind::TemplateNotFound {
                name: name.to_string(),
            },
            format!("no template {:?} associated with template set", name),
        )
    })?;
    let mut state = State {
        set,
        options,
        session,
        tree: tree.clone(),
        vars: vec![("$".to_string(), data.clone())],
        calls: 0,
    };
    let mut out = String::new();
    state.walk_list(&data, &tree.root, &mut out)?;
    Ok(out)
}

/// Control flow out of a list of nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Execution state for one tree
pub struct State<'t> {
    set: &'t TemplateSet,
    options: &'t ExecOptions,
    session: &'t mut Session,
    tree: Rc<Tree>,
    /// Variable stack, innermost last
    vars: Vec<(String, Value)>,
    /// Named template calls between this state and the render root
    calls: usize,
}

impl<'t> State<'t> {
    pub fn options(&self) -> &ExecOptions {
        self.options
    }

    /// Record a lint warning
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(template = %self.tree.name, %message, "lint warning");
        self.session.warnings.push(message);
    }

    /// Name of the tree being executed
    pub fn template_name(&self) -> &str {
        &self.tree.name
    }

    /// Render a named template to a string, as `include` does
    pub fn include(&mut self, name: &str, data: Value) -> Result<String, FuncError> {
        if !self.set.contains(name) {
            return Err(FuncError::with_kind(
                ExecErrorKind::TemplateNotFound {
                    name: name.to_string(),
                },
                format!(
                    "template: no template {:?} associated with template {:?}",
                    name, self.tree.name
                ),
            ));
        }
        let set = self.set;
        let result = self.call_template(set, name, data);
        self.contain(name, result).map_err(FuncError::from_nested)
    }

    /// Parse `text` against a copy of the current set and execute it
    pub fn tpl(&mut self, text: &str, data: Value) -> Result<String, FuncError> {
        if self.session.tpl_depth >= self.options.max_tpl_depth {
            return Err(FuncError::with_kind(
                ExecErrorKind::Recursion,
                format!(
                    "tpl nesting exceeded maximum depth ({})",
                    self.options.max_tpl_depth
                ),
            ));
        }
        let name = data
            .get("Template")
            .and_then(|t| t.get("Name"))
            .and_then(|n| n.as_str().map(str::to_string))
            .unwrap_or_else(|| self.tree.name.clone());

        let mut scratch = self.set.clone();
        scratch
            .parse(&name, text)
            .map_err(|e| FuncError::new(format!("cannot parse template {:?}: {}", text, e)))?;

        self.session.tpl_depth += 1;
        let result = self.call_template(&scratch, &name, data);
        self.session.tpl_depth -= 1;

        self.contain("tpl", result).map_err(|e| match e.kind {
            ExecErrorKind::Recursion => FuncError::Nested(e),
            _ => FuncError::with_kind(
                e.kind.clone(),
                format!("error during tpl function execution for {:?}: {}", text, e),
            ),
        })
    }

    /// Run a named tree from `set` in a fresh variable scope
    fn call_template(
        &mut self,
        set: &TemplateSet,
        name: &str,
        dot: Value,
    ) -> Result<String, ExecError> {
        let Some(tree) = set.get(name).cloned() else {
            return Err(ExecError::bare(
                ExecErrorKind::TemplateNotFound {
                    name: name.to_string(),
                },
                format!("no template {:?} associated with template set", name),
            ));
        };
        if self.session.nesting >= self.options.max_nesting_depth {
            return Err(ExecError::bare(
                ExecErrorKind::Recursion,
                format!(
                    "rendering template has a nested reference name: {}: \
                     exceeded maximum nesting depth ({})",
                    name, self.options.max_nesting_depth
                ),
            ));
        }

        self.session.nesting += 1;
        let mut out = String::new();
        let result = {
            let mut nested = State {
                set,
                options: self.options,
                session: &mut *self.session,
                tree: tree.clone(),
                vars: vec![("$".to_string(), dot.clone())],
                calls: self.calls + 1,
            };
            stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || {
                nested.walk_list(&dot, &tree.root, &mut out)
            })
        };
        self.session.nesting -= 1;
        result.map(|_| out)
    }

    /// Render a call that nested too deeply as empty when no template call
    /// encloses this one
    fn contain(
        &mut self,
        name: &str,
        result: Result<String, ExecError>,
    ) -> Result<String, ExecError> {
        match result {
            Err(error) if self.calls == 0 && error.kind == ExecErrorKind::Recursion => {
                warn!(
                    template = %self.tree.name,
                    call = name,
                    %error,
                    "nesting limit reached, rendering call as empty"
                );
                self.session.truncated.push(error.to_string());
                Ok(String::new())
            }
            other => other,
        }
    }

    /// Enter one control block body
    fn nest<T>(
        &mut self,
        pos: Pos,
        node: &dyn std::fmt::Display,
        body: impl FnOnce(&mut Self) -> Result<T, ExecError>,
    ) -> Result<T, ExecError> {
        if self.session.nesting >= self.options.max_nesting_depth {
            return Err(self.error_at(
                pos,
                node,
                ExecErrorKind::Recursion,
                format!("exceeded maximum nesting depth ({})", self.options.max_nesting_depth),
            ));
        }
        self.session.nesting += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || body(self));
        self.session.nesting -= 1;
        result
    }

    fn error_at(
        &self,
        pos: Pos,
        node: &dyn std::fmt::Display,
        kind: ExecErrorKind,
        message: impl Into<String>,
    ) -> ExecError {
        let (line, column) = self.tree.location(pos);
        ExecError {
            kind,
            template: self.tree.parse_name.clone(),
            executing: self.tree.name.clone(),
            line,
            column,
            node: node.to_string(),
            message: message.into(),
        }
    }

    fn walk_list(
        &mut self,
        dot: &Value,
        nodes: &[Node],
        out: &mut String,
    ) -> Result<Flow, ExecError> {
        for node in nodes {
            match self.walk_node(dot, node, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn walk_node(&mut self, dot: &Value, node: &Node, out: &mut String) -> Result<Flow, ExecError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(action) => {
                let value = self.eval_pipeline(dot, &action.pipe)?;
                if action.pipe.decl.is_empty() {
                    print_value(&value, out);
                }
            }
            Node::If(branch) => return self.walk_if_or_with(false, dot, branch, out),
            Node::With(branch) => return self.walk_if_or_with(true, dot, branch, out),
            Node::Range(branch) => return self.walk_range(dot, branch, out),
            Node::Template(call) => self.walk_template(dot, call, out)?,
            Node::Break(_) => return Ok(Flow::Break),
            Node::Continue(_) => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn walk_if_or_with(
        &mut self,
        is_with: bool,
        dot: &Value,
        branch: &Branch,
        out: &mut String,
    ) -> Result<Flow, ExecError> {
        let mark = self.vars.len();
        let result = self.nest(branch.pos, &branch.pipe, |state| {
            state.if_or_with_body(is_with, dot, branch, out)
        });
        self.vars.truncate(mark);
        result
    }

    fn if_or_with_body(
        &mut self,
        is_with: bool,
        dot: &Value,
        branch: &Branch,
        out: &mut String,
    ) -> Result<Flow, ExecError> {
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        if value.is_truthy() {
            if is_with {
                self.walk_list(&value, &branch.list, out)
            } else {
                self.walk_list(dot, &branch.list, out)
            }
        } else if let Some(else_list) = &branch.else_list {
            self.walk_list(dot, else_list, out)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn walk_range(
        &mut self,
        dot: &Value,
        branch: &Branch,
        out: &mut String,
    ) -> Result<Flow, ExecError> {
        let mark = self.vars.len();
        let result =
            self.nest(branch.pos, &branch.pipe, |state| state.range_body(dot, branch, out));
        self.vars.truncate(mark);
        result.map(|_| Flow::Normal)
    }

    fn range_body(
        &mut self,
        dot: &Value,
        branch: &Branch,
        out: &mut String,
    ) -> Result<(), ExecError> {
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        let items: Vec<(Value, Value)> = match &value {
            Value::List(list) => list
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            Value::Map(map) => map
                .borrow()
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect(),
            Value::Int(n) => {
                if branch.pipe.decl.len() > 1 {
                    return Err(self.error_at(
                        branch.pos,
                        &branch.pipe,
                        ExecErrorKind::Type,
                        format!("can't use {} to iterate over more than one variable", n),
                    ));
                }
                (0..(*n).max(0)).map(|i| (Value::Int(i), Value::Int(i))).collect()
            }
            Value::Nil => Vec::new(),
            other => {
                return Err(self.error_at(
                    branch.pos,
                    &branch.pipe,
                    ExecErrorKind::Type,
                    format!("range can't iterate over {}", other),
                ));
            }
        };

        if items.is_empty() {
            if let Some(else_list) = &branch.else_list {
                self.walk_list(dot, else_list, out)?;
            }
            return Ok(());
        }

        for (index, element) in items {
            let iteration_mark = self.vars.len();
            self.bind_range_vars(&branch.pipe, index, element.clone());
            let flow = self.walk_list(&element, &branch.list, out);
            self.vars.truncate(iteration_mark);
            match flow? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(())
    }

    /// Point the range variables at the current element (and key/index)
    fn bind_range_vars(&mut self, pipe: &Pipeline, index: Value, element: Value) {
        match pipe.decl.as_slice() {
            [] => {}
            [elem] => self.set_or_push(elem, element, pipe.is_assign),
            [key, elem, ..] => {
                self.set_or_push(key, index, pipe.is_assign);
                self.set_or_push(elem, element, pipe.is_assign);
            }
        }
    }

    fn set_or_push(&mut self, name: &str, value: Value, is_assign: bool) {
        if is_assign {
            self.set_var(name, value);
        } else {
            self.vars.push((name.to_string(), value));
        }
    }

    fn walk_template(
        &mut self,
        dot: &Value,
        call: &TemplateCall,
        out: &mut String,
    ) -> Result<(), ExecError> {
        if !self.set.contains(&call.name) {
            return Err(self.error_at(
                call.pos,
                &template_node(call),
                ExecErrorKind::TemplateNotFound {
                    name: call.name.clone(),
                },
                format!("template {:?} not defined", call.name),
            ));
        }
        let data = match &call.pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe)?,
            None => Value::Nil,
        };
        let set = self.set;
        let result = self.call_template(set, &call.name, data);
        let text = self.contain(&call.name, result)?;
        out.push_str(&text);
        Ok(())
    }

    fn eval_pipeline(&mut self, dot: &Value, pipe: &Pipeline) -> Result<Value, ExecError> {
        let mut value: Option<Value> = None;
        for cmd in &pipe.commands {
            value = Some(self.eval_command(dot, cmd, value)?);
        }
        let value = value.unwrap_or_default();
        for name in &pipe.decl {
            if pipe.is_assign {
                self.set_var(name, value.clone());
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn set_var(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            slot.1 = value;
        }
    }

    fn var_value(&self, arg: &Argument, name: &str) -> Result<Value, ExecError> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                self.error_at(
                    arg.pos,
                    arg,
                    ExecErrorKind::Variable,
                    format!("undefined variable: {}", name),
                )
            })
    }

    fn eval_command(
        &mut self,
        dot: &Value,
        cmd: &Command,
        last: Option<Value>,
    ) -> Result<Value, ExecError> {
        let first = &cmd.args[0];
        let rest = &cmd.args[1..];
        match &first.kind {
            ArgumentKind::Field(path) => {
                self.eval_fields(dot, dot.clone(), true, path, first, rest, last)
            }
            ArgumentKind::Chain { base, fields } => {
                let receiver = self.eval_arg(dot, base)?;
                self.eval_fields(dot, receiver, false, fields, first, rest, last)
            }
            ArgumentKind::Identifier(name) => self.eval_function(dot, name, cmd, last),
            ArgumentKind::Variable { name, fields } => {
                let value = self.var_value(first, name)?;
                if fields.is_empty() {
                    self.not_a_function(cmd, &last)?;
                    return Ok(value);
                }
                self.eval_fields(dot, value, false, fields, first, rest, last)
            }
            ArgumentKind::Pipeline(pipe) => {
                self.not_a_function(cmd, &last)?;
                self.eval_pipeline(dot, pipe)
            }
            ArgumentKind::Nil => {
                Err(self.error_at(first.pos, first, ExecErrorKind::Type, "nil is not a command"))
            }
            ArgumentKind::Dot => {
                self.not_a_function(cmd, &last)?;
                Ok(dot.clone())
            }
            ArgumentKind::Bool(_) | ArgumentKind::Number(_) | ArgumentKind::String(_) => {
                self.not_a_function(cmd, &last)?;
                Ok(constant(&first.kind))
            }
        }
    }

    fn not_a_function(&self, cmd: &Command, last: &Option<Value>) -> Result<(), ExecError> {
        if cmd.args.len() > 1 || last.is_some() {
            let first = &cmd.args[0];
            return Err(self.error_at(
                first.pos,
                first,
                ExecErrorKind::Type,
                format!("can't give argument to non-function {}", first),
            ));
        }
        Ok(())
    }

    /// Walk a field path starting at `receiver`
    ///
    /// `from_dot` marks a path that starts at the cursor itself, where a nil
    /// cursor quietly yields nil. A list answers the `Has` method, which is
    /// how `.Capabilities.APIVersions.Has` checks for an API version.
    #[allow(clippy::too_many_arguments)]
    fn eval_fields(
        &mut self,
        dot: &Value,
        receiver: Value,
        from_dot: bool,
        fields: &[String],
        node: &Argument,
        args: &[Argument],
        last: Option<Value>,
    ) -> Result<Value, ExecError> {
        let has_args = !args.is_empty() || last.is_some();
        let mut current = receiver;
        let mut looked_up = false;
        for (i, field) in fields.iter().enumerate() {
            let is_last = i + 1 == fields.len();
            current = match current {
                Value::Nil if i == 0 && from_dot => {
                    if self.options.strict {
                        return Err(self.error_at(
                            node.pos,
                            node,
                            ExecErrorKind::Field,
                            format!("nil data; no entry for key {:?}", field),
                        ));
                    }
                    return Ok(Value::Nil);
                }
                Value::Nil => {
                    return Err(self.error_at(
                        node.pos,
                        node,
                        ExecErrorKind::Field,
                        format!("nil pointer evaluating interface {{}}.{}", field),
                    ));
                }
                Value::Map(map) => {
                    if is_last && has_args {
                        return Err(self.error_at(
                            node.pos,
                            node,
                            ExecErrorKind::Field,
                            format!("{} is not a method but has arguments", field),
                        ));
                    }
                    let entry = map.borrow().get(field.as_str()).cloned();
                    match entry {
                        Some(v) => v,
                        None if self.options.strict => {
                            return Err(self.error_at(
                                node.pos,
                                node,
                                ExecErrorKind::Field,
                                format!("map has no entry for key {:?}", field),
                            ));
                        }
                        None => Value::Nil,
                    }
                }
                Value::List(items) if is_last && has_args && field == "Has" => {
                    let wanted = self.eval_args(dot, args, last)?;
                    let [wanted] = wanted.as_slice() else {
                        return Err(self.error_at(
                            node.pos,
                            node,
                            ExecErrorKind::Function,
                            format!("wrong number of args for Has: want 1 got {}", wanted.len()),
                        ));
                    };
                    let found = wanted
                        .as_str()
                        .is_some_and(|w| items.iter().any(|item| item.as_str() == Some(w)));
                    return Ok(Value::Bool(found));
                }
                other => {
                    let type_name = if looked_up { "interface {}" } else { other.type_name() };
                    return Err(self.error_at(
                        node.pos,
                        node,
                        ExecErrorKind::Field,
                        format!("can't evaluate field {} in type {}", field, type_name),
                    ));
                }
            };
            looked_up = true;
        }
        Ok(current)
    }

    fn eval_function(
        &mut self,
        dot: &Value,
        name: &str,
        cmd: &Command,
        last: Option<Value>,
    ) -> Result<Value, ExecError> {
        let Some(function) = functions::lookup(name) else {
            return Err(self.error_at(
                cmd.pos,
                cmd,
                ExecErrorKind::Function,
                format!("{:?} is not a defined function", name),
            ));
        };
        let args = &cmd.args[1..];
        let given = args.len() + usize::from(last.is_some());

        if given < function.min_args {
            let message = if function.max_args.is_none() {
                format!(
                    "wrong number of args for {}: want at least {} got {}",
                    name, function.min_args, given
                )
            } else {
                format!(
                    "wrong number of args for {}: want {} got {}",
                    name, function.min_args, given
                )
            };
            return Err(self.error_at(cmd.pos, cmd, ExecErrorKind::Function, message));
        }
        if let Some(max) = function.max_args
            && given > max
        {
            return Err(self.error_at(
                cmd.pos,
                cmd,
                ExecErrorKind::Function,
                format!("wrong number of args for {}: want {} got {}", name, max, given),
            ));
        }

        let result = match function.callable {
            Callable::And | Callable::Or => {
                let stop_on = matches!(function.callable, Callable::Or);
                let mut value = Value::Nil;
                for arg in args {
                    value = self.eval_arg(dot, arg)?;
                    if value.is_truthy() == stop_on {
                        return Ok(value);
                    }
                }
                if let Some(last) = last {
                    value = last;
                }
                return Ok(value);
            }
            Callable::Pure(f) => {
                let values = self.eval_args(dot, args, last)?;
                f(&values)
            }
            Callable::Stateful(f) => {
                let values = self.eval_args(dot, args, last)?;
                f(self, &values)
            }
        };

        result.map_err(|err| match err {
            FuncError::Call { kind, message } => self.error_at(
                cmd.pos,
                cmd,
                kind,
                format!("error calling {}: {}", name, message),
            ),
            FuncError::Arg(message) => self.error_at(cmd.pos, cmd, ExecErrorKind::Type, message),
            FuncError::Nested(inner) => inner,
        })
    }

    fn eval_args(
        &mut self,
        dot: &Value,
        args: &[Argument],
        last: Option<Value>,
    ) -> Result<Vec<Value>, ExecError> {
        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            values.push(self.eval_arg(dot, arg)?);
        }
        values.extend(last);
        Ok(values)
    }

    fn eval_arg(&mut self, dot: &Value, arg: &Argument) -> Result<Value, ExecError> {
        match &arg.kind {
            ArgumentKind::Dot => Ok(dot.clone()),
            ArgumentKind::Nil => Ok(Value::Nil),
            ArgumentKind::Field(path) => {
                self.eval_fields(dot, dot.clone(), true, path, arg, &[], None)
            }
            ArgumentKind::Variable { name, fields } => {
                let value = self.var_value(arg, name)?;
                if fields.is_empty() {
                    return Ok(value);
                }
                self.eval_fields(dot, value, false, fields, arg, &[], None)
            }
            ArgumentKind::Pipeline(pipe) => self.eval_pipeline(dot, pipe),
            ArgumentKind::Identifier(name) => {
                let cmd = Command {
                    pos: arg.pos,
                    args: vec![arg.clone()],
                };
                self.eval_function(dot, name, &cmd, None)
            }
            ArgumentKind::Chain { base, fields } => {
                let receiver = self.eval_arg(dot, base)?;
                self.eval_fields(dot, receiver, false, fields, arg, &[], None)
            }
            ArgumentKind::Bool(_) | ArgumentKind::Number(_) | ArgumentKind::String(_) => {
                Ok(constant(&arg.kind))
            }
        }
    }
}

/// Source form of a `template` action as Go prints it
fn template_node(call: &TemplateCall) -> String {
    match &call.pipe {
        Some(pipe) => format!("{{{{template {} {}}}}}", quote(&call.name), pipe),
        None => format!("{{{{template {}}}}}", quote(&call.name)),
    }
}

fn constant(kind: &ArgumentKind) -> Value {
    match kind {
        ArgumentKind::Bool(b) => Value::Bool(*b),
        ArgumentKind::Number(n) => match n.value {
            NumberValue::Int(i) => Value::Int(i),
            NumberValue::Float(f) => Value::Float(f),
        },
        ArgumentKind::String(s) => Value::from(s.as_str()),
        _ => Value::Nil,
    }
}

/// Nil prints as nothing; everything else prints with `%v`
fn print_value(value: &Value, out: &mut String) {
    match value {
        Value::Nil => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn run_with(src: &str, data: Value, options: &ExecOptions) -> Result<String, ExecError> {
        let mut set = TemplateSet::new();
        set.parse("test", src).unwrap();
        set.execute("test", data, options)
    }

    fn run(src: &str, data: Value) -> String {
        run_with(src, data, &ExecOptions::default()).unwrap()
    }

    fn run_err(src: &str, data: Value) -> String {
        run_with(src, data, &ExecOptions::default()).unwrap_err().to_string()
    }

    fn data(json: serde_json::Value) -> Value {
        Value::from_json(&json)
    }

    #[test]
    fn test_fields_and_pipelines() {
        let d = data(serde_json::json!({"Values": {"name": "web", "port": 80}}));
        assert_eq!(run("{{ .Values.name }}:{{ .Values.port }}", d.clone()), "web:80");
        assert_eq!(run("{{ .Values.missing }}", d.clone()), "");
        assert_eq!(run("{{ .Values.name | printf \"%s-x\" }}", d), "web-x");
    }

    #[test]
    fn test_nil_intermediate_field_errors() {
        let d = data(serde_json::json!({"Values": {}}));
        assert_eq!(
            run_err("{{ .Values.a.b }}", d),
            "template: test:1:3: executing \"test\" at <.Values.a.b>: nil pointer evaluating interface {}.b"
        );
    }

    #[test]
    fn test_strict_missing_key() {
        let d = data(serde_json::json!({"Values": {}}));
        let options = ExecOptions {
            strict: true,
            ..ExecOptions::default()
        };
        let err = run_with("{{ .Values.x }}", d, &options).unwrap_err();
        assert_eq!(err.message, "map has no entry for key \"x\"");
        assert_eq!(err.kind, ExecErrorKind::Field);
    }

    #[test]
    fn test_field_on_scalar() {
        let d = data(serde_json::json!({"name": "web"}));
        assert_eq!(
            run_err("{{ .name.first }}", d),
            "template: test:1:7: executing \"test\" at <.name.first>: can't evaluate field first in type interface {}"
        );
    }

    #[test]
    fn test_range_over_sorted_map_with_vars() {
        let d = data(serde_json::json!({"m": {"b": 2, "a": 1}}));
        assert_eq!(run("{{ range $k, $v := .m }}{{ $k }}={{ $v }};{{ end }}", d), "a=1;b=2;");
    }

    #[test]
    fn test_range_list_else_and_break() {
        let d = data(serde_json::json!({"l": [1, 2, 3, 4], "e": []}));
        assert_eq!(
            run(
                "{{ range $i, $x := .l }}{{ if eq $x 3 }}{{ break }}{{ end }}{{ $i }}{{ end }}",
                d.clone()
            ),
            "01"
        );
        let src = "{{ range .l }}{{ if eq . 2 }}{{ continue }}{{ end }}{{ . }}{{ end }}";
        let skipped = run(src, d.clone());
        assert_eq!(skipped, "134");
        assert_eq!(run("{{ range .e }}x{{ else }}empty{{ end }}", d), "empty");
    }

    #[test]
    fn test_range_over_int() {
        assert_eq!(run("{{ range 3 }}{{ . }}{{ end }}", Value::Nil), "012");
    }

    #[test]
    fn test_with_rebinds_dot() {
        let d = data(serde_json::json!({"a": {"b": "x"}, "z": ""}));
        assert_eq!(run("{{ with .a }}{{ .b }}{{ end }}", d.clone()), "x");
        assert_eq!(run("{{ with .z }}set{{ else }}unset{{ end }}", d), "unset");
    }

    #[test]
    fn test_variable_assignment_across_scopes() {
        let src = "{{ $v := 1 }}{{ if true }}{{ $v = 2 }}{{ end }}{{ $v }}";
        assert_eq!(run(src, Value::Nil), "2");
    }

    #[test]
    fn test_root_variable_inside_range() {
        let d = data(serde_json::json!({"l": [1], "name": "top"}));
        assert_eq!(run("{{ range .l }}{{ $.name }}{{ end }}", d), "top");
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(run("{{ and 1 0 \"x\" }}", Value::Nil), "0");
        assert_eq!(run("{{ or 0 \"\" \"x\" }}", Value::Nil), "x");
        assert_eq!(run("{{ or 0 false }}", Value::Nil), "false");
        // the failing call is never evaluated
        assert_eq!(run("{{ or 1 (fail \"boom\") }}", Value::Nil), "1");
    }

    #[test]
    fn test_template_and_define() {
        let src = r#"{{ define "greet" }}hi {{ . }}{{ end }}{{ template "greet" "bob" }}"#;
        assert_eq!(run(src, Value::Nil), "hi bob");
    }

    #[test]
    fn test_template_not_found() {
        let err =
            run_with(r#"{{ template "nope" }}"#, Value::Nil, &ExecOptions::default()).unwrap_err();
        assert_eq!(
            err.kind,
            ExecErrorKind::TemplateNotFound {
                name: "nope".to_string()
            }
        );
        assert_eq!(err.message, "template \"nope\" not defined");
        assert_eq!(err.node, "{{template \"nope\"}}");
    }

    #[test]
    fn test_function_error_is_wrapped() {
        assert_eq!(
            run_err("{{ fail \"boom\" }}", Value::Nil),
            "template: test:1:3: executing \"test\" at <fail \"boom\">: error calling fail: boom"
        );
    }

    #[test]
    fn test_wrong_arg_count() {
        assert_eq!(
            run_err("{{ upper }}", Value::Nil),
            "template: test:1:3: executing \"test\" at <upper>: wrong number of args for upper: want 1 got 0"
        );
    }

    #[test]
    fn test_argument_to_non_function() {
        let d = data(serde_json::json!({"x": 1}));
        assert_eq!(
            run_err("{{ .x 1 }}", d),
            "template: test:1:3: executing \"test\" at <.x>: x is not a method but has arguments"
        );
        assert_eq!(
            run_err("{{ $x := 1 }}{{ $x 2 }}", Value::Nil),
            "template: test:1:17: executing \"test\" at <$x>: can't give argument to non-function $x"
        );
    }

    fn run_session(src: &str, options: &ExecOptions) -> (Result<String, ExecError>, Session) {
        let mut set = TemplateSet::new();
        set.parse("test", src).unwrap();
        let mut session = Session::default();
        let result = execute(&set, "test", Value::Nil, options, &mut session);
        (result, session)
    }

    #[test]
    fn test_parenthesized_stage_fails_at_runtime() {
        let d = data(serde_json::json!({"x": 1}));
        let err = run_err("{{ .x | (printf \"%d\" 2) }}", d);
        assert!(err.contains("can't give argument to non-function"));
    }

    #[test]
    fn test_list_has_method() {
        let d = data(serde_json::json!({"versions": ["v1", "apps/v1"]}));
        assert_eq!(run("{{ .versions.Has \"apps/v1\" }}", d.clone()), "true");
        assert_eq!(run("{{ .versions.Has \"batch/v9\" }}", d.clone()), "false");
        assert!(run_err("{{ .versions.Has }}", d).contains("can't evaluate field Has"));
    }

    #[test]
    fn test_runaway_include_renders_empty() {
        let src = r#"{{ define "loop" }}{{ include "loop" . }}{{ end }}a{{ include "loop" . }}b"#;
        let (result, mut session) = run_session(src, &ExecOptions::default());
        assert_eq!(result.unwrap(), "ab");
        let truncated = session.take_truncated();
        assert_eq!(truncated.len(), 1);
        assert!(truncated[0].contains("loop: exceeded maximum nesting depth (64)"));
    }

    #[test]
    fn test_blocks_count_toward_nesting() {
        let src = concat!(
            r#"{{ define "deep" }}{{ if true }}{{ with . }}x{{ template "deep" . }}{{ end }}{{ end }}{{ end }}"#,
            r#"{{ template "deep" 1 }}!"#,
        );
        let options = ExecOptions {
            max_nesting_depth: 7,
            ..ExecOptions::default()
        };
        let (result, mut session) = run_session(src, &options);
        assert_eq!(result.unwrap(), "!");
        assert_eq!(session.take_truncated().len(), 1);

        // nesting within a single tree has no call site to contain it
        let options = ExecOptions {
            max_nesting_depth: 1,
            ..ExecOptions::default()
        };
        let (result, _) = run_session("{{ if true }}{{ if true }}x{{ end }}{{ end }}", &options);
        assert_eq!(result.unwrap_err().kind, ExecErrorKind::Recursion);
    }

    #[test]
    fn test_mutual_recursion_is_bounded() {
        let src = concat!(
            r#"{{ define "a" }}{{ include "b" . }}{{ end }}"#,
            r#"{{ define "b" }}{{ include "a" . }}{{ end }}"#,
            r#"{{ include "a" . | upper }}done"#,
        );
        let (result, mut session) = run_session(src, &ExecOptions::default());
        assert_eq!(result.unwrap(), "done");
        assert_eq!(session.take_truncated().len(), 1);
    }

    #[test]
    fn test_lint_mode_records_warning() {
        let mut set = TemplateSet::new();
        set.parse("test", "a{{ required \"need x\" .x }}b").unwrap();
        let options = ExecOptions {
            lint_mode: true,
            ..ExecOptions::default()
        };
        let mut session = Session::default();
        let data = Value::from_map(Map::new());
        let out = execute(&set, "test", data, &options, &mut session).unwrap();
        assert_eq!(out, "ab");
        assert_eq!(session.take_warnings(), vec!["need x".to_string()]);
    }
}
