//! AST (Abstract Syntax Tree) for Go templates
//!
//! Trees are immutable once parsed. `Display` reproduces the template
//! syntax of a node, which is what execution errors quote after `at <...>`.

use std::fmt;
use std::rc::Rc;

use crate::format::quote;

/// Byte offset into the source a tree was parsed from
pub type Pos = usize;

/// A named template: either a whole file or a `define`/`block` body
#[derive(Debug, Clone)]
pub struct Tree {
    /// Name the tree is registered under
    pub name: String,
    /// Name of the file the tree was parsed from
    pub parse_name: String,
    /// Full text of that file, shared by every tree it defines
    pub source: Rc<str>,
    pub root: Vec<Node>,
}

impl Tree {
    /// A tree with nothing but whitespace text
    pub fn is_empty(&self) -> bool {
        self.root.iter().all(|node| match node {
            Node::Text(text) => text.trim().is_empty(),
            _ => false,
        })
    }

    /// 1-based line and Go-style column of a position in this tree's source
    pub fn location(&self, pos: Pos) -> (usize, usize) {
        let pos = pos.min(self.source.len());
        let before = &self.source[..pos];
        let line = 1 + before.matches('\n').count();
        let column = match before.rfind('\n') {
            Some(nl) => pos - (nl + 1),
            None => pos,
        };
        (line, column)
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// Raw text, already trimmed by any adjacent trim markers
    Text(String),
    /// `{{ pipeline }}`, including declarations `{{ $x := pipeline }}`
    Action(Action),
    If(Branch),
    Range(Branch),
    With(Branch),
    /// `{{ template "name" pipeline }}`, also produced by `block`
    Template(TemplateCall),
    Break(Pos),
    Continue(Pos),
}

#[derive(Debug, Clone)]
pub struct Action {
    pub pos: Pos,
    pub pipe: Pipeline,
}

/// Shared shape of `if`, `range` and `with`
#[derive(Debug, Clone)]
pub struct Branch {
    pub pos: Pos,
    pub pipe: Pipeline,
    pub list: Vec<Node>,
    /// `else` body; an `else if`/`else with` chain is a single nested node
    pub else_list: Option<Vec<Node>>,
}

#[derive(Debug, Clone)]
pub struct TemplateCall {
    pub pos: Pos,
    pub name: String,
    pub pipe: Option<Pipeline>,
}

/// A sequence of commands separated by `|`
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub pos: Pos,
    /// Declared or assigned variables, including the `$`
    pub decl: Vec<String>,
    /// `=` rather than `:=`
    pub is_assign: bool,
    pub commands: Vec<Command>,
}

/// One pipeline stage: a callee followed by its arguments
#[derive(Debug, Clone)]
pub struct Command {
    pub pos: Pos,
    pub args: Vec<Argument>,
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub pos: Pos,
    pub kind: ArgumentKind,
}

#[derive(Debug, Clone)]
pub enum ArgumentKind {
    Dot,
    Nil,
    Bool(bool),
    Number(Number),
    String(String),
    /// Function name
    Identifier(String),
    /// `.A.B`, an empty path never occurs (that is `Dot`)
    Field(Vec<String>),
    /// `$x.A.B`
    Variable { name: String, fields: Vec<String> },
    /// `(pipeline).A.B`
    Chain { base: Box<Argument>, fields: Vec<String> },
    /// Parenthesized pipeline
    Pipeline(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    /// Text as written
    pub text: String,
    pub value: NumberValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            write!(
                f,
                "{} {} ",
                self.decl.join(", "),
                if self.is_assign { "=" } else { ":=" }
            )?;
        }
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match &arg.kind {
                ArgumentKind::Pipeline(pipe) => write!(f, "({})", pipe)?,
                _ => write!(f, "{}", arg)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ArgumentKind::Dot => f.write_str("."),
            ArgumentKind::Nil => f.write_str("nil"),
            ArgumentKind::Bool(b) => write!(f, "{}", b),
            ArgumentKind::Number(n) => f.write_str(&n.text),
            ArgumentKind::String(s) => f.write_str(&quote(s)),
            ArgumentKind::Identifier(name) => f.write_str(name),
            ArgumentKind::Field(path) => {
                for seg in path {
                    write!(f, ".{}", seg)?;
                }
                Ok(())
            }
            ArgumentKind::Variable { name, fields } => {
                f.write_str(name)?;
                for seg in fields {
                    write!(f, ".{}", seg)?;
                }
                Ok(())
            }
            ArgumentKind::Chain { base, fields } => {
                match &base.kind {
                    ArgumentKind::Pipeline(pipe) => write!(f, "({})", pipe)?,
                    _ => write!(f, "{}", base)?,
                }
                for seg in fields {
                    write!(f, ".{}", seg)?;
                }
                Ok(())
            }
            ArgumentKind::Pipeline(pipe) => write!(f, "{}", pipe),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(kind: ArgumentKind) -> Argument {
        Argument { pos: 0, kind }
    }

    #[test]
    fn test_pipeline_display() {
        let pipe = Pipeline {
            pos: 0,
            decl: vec!["$x".to_string()],
            is_assign: false,
            commands: vec![
                Command {
                    pos: 0,
                    args: vec![arg(ArgumentKind::Field(vec!["Values".into(), "name".into()]))],
                },
                Command {
                    pos: 0,
                    args: vec![
                        arg(ArgumentKind::Identifier("default".into())),
                        arg(ArgumentKind::String("x".into())),
                    ],
                },
            ],
        };
        assert_eq!(pipe.to_string(), "$x := .Values.name | default \"x\"");
    }

    #[test]
    fn test_tree_location() {
        let tree = Tree {
            name: "t".into(),
            parse_name: "t".into(),
            source: Rc::from("ab\ncd {{ .x }}"),
            root: vec![],
        };
        assert_eq!(tree.location(1), (1, 1));
        assert_eq!(tree.location(9), (2, 6));
    }

    #[test]
    fn test_whitespace_tree_is_empty() {
        let tree = Tree {
            name: "t".into(),
            parse_name: "t".into(),
            source: Rc::from(""),
            root: vec![Node::Text("  \n".into())],
        };
        assert!(tree.is_empty());
    }
}
