//! Named template registry
//!
//! A `TemplateSet` is built fresh for every render and never shared between
//! renders. Aliases point at the same parsed tree under another name.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Tree;
use crate::error::{ExecError, ParseError};
use crate::exec::{self, ExecOptions, Session};
use crate::parser;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    trees: HashMap<String, Rc<Tree>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a file and register every tree it defines
    ///
    /// Returns the names that were added or replaced, file name first.
    pub fn parse(&mut self, name: &str, source: &str) -> Result<Vec<String>, ParseError> {
        let trees = parser::parse(name, source)?;
        let mut added = Vec::with_capacity(trees.len());
        for tree in trees {
            let tree_name = tree.name.clone();
            if self.add_tree(tree) {
                added.push(tree_name);
            }
        }
        Ok(added)
    }

    /// Register a tree; an empty tree never replaces an existing one
    pub fn add_tree(&mut self, tree: Tree) -> bool {
        if tree.is_empty() && self.trees.contains_key(&tree.name) {
            return false;
        }
        self.trees.insert(tree.name.clone(), Rc::new(tree));
        true
    }

    /// Make `alias` resolve to the tree registered as `target`
    pub fn alias(&mut self, alias: &str, target: &str) -> bool {
        match self.trees.get(target).cloned() {
            Some(tree) => {
                self.trees.insert(alias.to_string(), tree);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Tree>> {
        self.trees.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trees.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Execute a named template with a fresh session
    pub fn execute(
        &self,
        name: &str,
        data: Value,
        options: &ExecOptions,
    ) -> Result<String, ExecError> {
        let mut session = Session::default();
        exec::execute(self, name, data, options, &mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registers_defines() {
        let mut set = TemplateSet::new();
        let added = set
            .parse("chart/templates/_helpers.tpl", r#"{{define "chart.name"}}web{{end}}"#)
            .unwrap();
        assert_eq!(added, vec!["chart/templates/_helpers.tpl", "chart.name"]);
        assert!(set.contains("chart.name"));
    }

    #[test]
    fn test_empty_definition_keeps_existing() {
        let mut set = TemplateSet::new();
        set.parse("a", r#"{{define "x"}}first{{end}}"#).unwrap();
        set.parse("b", r#"{{define "x"}}  {{end}}"#).unwrap();
        let out = set.execute("x", Value::Nil, &ExecOptions::default()).unwrap();
        assert_eq!(out, "first");

        set.parse("c", r#"{{define "x"}}second{{end}}"#).unwrap();
        let out = set.execute("x", Value::Nil, &ExecOptions::default()).unwrap();
        assert_eq!(out, "second");
    }

    #[test]
    fn test_alias_shares_tree() {
        let mut set = TemplateSet::new();
        set.parse("h", r#"{{define "name"}}n{{end}}"#).unwrap();
        assert!(set.alias("sub.name", "name"));
        assert!(!set.alias("sub.other", "missing"));
        assert!(Rc::ptr_eq(set.get("name").unwrap(), set.get("sub.name").unwrap()));
        assert_eq!(set.names(), vec!["h", "name", "sub.name"]);
    }
}
