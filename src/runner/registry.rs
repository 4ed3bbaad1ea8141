//! The hierarchical registry that loaded modules populate.
//!
//! Every dotted namespace addresses a slot in a tree of objects rooted here. Scripts
//! create object chains (`define a.b.c;`) or assign scalars (`define a.b.n = 1;`).
//! Lookups follow JS truthiness: a slot holding `""`, `0`, `false` or `null` counts as
//! absent, exactly like walking `root[a][b]` would.

use std::collections::BTreeMap;
use std::fmt;

use crate::parser::ast::Literal;
use crate::runner::error::LoaderError;
use crate::runner::namespace::NAMESPACE_SEPARATOR;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Null => false,
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Str(s) => Value::Str(s),
            Literal::Number(n) => Value::Number(n),
            Literal::Bool(b) => Value::Bool(b),
            Literal::Null => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(BTreeMap<String, Node>),
    Value(Value),
}

impl Node {
    fn new_object() -> Self {
        Node::Object(BTreeMap::new())
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Node::Object(_) => true,
            Node::Value(v) => v.is_truthy(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            Node::Object(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    root: BTreeMap<String, Node>,
}

/// Splits a dotted namespace into its path segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(NAMESPACE_SEPARATOR).collect()
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            root: BTreeMap::new(),
        }
    }

    /// Makes sure every segment of `path` is an object, creating the missing ones.
    ///
    /// Falsy scalars in the way are replaced by objects; a truthy scalar is a conflict.
    pub fn create_namespaces(&mut self, path: &str) -> Result<(), LoaderError> {
        let mut current = &mut self.root;
        for segment in segments(path) {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(Node::new_object);
            let truthy_value = match slot {
                Node::Value(v) => Some(v.is_truthy()),
                Node::Object(_) => None,
            };
            if truthy_value == Some(false) {
                *slot = Node::new_object();
            }
            current = match slot {
                Node::Object(children) => children,
                Node::Value(_) => {
                    return Err(LoaderError::NamespaceConflict {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            };
        }
        Ok(())
    }

    /// Stores `value` at `path`, creating the parent chain.
    pub fn assign(&mut self, path: &str, value: Value) -> Result<(), LoaderError> {
        let (parent, leaf) = match path.rfind(NAMESPACE_SEPARATOR) {
            Some(idx) => (Some(&path[..idx]), &path[idx + 1..]),
            None => (None, path),
        };
        if let Some(parent) = parent {
            self.create_namespaces(parent)?;
        }
        let children = self.children_mut(parent);
        match children {
            Some(children) => {
                children.insert(leaf.to_string(), Node::Value(value));
                Ok(())
            }
            None => Err(LoaderError::NamespaceConflict {
                path: path.to_string(),
                segment: leaf.to_string(),
            }),
        }
    }

    fn children_mut(&mut self, path: Option<&str>) -> Option<&mut BTreeMap<String, Node>> {
        let mut current = &mut self.root;
        if let Some(path) = path {
            for segment in segments(path) {
                current = match current.get_mut(segment) {
                    Some(Node::Object(children)) => children,
                    _ => return None,
                };
            }
        }
        Some(current)
    }

    /// Walks `path` from the root. Any absent or falsy segment ends the walk with `None`.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut children = Some(&self.root);
        let mut found = None;
        for segment in segments(path) {
            let node = children?.get(segment).filter(|n| n.is_truthy())?;
            found = Some(node);
            // A scalar has no members; only the last segment may land on one.
            children = match node {
                Node::Object(c) => Some(c),
                Node::Value(_) => None,
            };
        }
        found
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every populated path, depth first, in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut out = vec![];
        collect_names(&self.root, "", &mut out);
        out
    }
}

fn collect_names(children: &BTreeMap<String, Node>, prefix: &str, out: &mut Vec<String>) {
    for (name, node) in children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        out.push(path.clone());
        if let Node::Object(grandchildren) = node {
            collect_names(grandchildren, &path, out);
        }
    }
}
