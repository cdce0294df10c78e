//! Compiled program representation
//!
//! A [`Program`] is the output of the directive compiler: a tree of render
//! nodes whose expressions are already parsed. It serializes to JSON, which is
//! the body stored in the compiled-template cache.

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    expr::{Expr, Stmt},
};

/// How an output directive transforms its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// HTML-escape
    Escape,
    /// Insert verbatim
    Raw,
    /// Percent-encode as a URL component
    Url,
    /// Escape for event-handler attributes
    Attr,
    /// Join array items, each HTML-escaped
    Join { separator: String },
    /// Two-decimal currency formatting
    Money,
    /// Truncate with an ellipsis, then HTML-escape
    Truncate { length: usize },
    /// Make an http(s) URL protocol-relative, then HTML-escape
    Protocol,
}

/// One `if`/`elseif` arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Text {
        text: String,
    },
    Output {
        expr: Expr,
        filter: Filter,
    },
    If {
        branches: Vec<Branch>,
        otherwise: Vec<Node>,
    },
    Foreach {
        item: String,
        source: Expr,
        body: Vec<Node>,
        /// `foreachelse` branch, run when the source is empty or missing
        empty: Vec<Node>,
    },
    Break,
    Exec {
        stmts: Vec<Stmt>,
    },
    Define {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
    /// Placed after the last `define`: renders only the requested
    /// sub-template when one was selected at render time
    SelectSub,
    Run {
        name: String,
        args: Vec<Expr>,
    },
}

/// A compiled template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub nodes: Vec<Node>,
}

impl Program {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Serialize for the compiled-template cache
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a cached body
    ///
    /// serde_json's recursion limit is lifted because nested nodes and
    /// expressions each add several JSON levels. Depth is bounded at compile
    /// time instead, by [`MAX_NESTING_DEPTH`](super::MAX_NESTING_DEPTH) and the
    /// expression parser's own limit.
    pub fn decode(body: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(body);
        deserializer.disable_recursion_limit();
        let program = Program::deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(program)
    }

    /// Names of every sub-template defined anywhere in the program
    pub(crate) fn sub_templates(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_defines(&self.nodes, &mut names);
        names
    }
}

fn collect_defines<'a>(nodes: &'a [Node], names: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            Node::Define { name, body, .. } => {
                names.push(name);
                collect_defines(body, names);
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    collect_defines(&branch.body, names);
                }
                collect_defines(otherwise, names);
            }
            Node::Foreach { body, empty, .. } => {
                collect_defines(body, names);
                collect_defines(empty, names);
            }
            _ => {}
        }
    }
}
