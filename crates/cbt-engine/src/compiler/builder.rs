//! Assembles classified directives into a nested [`Program`]

use super::{
    directive::Directive,
    program::{Branch, Node, Program},
};
use crate::{
    error::{Result, TemplateError},
    expr::Expr,
};

/// Deepest allowed nesting of `if`, `foreach` and `define`
pub const MAX_NESTING_DEPTH: usize = 128;

/// A segment of template text after tag matching
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Directive(Directive),
}

enum Frame {
    If {
        branches: Vec<Branch>,
        /// `None` once `else` has been seen
        condition: Option<Expr>,
        nodes: Vec<Node>,
    },
    Foreach {
        item: String,
        source: Expr,
        /// Loop body, set when `foreachelse` is reached
        body: Option<Vec<Node>>,
        nodes: Vec<Node>,
    },
    Define {
        name: String,
        params: Vec<String>,
        nodes: Vec<Node>,
    },
}

impl Frame {
    fn nodes_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::If { nodes, .. } | Frame::Foreach { nodes, .. } | Frame::Define { nodes, .. } => {
                nodes
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Frame::If { .. } => "if",
            Frame::Foreach { .. } => "foreach",
            Frame::Define { .. } => "define",
        }
    }
}

/// Build a program from segments in document order
pub fn build(segments: Vec<Segment>) -> Result<Program> {
    let defines = segments
        .iter()
        .filter(|s| matches!(s, Segment::Directive(Directive::EndDefine)))
        .count();

    let mut builder = Builder {
        root: Vec::new(),
        frames: Vec::new(),
        defines_left: defines,
    };
    for segment in segments {
        match segment {
            Segment::Text(text) if !text.is_empty() => builder.push(Node::Text { text }),
            Segment::Text(_) => {}
            Segment::Directive(directive) => builder.directive(directive)?,
        }
    }
    builder.finish()
}

struct Builder {
    root: Vec<Node>,
    frames: Vec<Frame>,
    defines_left: usize,
}

impl Builder {
    fn push(&mut self, node: Node) {
        match self.frames.last_mut() {
            Some(frame) => frame.nodes_mut().push(node),
            None => self.root.push(node),
        }
    }

    fn open(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= MAX_NESTING_DEPTH {
            return Err(TemplateError::structure(format!(
                "`{}` nested deeper than {} levels",
                frame.describe(),
                MAX_NESTING_DEPTH
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn directive(&mut self, directive: Directive) -> Result<()> {
        match directive {
            Directive::Output { expr, filter } => self.push(Node::Output { expr, filter }),
            Directive::Statements(stmts) => {
                if !stmts.is_empty() {
                    self.push(Node::Exec { stmts });
                }
            }
            Directive::Run { name, args } => self.push(Node::Run { name, args }),
            Directive::Marker => {}

            Directive::If(condition) => self.open(Frame::If {
                branches: Vec::new(),
                condition: Some(condition),
                nodes: Vec::new(),
            })?,
            Directive::ElseIf(next) => match self.frames.last_mut() {
                Some(Frame::If {
                    branches,
                    condition: condition @ Some(_),
                    nodes,
                }) => {
                    if let Some(previous) = condition.replace(next) {
                        branches.push(Branch {
                            condition: previous,
                            body: std::mem::take(nodes),
                        });
                    }
                }
                _ => return Err(self.unexpected("elseif")),
            },
            Directive::Else => match self.frames.last_mut() {
                Some(Frame::If {
                    branches,
                    condition: condition @ Some(_),
                    nodes,
                }) => {
                    if let Some(previous) = condition.take() {
                        branches.push(Branch {
                            condition: previous,
                            body: std::mem::take(nodes),
                        });
                    }
                }
                _ => return Err(self.unexpected("else")),
            },
            Directive::EndIf => match self.frames.pop() {
                Some(Frame::If {
                    mut branches,
                    condition,
                    nodes,
                }) => {
                    let otherwise = match condition {
                        Some(condition) => {
                            branches.push(Branch {
                                condition,
                                body: nodes,
                            });
                            Vec::new()
                        }
                        None => nodes,
                    };
                    self.push(Node::If {
                        branches,
                        otherwise,
                    });
                }
                other => return Err(self.restore_and_fail(other, "/if")),
            },

            Directive::Foreach { item, source } => self.open(Frame::Foreach {
                item,
                source,
                body: None,
                nodes: Vec::new(),
            })?,
            Directive::ForeachElse => match self.frames.last_mut() {
                Some(Frame::Foreach {
                    body: body @ None,
                    nodes,
                    ..
                }) => *body = Some(std::mem::take(nodes)),
                _ => return Err(self.unexpected("foreachelse")),
            },
            Directive::ForeachBreak => {
                let in_loop = self
                    .frames
                    .iter()
                    .rev()
                    .take_while(|frame| !matches!(frame, Frame::Define { .. }))
                    .any(|frame| matches!(frame, Frame::Foreach { .. }));
                if !in_loop {
                    return Err(TemplateError::structure("`foreachbreak` outside of `foreach`"));
                }
                self.push(Node::Break);
            }
            Directive::EndForeach => match self.frames.pop() {
                Some(Frame::Foreach {
                    item,
                    source,
                    body,
                    nodes,
                }) => {
                    let (body, empty) = match body {
                        Some(body) => (body, nodes),
                        None => (nodes, Vec::new()),
                    };
                    self.push(Node::Foreach {
                        item,
                        source,
                        body,
                        empty,
                    });
                }
                other => return Err(self.restore_and_fail(other, "/foreach")),
            },

            Directive::Define { name, params } => self.open(Frame::Define {
                name,
                params,
                nodes: Vec::new(),
            })?,
            Directive::EndDefine => match self.frames.pop() {
                Some(Frame::Define {
                    name,
                    params,
                    nodes,
                }) => {
                    self.push(Node::Define {
                        name,
                        params,
                        body: nodes,
                    });
                    self.defines_left = self.defines_left.saturating_sub(1);
                    if self.defines_left == 0 {
                        self.push(Node::SelectSub);
                    }
                }
                other => return Err(self.restore_and_fail(other, "/define")),
            },
        }
        Ok(())
    }

    fn unexpected(&self, keyword: &str) -> TemplateError {
        match self.frames.last() {
            Some(frame) => TemplateError::structure(format!(
                "unexpected `{}` inside `{}`",
                keyword,
                frame.describe()
            )),
            None => TemplateError::structure(format!("unexpected `{}`", keyword)),
        }
    }

    fn restore_and_fail(&mut self, popped: Option<Frame>, keyword: &str) -> TemplateError {
        if let Some(frame) = popped {
            self.frames.push(frame);
        }
        self.unexpected(keyword)
    }

    fn finish(self) -> Result<Program> {
        match self.frames.last() {
            Some(frame) => Err(TemplateError::structure(format!(
                "unclosed `{}`",
                frame.describe()
            ))),
            None => Ok(Program::new(self.root)),
        }
    }
}
