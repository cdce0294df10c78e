//! Compiled template execution

use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    compiler::{Filter, Node, Program},
    error::{Result, TemplateError},
    expr::{FunctionRegistry, Interpreter, Scope, Value},
    helpers,
};

/// Maximum nesting of `run` calls before rendering fails
pub const MAX_SUB_DEPTH: usize = 64;

/// A compiled template bound to the engine's functions
#[derive(Debug, Clone)]
pub struct Template {
    program: Arc<Program>,
    functions: Arc<FunctionRegistry>,
}

impl Template {
    pub fn new(program: Program, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            program: Arc::new(program),
            functions,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Render the whole template with `data` bound as top-level names
    pub fn render(&self, data: &serde_json::Value) -> Result<String> {
        self.render_value(&Value::from(data), None)
    }

    /// Render only the sub-template `name`
    ///
    /// The data is available to the program as `value` and is passed as the
    /// sub-template's only argument. An unknown name renders an empty string.
    pub fn render_sub(&self, data: &serde_json::Value, name: &str) -> Result<String> {
        self.render_value(&Value::from(data), Some(name))
    }

    pub fn render_value(&self, data: &Value, sub: Option<&str>) -> Result<String> {
        if let Some(name) = sub {
            if !self.program.sub_templates().contains(&name) {
                debug!(sub = %name, "Template defines no such sub-template");
                return Ok(String::new());
            }
        }

        let scope = match sub {
            Some(_) => {
                let mut globals = IndexMap::new();
                globals.insert("value".to_string(), data.clone());
                Scope::new(globals)
            }
            None => Scope::from_data(data),
        };

        let mut renderer = Renderer {
            interpreter: Interpreter::new(scope, &self.functions),
            out: String::new(),
            subs: HashMap::new(),
            selected: sub,
            depth: 0,
        };
        renderer.nodes(&self.program.nodes)?;
        Ok(renderer.out)
    }
}

enum Flow {
    Next,
    Break,
    Return,
}

struct Sub<'p> {
    params: &'p [String],
    body: &'p [Node],
}

struct Renderer<'p, 'f> {
    interpreter: Interpreter<'f>,
    out: String,
    /// Sub-templates registered so far in this render
    subs: HashMap<&'p str, Sub<'p>>,
    selected: Option<&'p str>,
    depth: usize,
}

impl<'p, 'f> Renderer<'p, 'f> {
    fn nodes(&mut self, nodes: &'p [Node]) -> Result<Flow> {
        for node in nodes {
            match self.node(node)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    /// Run `nodes` in a fresh variable frame
    fn scoped(&mut self, nodes: &'p [Node], frame: IndexMap<String, Value>) -> Result<Flow> {
        self.interpreter.scope.push_frame(frame);
        let flow = self.nodes(nodes);
        self.interpreter.scope.pop();
        flow
    }

    fn eval(&self, expr: &crate::expr::Expr) -> Result<Value> {
        self.interpreter.eval(expr).map_err(TemplateError::render)
    }

    fn node(&mut self, node: &'p Node) -> Result<Flow> {
        match node {
            Node::Text { text } => self.out.push_str(text),
            Node::Output { expr, filter } => {
                let value = self.eval(expr)?;
                if !value.is_nullish() {
                    self.out.push_str(&apply_filter(&value, filter));
                }
            }
            Node::Exec { stmts } => self
                .interpreter
                .exec(stmts)
                .map_err(TemplateError::render)?,
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    if self.eval(&branch.condition)?.truthy() {
                        return self.scoped(&branch.body, IndexMap::new());
                    }
                }
                return self.scoped(otherwise, IndexMap::new());
            }
            Node::Foreach {
                item,
                source,
                body,
                empty,
            } => {
                let source = self.eval(source)?;
                return self.foreach(item, &source, body, empty);
            }
            Node::Break => return Ok(Flow::Break),
            Node::Define { name, params, body } => {
                self.subs.insert(name.as_str(), Sub { params, body });
            }
            Node::SelectSub => {
                if let Some(name) = self.selected {
                    self.out.clear();
                    let value = self
                        .interpreter
                        .scope
                        .get("value")
                        .cloned()
                        .unwrap_or_default();
                    self.call(name, vec![value])?;
                    return Ok(Flow::Return);
                }
            }
            Node::Run { name, args } => {
                if self.subs.contains_key(name.as_str()) {
                    let args = args
                        .iter()
                        .map(|arg| self.eval(arg))
                        .collect::<Result<Vec<_>>>()?;
                    self.call(name, args)?;
                }
            }
        }
        Ok(Flow::Next)
    }

    fn foreach(
        &mut self,
        item: &str,
        source: &Value,
        body: &'p [Node],
        empty: &'p [Node],
    ) -> Result<Flow> {
        let index_name = format!("{}Index", item);
        let entries: Vec<(Value, Value)> = match source {
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Number(i as f64), v.clone()))
                .collect(),
            Value::Object(map) if !map.is_empty() => map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            _ => {
                return match self.scoped(empty, IndexMap::new())? {
                    Flow::Return => Ok(Flow::Return),
                    _ => Ok(Flow::Next),
                }
            }
        };

        for (index, value) in entries {
            let mut frame = IndexMap::with_capacity(2);
            frame.insert(item.to_string(), value);
            frame.insert(index_name.clone(), index);
            match self.scoped(body, frame)? {
                Flow::Next => {}
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
            }
        }
        Ok(Flow::Next)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<()> {
        let Some(sub) = self.subs.get(name) else {
            return Ok(());
        };
        let (params, body) = (sub.params, sub.body);

        if self.depth >= MAX_SUB_DEPTH {
            return Err(TemplateError::render(format!(
                "sub-template `{}` exceeded the maximum nesting depth of {}",
                name, MAX_SUB_DEPTH
            )));
        }

        let mut args = args.into_iter();
        let frame = params
            .iter()
            .map(|param| (param.clone(), args.next().unwrap_or_default()))
            .collect();

        self.depth += 1;
        let result = self.scoped(body, frame);
        self.depth -= 1;
        result.map(|_| ())
    }
}

fn apply_filter(value: &Value, filter: &Filter) -> String {
    match filter {
        Filter::Escape => helpers::encode_html(&value.to_string()),
        Filter::Raw => value.to_string(),
        Filter::Url => helpers::encode_uri_component(&value.to_string()),
        Filter::Attr => helpers::encode_event_html(&value.to_string()),
        Filter::Join { separator } => helpers::for_each_array(value, separator),
        Filter::Money => helpers::format_money(value),
        Filter::Truncate { length } => {
            helpers::encode_html(&helpers::truncate(&value.to_string(), *length))
        }
        Filter::Protocol => {
            helpers::encode_html(&helpers::replace_url_protocol(&value.to_string()))
        }
    }
}
