//! Expression interpreter
//!
//! Evaluation never touches the host: names resolve through an explicit
//! [`Scope`] stack and calls go to the [`FunctionRegistry`] or the built-ins.

use indexmap::IndexMap;

use super::{
    ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp},
    builtins::{self, FunctionRegistry},
    Value,
};

/// Stack of variable frames; the bottom frame holds the template data
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<IndexMap<String, Value>>,
}

impl Scope {
    pub fn new(globals: IndexMap<String, Value>) -> Self {
        Self {
            frames: vec![globals],
        }
    }

    /// Build the global frame from template data; non-object data binds nothing
    pub fn from_data(data: &Value) -> Self {
        match data {
            Value::Object(map) => Self::new(map.clone()),
            _ => Self::new(IndexMap::new()),
        }
    }

    pub fn push(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn push_frame(&mut self, frame: IndexMap<String, Value>) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Bind `name` in the innermost frame
    pub fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Update the nearest binding of `name`, or create it in the innermost frame
    pub fn assign(&mut self, name: &str, value: Value) {
        match self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.contains_key(name))
        {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => self.declare(name, value),
        }
    }
}

/// Evaluation context: a scope plus the callable functions
pub struct Interpreter<'f> {
    pub scope: Scope,
    functions: &'f FunctionRegistry,
}

impl<'f> Interpreter<'f> {
    pub fn new(scope: Scope, functions: &'f FunctionRegistry) -> Self {
        Self { scope, functions }
    }

    pub fn exec(&mut self, stmts: &[Stmt]) -> Result<(), String> {
        for stmt in stmts {
            match stmt {
                Stmt::Declare { name, value } => {
                    let value = self.eval(value)?;
                    self.scope.declare(name, value);
                }
                Stmt::Assign { name, op, value } => {
                    let rhs = self.eval(value)?;
                    let value = match op {
                        AssignOp::Set => rhs,
                        AssignOp::Add => add(&self.current(name), &rhs),
                        AssignOp::Sub => Value::Number(self.current(name).to_number() - rhs.to_number()),
                    };
                    self.scope.assign(name, value);
                }
                Stmt::Expr { expr } => {
                    self.eval(expr)?;
                }
            }
        }
        Ok(())
    }

    fn current(&self, name: &str) -> Value {
        self.scope.get(name).cloned().unwrap_or_default()
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, String> {
        match expr {
            Expr::Literal { value } => Ok(value.to_value()),
            Expr::Ident { name } => Ok(self.current(name)),
            Expr::Array { items } => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Object { entries } => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member { object, property } => {
                Ok(builtins::property(&self.eval(object)?, property))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let key = match self.eval(index)? {
                    Value::Number(n) if n >= 0.0 && n.fract() == 0.0 => format!("{}", n as u64),
                    other => other.to_string(),
                };
                Ok(builtins::property(&object, &key))
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_name()),
                })
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Value, String> {
        let args: Vec<Value> = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<_, _>>()?;

        match callee {
            Expr::Ident { name } => {
                if let Some(function) = self.functions.get(name) {
                    return function(&args);
                }
                builtins::call_global(name, &args)
                    .unwrap_or_else(|| Err(format!("{} is not a function", name)))
            }
            Expr::Member { object, property } => {
                if let Expr::Ident { name } = object.as_ref() {
                    if self.scope.get(name).is_none() {
                        if let Some(result) = builtins::call_namespace(name, property, &args) {
                            return result;
                        }
                    }
                }
                let receiver = self.eval(object)?;
                builtins::call_method(&receiver, property, &args)
            }
            _ => Err("expression is not a function".to_string()),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, String> {
        let lhs = self.eval(left)?;
        match op {
            BinaryOp::And if !lhs.truthy() => return Ok(lhs),
            BinaryOp::Or if lhs.truthy() => return Ok(lhs),
            BinaryOp::Coalesce if !lhs.is_nullish() => return Ok(lhs),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => return self.eval(right),
            _ => {}
        }

        let rhs = self.eval(right)?;
        let number = |f: fn(f64, f64) -> f64| Value::Number(f(lhs.to_number(), rhs.to_number()));
        Ok(match op {
            BinaryOp::Add => add(&lhs, &rhs),
            BinaryOp::Sub => number(|a, b| a - b),
            BinaryOp::Mul => number(|a, b| a * b),
            BinaryOp::Div => number(|a, b| a / b),
            BinaryOp::Rem => number(|a, b| a % b),
            BinaryOp::Lt => Value::Bool(compare(&lhs, &rhs, |o| o.is_lt())),
            BinaryOp::Le => Value::Bool(compare(&lhs, &rhs, |o| o.is_le())),
            BinaryOp::Gt => Value::Bool(compare(&lhs, &rhs, |o| o.is_gt())),
            BinaryOp::Ge => Value::Bool(compare(&lhs, &rhs, |o| o.is_ge())),
            BinaryOp::Eq => Value::Bool(lhs.loose_eq(&rhs)),
            BinaryOp::Ne => Value::Bool(!lhs.loose_eq(&rhs)),
            BinaryOp::StrictEq => Value::Bool(lhs.strict_eq(&rhs)),
            BinaryOp::StrictNe => Value::Bool(!lhs.strict_eq(&rhs)),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => rhs,
        })
    }
}

/// `+`: string concatenation when either side is not a primitive number-like
pub(crate) fn add(lhs: &Value, rhs: &Value) -> Value {
    let concatenates = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if concatenates(lhs) || concatenates(rhs) {
        Value::String(format!("{}{}", lhs, rhs))
    } else {
        Value::Number(lhs.to_number() + rhs.to_number())
    }
}

fn compare(lhs: &Value, rhs: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    };
    ordering.map_or(false, test)
}
