//! Directive expression language
//!
//! Expressions are parsed once when a template is compiled and interpreted at
//! render time against an explicit scope.

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{AssignOp, BinaryOp, Expr, Literal, Stmt, UnaryOp};
pub use builtins::{FunctionRegistry, NativeFunction};
pub use eval::{Interpreter, Scope};
pub use parser::{
    parse_arguments, parse_expression, parse_params, parse_statements, MAX_EXPRESSION_DEPTH,
};
pub use value::{format_number, Value};
