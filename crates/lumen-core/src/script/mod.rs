//! The block scripting language: a JSX-flavoured JavaScript subset, parsed to an AST and
//! evaluated by a tree-walking interpreter.

pub mod ast;
pub mod environment;
pub mod error;
pub mod host;
pub mod interp;
pub mod intrinsics;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod value;

pub use ast::{Program, Span};
pub use environment::Scope;
pub use error::{ErrorKind, Frame, RuntimeError, SyntaxError};
pub use interp::{Interpreter, Limits};
pub use parser::parse_program;
pub use value::{Invoke, NativeFunction, Props, Value};

#[cfg(test)]
mod tests;
