//! Shark is a small interpreted language for mathematics and statistics.
//!
//! Source text goes through three stages: [`tokenize`] turns it into tokens,
//! [`parse`] builds a [`ast::Program`], and an [`Interpreter`] walks the
//! program. [`execute`] chains all three with a default configuration.
//!
//! ```
//! let mut interpreter = shark::Interpreter::with_output(shark::Config::default(), std::io::sink());
//! let value = shark::execute_with("fact(n) => { ? n <= 1 { return 1; } return n * fact(n - 1); }\nfact(5);", &mut interpreter);
//! assert_eq!(value, Ok(shark::Value::Int(120)));
//! ```

pub mod ast;
mod builtins;
mod common;
pub mod interpreter;
mod lexer;
mod ops;
mod parser;
mod stack;
pub mod token;
mod value;

pub use common::{Error, ErrorKind, Position};
pub use interpreter::{Config, Interpreter};
pub use lexer::tokenize;
pub use parser::parse;
pub use value::{NativeFunction, UserFunction, Value};

/// Runs `source` in a fresh interpreter that prints to stdout.
pub fn execute(source: &str) -> Result<(), Error> {
    let mut interpreter = Interpreter::new(Config::default());
    execute_with(source, &mut interpreter).map(|_| ())
}

/// Runs `source` in `interpreter` and returns the value of its last
/// statement. Globals defined by earlier runs stay visible.
pub fn execute_with(source: &str, interpreter: &mut Interpreter) -> Result<Value, Error> {
    let tokens = tokenize(source)?;
    let program = parse(&tokens)?;
    interpreter.run(&program)
}
