use std::{fmt, rc::Rc};

use dyn_clone::DynClone;

use crate::{ast, common::Error, interpreter::Interpreter};

/// Host callable bound into the global frame. Implementations validate
/// their own arity.
pub trait NativeFn: DynClone {
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error>;
}

dyn_clone::clone_trait_object!(NativeFn);

impl<F> NativeFn for F
where
    F: Fn(&mut Interpreter, Vec<Value>) -> Result<Value, Error> + Clone,
{
    fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        self(interpreter, args)
    }
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    func: Box<dyn NativeFn>,
}

impl NativeFunction {
    pub fn new(name: &'static str, func: impl NativeFn + 'static) -> Self {
        NativeFunction {
            name,
            func: Box::new(func),
        }
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
        self.func.call(interpreter, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("func", &"<native>")
            .finish()
    }
}

/// A declared function. Only the parameter names and body are kept; free
/// names in the body resolve against the scope stack at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<ast::Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Value {
    /// Result of a call that finished without `return`.
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Array(Vec<Value>),
    Function(Rc<UserFunction>),
    Native(NativeFunction),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Int(number) => *number != 0,
            Value::Float(number) => *number != 0.0,
            Value::Str(string) => !string.is_empty(),
            Value::Bool(boolean) => *boolean,
            Value::Array(values) => !values.is_empty(),
            Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Native(_) => "builtin",
        }
    }

    /// Numeric view used by arithmetic and the statistics builtins.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(number) => Some(*number as f64),
            Value::Float(number) => Some(*number),
            _ => None,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(string) => write!(f, "{:?}", string),
            other => write!(f, "{}", other),
        }
    }
}

impl From<ast::Literal> for Value {
    fn from(literal: ast::Literal) -> Self {
        match literal {
            ast::Literal::Int(number) => Value::Int(number),
            ast::Literal::Float(number) => Value::Float(number),
            ast::Literal::Str(string) => Value::Str(string),
            ast::Literal::Bool(boolean) => Value::Bool(boolean),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Int(left), Self::Int(right)) => left == right,
            (Self::Str(left), Self::Str(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Array(left), Self::Array(right)) => left == right,
            (Self::Function(left), Self::Function(right)) => left == right,
            (Self::Native(left), Self::Native(right)) => left.name == right.name,
            // ints and floats compare by numeric value
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => false,
        }
    }
}

pub fn format_float(number: f64) -> String {
    if number.is_nan() {
        "nan".to_string()
    } else if number == f64::INFINITY {
        "inf".to_string()
    } else if number == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e16 {
        format!("{:.1}", number)
    } else {
        format!("{}", number)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Int(number) => write!(f, "{}", number),
            Value::Float(number) => write!(f, "{}", format_float(*number)),
            Value::Str(string) => write!(f, "{}", string),
            Value::Bool(boolean) => write!(f, "{}", boolean),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    value.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Function(fun) => write!(f, "<function {}>", fun.name),
            Value::Native(native) => write!(f, "<builtin {}>", native.name),
        }
    }
}
