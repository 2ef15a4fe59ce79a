use std::{
    collections::HashMap,
    io::{self, Write},
    rc::Rc,
};

use crate::{
    ast::{self, Expr, ExprKind, Stmt},
    builtins,
    common::{Error, ErrorKind},
    ops,
    stack::with_headroom,
    value::{UserFunction, Value},
};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Nested user-function calls allowed before a `RecursionError`.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

type Frame = HashMap<String, Value>;

/// Frame 0 is the global frame and is never popped.
#[derive(Debug, Clone)]
struct ScopeStack {
    stack: Vec<Frame>,
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            stack: vec![HashMap::new()],
        }
    }

    fn nest(&mut self) {
        self.stack.push(HashMap::new());
        tracing::trace!(depth = self.stack.len(), "pushed frame");
    }

    fn unnest(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
        tracing::trace!(depth = self.stack.len(), "popped frame");
    }

    /// Binds `name` in the innermost frame, replacing a binding there.
    fn insert(&mut self, name: String, value: Value) {
        if let Some(current_scope) = self.stack.last_mut() {
            current_scope.insert(name, value);
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.stack.iter().rev().find_map(|scope| scope.get(name))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.stack.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    /// Updates the innermost existing binding, or creates one in the
    /// innermost frame when the name is bound nowhere.
    fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.get_mut(name) {
            *slot = value;
        } else {
            self.insert(name.to_string(), value);
        }
    }

    /// Hides every non-global frame and pushes a fresh call frame. Returns
    /// the hidden frames for `leave_call`.
    fn enter_call(&mut self) -> Vec<Frame> {
        let hidden = self.stack.split_off(1);
        self.stack.push(HashMap::new());
        hidden
    }

    fn leave_call(&mut self, hidden: Vec<Frame>) {
        self.stack.truncate(1);
        self.stack.extend(hidden);
    }
}

/// Result of executing a statement: either it completed, or a `return`
/// is unwinding towards the nearest call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Return(Value),
}

pub struct Interpreter {
    namespace: ScopeStack,
    config: Config,
    call_depth: usize,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self::with_output(config, io::stdout())
    }

    /// Creates an interpreter whose `print` output goes to `out`.
    pub fn with_output(config: Config, out: impl Write + 'static) -> Self {
        let mut namespace = ScopeStack::new();
        for (name, builtin) in builtins::all() {
            namespace.insert(name.to_string(), Value::Native(builtin));
        }

        Interpreter {
            namespace,
            config,
            call_depth: 0,
            out: Box::new(out),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves `name` the same way an identifier expression would.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.namespace.get(name)
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), Error> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }

    /// Runs every statement in order and returns the value of the last one.
    pub fn run(&mut self, program: &ast::Program) -> Result<Value, Error> {
        let mut last = Value::None;
        for stmt in &program.statements {
            match self.execute(stmt)? {
                Flow::Normal(value) => last = value,
                Flow::Return(value) => {
                    // the parser rejects top-level `return`, so this only
                    // happens for hand-built programs
                    last = value;
                    break;
                }
            }
        }

        tracing::debug!(statements = program.statements.len(), "program finished");
        Ok(last)
    }

    fn execute_block(&mut self, stmts: &[Stmt]) -> Result<Flow, Error> {
        let mut last = Value::None;
        for stmt in stmts {
            match self.execute(stmt)? {
                Flow::Normal(value) => last = value,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, Error> {
        with_headroom(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Flow, Error> {
        match stmt {
            Stmt::VarDecl(var_decl) => {
                let value = self.evaluate(&var_decl.init)?;
                self.namespace.insert(var_decl.name.clone(), value.clone());
                Ok(Flow::Normal(value))
            }
            Stmt::FuncDecl(func_decl) => {
                let fun = Value::Function(Rc::new(UserFunction {
                    name: func_decl.name.clone(),
                    params: func_decl.params.iter().map(|p| p.name.clone()).collect(),
                    body: Rc::clone(&func_decl.body),
                }));
                self.namespace.insert(func_decl.name.clone(), fun);
                Ok(Flow::Normal(Value::None))
            }
            Stmt::If(if_stmt) => {
                if self.evaluate(&if_stmt.condition)?.is_truthy() {
                    self.execute_block(&if_stmt.then_block)
                } else if let Some(else_block) = &if_stmt.else_block {
                    self.execute_block(else_block)
                } else {
                    Ok(Flow::Normal(Value::None))
                }
            }
            Stmt::For(for_stmt) => {
                let items = match self.evaluate(&for_stmt.iterable)? {
                    Value::Array(items) => items,
                    other => {
                        return Err(Error::type_error(format!(
                            "'for' expects an array, found '{}'",
                            other.type_name()
                        ))
                        .or_position(for_stmt.iterable.pos))
                    }
                };

                for item in items {
                    self.namespace.nest();
                    self.namespace.insert(for_stmt.var_name.clone(), item);
                    let flow = self.execute_block(&for_stmt.body);
                    self.namespace.unnest();

                    if let flow @ Flow::Return(_) = flow? {
                        return Ok(flow);
                    }
                }

                Ok(Flow::Normal(Value::None))
            }
            Stmt::While(while_stmt) => {
                while self.evaluate(&while_stmt.condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute_block(&while_stmt.body)? {
                        return Ok(flow);
                    }
                }

                Ok(Flow::Normal(Value::None))
            }
            Stmt::Return(ret_stmt) => Ok(Flow::Return(self.evaluate(&ret_stmt.value)?)),
            Stmt::Assignment(assignment) => {
                let value = self.evaluate(&assignment.value)?;
                self.namespace.assign(&assignment.name, value.clone());
                Ok(Flow::Normal(value))
            }
            Stmt::Expr(expr) => Ok(Flow::Normal(self.evaluate(expr)?)),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Error> {
        with_headroom(|| self.interpret_expr(expr))
            .map_err(|err| err.or_position(expr.pos))
    }

    fn interpret_expr(&mut self, expr: &Expr) -> Result<Value, Error> {
        match &expr.kind {
            ExprKind::Binary(binary_expr) => {
                let left = self.evaluate(&binary_expr.left)?;
                let right = self.evaluate(&binary_expr.right)?;
                ops::binary(binary_expr.op, &left, &right)
            }
            ExprKind::Unary(unary_expr) => {
                let operand = self.evaluate(&unary_expr.operand)?;
                ops::unary(unary_expr.op, &operand)
            }
            ExprKind::Call(call_expr) => self.interpret_call(call_expr),
            ExprKind::ArrLit(arr_lit) => arr_lit
                .elements
                .iter()
                .map(|element| self.evaluate(element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ExprKind::Range(range_expr) => {
                let start = self.evaluate(&range_expr.start)?;
                let end = self.evaluate(&range_expr.end)?;
                match (&start, &end) {
                    (Value::Int(start), Value::Int(end)) => {
                        Ok(Value::Array((*start..*end).map(Value::Int).collect()))
                    }
                    _ => Err(Error::type_error(format!(
                        "range bounds must be integers, found '{}' and '{}'",
                        start.type_name(),
                        end.type_name()
                    ))),
                }
            }
            ExprKind::Var(var_expr) => self
                .namespace
                .get(&var_expr.name)
                .cloned()
                .ok_or_else(|| Error::name(&var_expr.name)),
            ExprKind::Lit(literal) => Ok(literal.clone().into()),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(callee = %call_expr.callee))]
    fn interpret_call(&mut self, call_expr: &ast::CallExpr) -> Result<Value, Error> {
        let callee = self
            .namespace
            .get(&call_expr.callee)
            .cloned()
            .ok_or_else(|| Error::name(&call_expr.callee))?;

        let args = call_expr
            .args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match callee {
            Value::Native(native) => native.call(self, args),
            Value::Function(fun) => self.call_function(&fun, args),
            other => Err(Error::type_error(format!(
                "'{}' is not callable (found '{}')",
                call_expr.callee,
                other.type_name()
            ))),
        }
    }

    /// Calls a user function. While the body runs only the global frame and
    /// the new call frame are visible; the caller's frames are restored on
    /// every exit path.
    fn call_function(&mut self, fun: &UserFunction, args: Vec<Value>) -> Result<Value, Error> {
        if args.len() != fun.params.len() {
            return Err(Error::type_error(format!(
                "{}() takes {} argument{} but {} were given",
                fun.name,
                fun.params.len(),
                if fun.params.len() == 1 { "" } else { "s" },
                args.len()
            )));
        }

        if self.call_depth >= self.config.max_call_depth {
            return Err(Error::new(
                ErrorKind::Recursion,
                format!(
                    "maximum call depth of {} exceeded in {}()",
                    self.config.max_call_depth, fun.name
                ),
            ));
        }

        let hidden = self.namespace.enter_call();
        for (param, arg) in fun.params.iter().zip(args) {
            self.namespace.insert(param.clone(), arg);
        }

        self.call_depth += 1;
        let flow = with_headroom(|| self.execute_block(&fun.body));
        self.call_depth -= 1;
        self.namespace.leave_call(hidden);

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal(_) => Ok(Value::None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::tokenize, parser::parse};
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (Interpreter, Result<Value, Error>) {
        let mut interpreter = Interpreter::with_output(Config::default(), io::sink());
        let result = tokenize(source)
            .and_then(|tokens| parse(&tokens))
            .and_then(|program| interpreter.run(&program));
        (interpreter, result)
    }

    #[test]
    fn scope_stack_resolution_and_assignment() {
        let mut scopes = ScopeStack::new();
        scopes.insert("x".into(), Value::Int(1));
        scopes.nest();
        scopes.insert("y".into(), Value::Int(2));
        scopes.assign("x", Value::Int(10));
        scopes.assign("z", Value::Int(3));
        assert_eq!(scopes.get("x"), Some(&Value::Int(10)));
        scopes.unnest();
        assert_eq!(scopes.get("x"), Some(&Value::Int(10)));
        assert_eq!(scopes.get("y"), None);
        assert_eq!(scopes.get("z"), None);

        // the global frame survives any number of pops
        scopes.unnest();
        scopes.unnest();
        assert_eq!(scopes.get("x"), Some(&Value::Int(10)));
    }

    #[test]
    fn call_frames_hide_caller_locals() {
        let mut scopes = ScopeStack::new();
        scopes.insert("g".into(), Value::Int(0));
        scopes.nest();
        scopes.insert("local".into(), Value::Int(1));

        let hidden = scopes.enter_call();
        assert_eq!(scopes.get("local"), None);
        assert_eq!(scopes.get("g"), Some(&Value::Int(0)));
        scopes.insert("param".into(), Value::Int(2));
        scopes.leave_call(hidden);

        assert_eq!(scopes.get("local"), Some(&Value::Int(1)));
        assert_eq!(scopes.get("param"), None);
    }

    #[test]
    fn final_value_is_the_last_statement() {
        let (_, result) = run("var x = 2; x * 21;");
        assert_eq!(result, Ok(Value::Int(42)));
    }

    #[test]
    fn function_without_return_yields_none() {
        let (_, result) = run("f() => { var a = 1; }\nf();");
        assert_eq!(result, Ok(Value::None));
    }

    #[test]
    fn return_unwinds_out_of_loops_and_pops_frames() {
        let (interpreter, result) = run(
            "first_even(xs) => {\n\
               for x in xs {\n\
                 while true { ? x % 2 == 0 { return x; } otherwise { x = x + 1; } }\n\
               }\n\
               return -1;\n\
             }\n\
             first_even([3, 8]);",
        );
        assert_eq!(result, Ok(Value::Int(4)));
        assert_eq!(interpreter.namespace.stack.len(), 1);
        assert_eq!(interpreter.lookup("x"), None);
    }

    #[test]
    fn error_inside_call_restores_frames() {
        let (interpreter, result) = run("var g = 1;\nboom(v) => v + \"s\";\nfor i in [1] { boom(i); }");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(interpreter.namespace.stack.len(), 1);
        assert_eq!(interpreter.call_depth, 0);
    }

    #[test]
    fn functions_do_not_see_caller_locals() {
        let (_, result) = run(
            "peek() => hidden;\n\
             for hidden in [1] { peek(); }",
        );
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.message, "name 'hidden' is not defined");
    }

    #[test]
    fn assignment_inside_function_updates_globals() {
        let (interpreter, result) = run("var count = 0;\nbump() => { count = count + 1; }\nbump(); bump();");
        assert!(result.is_ok());
        assert_eq!(interpreter.lookup("count"), Some(&Value::Int(2)));
    }

    #[test]
    fn implicit_declaration_lands_in_current_frame() {
        let (interpreter, result) = run("make() => { fresh = 5; return fresh; }\nmake();");
        assert_eq!(result, Ok(Value::Int(5)));
        assert_eq!(interpreter.lookup("fresh"), None);

        let (interpreter, _) = run("top = 1;");
        assert_eq!(interpreter.lookup("top"), Some(&Value::Int(1)));
    }

    #[test]
    fn recursion_limit_is_reported() {
        let mut interpreter = Interpreter::with_output(Config { max_call_depth: 50 }, io::sink());
        let program = parse(&tokenize("down(n) => down(n + 1);\ndown(0);").unwrap()).unwrap();
        let err = interpreter.run(&program).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recursion);
        assert_eq!(err.message, "maximum call depth of 50 exceeded in down()");
        assert_eq!(interpreter.call_depth, 0);
    }

    #[test]
    fn runtime_errors_carry_the_innermost_position() {
        let (_, result) = run("var a = 1;\nvar b = a + missing;");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.position, Some(crate::common::Position::new(2, 13)));
    }
}
