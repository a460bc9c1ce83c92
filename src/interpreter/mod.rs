//=============================================
// tidescript/interpreter.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: TideScript runtime interpreter implementation
// Objective: Execute parsed programs against a module namespace and expose
//            exported functions to the host
//=============================================

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BinaryOp, Expr, FunctionDecl, Literal, Program, Stmt, UnaryOp};
use crate::tokenizer::Position;

//=============================================
//            Section 1: Values
//=============================================

/// Signature for native (built-in) functions.
pub type NativeFn = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A runtime TideScript value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Function(Rc<FunctionDecl>),
    Native(&'static str, NativeFn),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Function(_) | Value::Native(..) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Function(_) | Value::Native(..) => "function",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Function(decl) => write!(f, "<fn {}>", decl.name),
            Value::Native(name, _) => write!(f, "<native fn {}>", name),
        }
    }
}

/// A module's global namespace: the mutable mapping a program executes into.
pub type Namespace = HashMap<String, Value>;

//=============================================
//            Section 2: Runtime Errors
//=============================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("undefined variable '{name}' at {position}")]
    UndefinedVariable { name: String, position: Position },
    #[error("'{name}' is not defined in this module")]
    UndefinedFunction { name: String },
    #[error("value of type {type_name} is not callable at {position}")]
    NotCallable {
        type_name: &'static str,
        position: Position,
    },
    #[error("function '{name}' expects {expected} arguments but received {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{message} at {position}")]
    TypeMismatch { message: String, position: Position },
    #[error("division by zero at {position}")]
    DivisionByZero { position: Position },
    #[error("'return' outside of a function at {position}")]
    ReturnOutsideFunction { position: Position },
    #[error("{0}")]
    Native(String),
}

//=============================================
//            Section 3: Execution
//=============================================

/// Install the native functions every module namespace starts with.
pub fn install_builtins(namespace: &mut Namespace) {
    namespace.insert("print".to_string(), Value::Native("print", native_print));
}

fn native_print(args: &[Value]) -> Result<Value, RuntimeError> {
    let rendered: Vec<String> = args.iter().map(|value| value.to_string()).collect();
    println!("{}", rendered.join(" "));
    Ok(Value::Null)
}

/// Run a parsed program against `namespace`, binding its top-level
/// declarations there. The namespace is the only state the program can
/// reach; the caller owns it before and after.
pub fn execute_program(program: &Program, namespace: &mut Namespace) -> Result<(), RuntimeError> {
    let mut interpreter = Interpreter::new(namespace);
    for stmt in &program.statements {
        match interpreter.exec_stmt(stmt)? {
            Flow::Normal => {}
            Flow::Return(_) => {
                let position = match stmt {
                    Stmt::Return { position, .. } => position.clone(),
                    _ => Position::new(0, 0, 0),
                };
                return Err(RuntimeError::ReturnOutsideFunction { position });
            }
        }
    }
    Ok(())
}

/// Call a function previously bound into `namespace` by `execute_program`.
pub fn call_function(
    namespace: &mut Namespace,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let callee = namespace
        .get(name)
        .cloned()
        .ok_or_else(|| RuntimeError::UndefinedFunction {
            name: name.to_string(),
        })?;
    let mut interpreter = Interpreter::new(namespace);
    interpreter.call_value(callee, args.to_vec(), &Position::new(0, 0, 0))
}

enum Flow {
    Normal,
    Return(Value),
}

struct Interpreter<'a> {
    globals: &'a mut Namespace,
    frames: Vec<HashMap<String, Value>>,
}

impl<'a> Interpreter<'a> {
    fn new(globals: &'a mut Namespace) -> Self {
        Self {
            globals,
            frames: Vec::new(),
        }
    }

    fn define(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.get(name) {
                return Some(value.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn assign(&mut self, name: &str, value: Value, position: &Position) -> Result<(), RuntimeError> {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        if let Some(slot) = self.globals.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        Err(RuntimeError::UndefinedVariable {
            name: name.to_string(),
            position: position.clone(),
        })
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Let {
                name, initializer, ..
            } => {
                let value = self.eval_expr(initializer)?;
                self.define(name, value);
                Ok(Flow::Normal)
            }
            Stmt::FunctionDecl { decl } => {
                self.define(&decl.name, Value::Function(Rc::new(decl.clone())));
                Ok(Flow::Normal)
            }
            Stmt::Expression { expr } => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(result))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.exec_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_block(&mut self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Return(value) = self.exec_stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Integer(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::String(s) => Value::Str(s.clone()),
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            Expr::Identifier { name, position } => {
                self.lookup(name)
                    .ok_or_else(|| RuntimeError::UndefinedVariable {
                        name: name.clone(),
                        position: position.clone(),
                    })
            }
            Expr::Unary {
                op,
                operand,
                position,
            } => {
                let value = self.eval_expr(operand)?;
                self.eval_unary(*op, value, position)
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => {
                // Short-circuit forms evaluate the right side lazily
                match op {
                    BinaryOp::And => {
                        let left = self.eval_expr(left)?;
                        if !left.is_truthy() {
                            return Ok(Value::Bool(false));
                        }
                        let right = self.eval_expr(right)?;
                        Ok(Value::Bool(right.is_truthy()))
                    }
                    BinaryOp::Or => {
                        let left = self.eval_expr(left)?;
                        if left.is_truthy() {
                            return Ok(Value::Bool(true));
                        }
                        let right = self.eval_expr(right)?;
                        Ok(Value::Bool(right.is_truthy()))
                    }
                    _ => {
                        let left = self.eval_expr(left)?;
                        let right = self.eval_expr(right)?;
                        self.eval_binary(*op, left, right, position)
                    }
                }
            }
            Expr::Call {
                callee,
                args,
                position,
            } => {
                let callee = self.eval_expr(callee)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval_expr(arg)?);
                }
                self.call_value(callee, evaluated, position)
            }
            Expr::Assign {
                name,
                value,
                position,
            } => {
                let value = self.eval_expr(value)?;
                self.assign(name, value.clone(), position)?;
                Ok(value)
            }
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        position: &Position,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(decl) => {
                if args.len() != decl.params.len() {
                    return Err(RuntimeError::ArityMismatch {
                        name: decl.name.clone(),
                        expected: decl.params.len(),
                        found: args.len(),
                    });
                }
                let mut frame = HashMap::new();
                for (param, arg) in decl.params.iter().zip(args) {
                    frame.insert(param.clone(), arg);
                }
                self.frames.push(frame);
                let result = self.exec_block(&decl.body);
                self.frames.pop();
                match result? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Null),
                }
            }
            Value::Native(_, function) => function(&args),
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
                position: position.clone(),
            }),
        }
    }

    fn eval_unary(
        &self,
        op: UnaryOp,
        value: Value,
        position: &Position,
    ) -> Result<Value, RuntimeError> {
        match (op, value) {
            (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(-n)),
            (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
            (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
            (UnaryOp::Negate, other) => Err(RuntimeError::TypeMismatch {
                message: format!("cannot negate a value of type {}", other.type_name()),
                position: position.clone(),
            }),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
        position: &Position,
    ) -> Result<Value, RuntimeError> {
        use BinaryOp::*;
        match op {
            Add => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
                (a, b) => self.numeric_op(a, b, position, |a, b| a + b),
            },
            Subtract => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
                (a, b) => self.numeric_op(a, b, position, |a, b| a - b),
            },
            Multiply => match (left, right) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
                (a, b) => self.numeric_op(a, b, position, |a, b| a * b),
            },
            Divide => match (left, right) {
                (_, Value::Int(0)) => Err(RuntimeError::DivisionByZero {
                    position: position.clone(),
                }),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
                (a, b) => self.numeric_op(a, b, position, |a, b| a / b),
            },
            Modulo => match (left, right) {
                (_, Value::Int(0)) => Err(RuntimeError::DivisionByZero {
                    position: position.clone(),
                }),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
                (a, b) => Err(RuntimeError::TypeMismatch {
                    message: format!(
                        "cannot take modulo of {} and {}",
                        a.type_name(),
                        b.type_name()
                    ),
                    position: position.clone(),
                }),
            },
            Equal => Ok(Value::Bool(values_equal(&left, &right))),
            NotEqual => Ok(Value::Bool(!values_equal(&left, &right))),
            Less | Greater | LessEqual | GreaterEqual => {
                let ordering = numeric_pair(&left, &right).ok_or_else(|| {
                    RuntimeError::TypeMismatch {
                        message: format!(
                            "cannot compare {} and {}",
                            left.type_name(),
                            right.type_name()
                        ),
                        position: position.clone(),
                    }
                })?;
                let (a, b) = ordering;
                Ok(Value::Bool(match op {
                    Less => a < b,
                    Greater => a > b,
                    LessEqual => a <= b,
                    GreaterEqual => a >= b,
                    _ => unreachable!(),
                }))
            }
            And | Or => unreachable!("short-circuit forms handled in eval_expr"),
        }
    }

    fn numeric_op(
        &self,
        left: Value,
        right: Value,
        position: &Position,
        apply: fn(f64, f64) -> f64,
    ) -> Result<Value, RuntimeError> {
        match numeric_pair(&left, &right) {
            Some((a, b)) => Ok(Value::Float(apply(a, b))),
            None => Err(RuntimeError::TypeMismatch {
                message: format!(
                    "cannot apply arithmetic to {} and {}",
                    left.type_name(),
                    right.type_name()
                ),
                position: position.clone(),
            }),
        }
    }
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    let as_f64 = |value: &Value| match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    };
    Some((as_f64(left)?, as_f64(right)?))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::validate_module;

    fn run(source: &str) -> Namespace {
        let program = validate_module(source, "<test>").expect("parse");
        let mut namespace = Namespace::new();
        install_builtins(&mut namespace);
        execute_program(&program, &mut namespace).expect("execute");
        namespace
    }

    #[test]
    fn binds_top_level_declarations() {
        let namespace = run("let answer = 40 + 2; fn noop() { return; }");
        assert_eq!(namespace.get("answer"), Some(&Value::Int(42)));
        assert!(matches!(namespace.get("noop"), Some(Value::Function(_))));
    }

    #[test]
    fn calls_exported_function_with_arguments() {
        let mut namespace = run("fn main(a, b, c, d) { let base = a * b; return base + c + d; }");
        let result = call_function(
            &mut namespace,
            "main",
            &[Value::Int(5), Value::Int(5), Value::Int(0), Value::Int(9)],
        )
        .expect("call");
        assert_eq!(result, Value::Int(34));
    }

    #[test]
    fn function_locals_do_not_leak_into_module_namespace() {
        let mut namespace = run("fn f(x) { let hidden = x; return hidden; }");
        call_function(&mut namespace, "f", &[Value::Int(1)]).expect("call");
        assert!(!namespace.contains_key("hidden"));
        assert!(!namespace.contains_key("x"));
    }

    #[test]
    fn while_loop_accumulates() {
        let mut namespace =
            run("fn sum_to(n) { let total = 0; let i = 1; while i <= n { total = total + i; i = i + 1; } return total; }");
        let result = call_function(&mut namespace, "sum_to", &[Value::Int(4)]).expect("call");
        assert_eq!(result, Value::Int(10));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let mut namespace = run("fn pair(a, b) { return a + b; }");
        let err = call_function(&mut namespace, "pair", &[Value::Int(1)]).expect_err("arity");
        assert!(matches!(err, RuntimeError::ArityMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn top_level_return_is_rejected() {
        let program = validate_module("return 1;", "<test>").expect("parse");
        let mut namespace = Namespace::new();
        let err = execute_program(&program, &mut namespace).expect_err("reject");
        assert!(matches!(err, RuntimeError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let program = validate_module("let x = 1 / 0;", "<test>").expect("parse");
        let mut namespace = Namespace::new();
        let err = execute_program(&program, &mut namespace).expect_err("divide");
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }
}
