use std::ops::Range;
use std::rc::Rc;

use rill::ast::{BinaryOp, Expr, Stmt, UnaryOp};

use crate::environment::Environment;
use crate::error::{EvalError, RuntimeError};
use crate::value::{FunctionDef, Value};

pub const MAX_DEPTH: usize = 256;

/// Statement outcome: normal completion or an early `return` (with the
/// span of the `return` statement, for top-level misuse reporting).
enum Flow {
    Normal,
    Return(Value, Range<usize>),
}

/// Evaluate a single expression against the environment. This is the Block
/// Evaluator's expression-first path and the selection tail re-evaluation.
pub fn eval_expression(expr: &Expr, env: &mut Environment) -> Result<Value, EvalError> {
    evaluate(expr, env, 0)
}

/// Execute a statement sequence at the top level of a block. A `return`
/// outside any function is a runtime error.
pub fn run_statements(stmts: &[Stmt], env: &mut Environment) -> Result<(), EvalError> {
    match exec_stmts(stmts, env, 0)? {
        Flow::Normal => Ok(()),
        Flow::Return(_, span) => {
            Err(EvalError::from(RuntimeError::ReturnOutsideFunction).with_span(span))
        }
    }
}

fn exec_stmts(stmts: &[Stmt], env: &mut Environment, depth: usize) -> Result<Flow, EvalError> {
    for stmt in stmts {
        match exec_stmt(stmt, env, depth)? {
            Flow::Normal => {}
            ret => return Ok(ret),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(stmt: &Stmt, env: &mut Environment, depth: usize) -> Result<Flow, EvalError> {
    let result = match stmt {
        Stmt::Assign { name, value, .. } => {
            let value = evaluate(value, env, depth)?;
            env.set(name, value);
            Ok(Flow::Normal)
        }
        Stmt::Expr { value, .. } => {
            evaluate(value, env, depth)?;
            Ok(Flow::Normal)
        }
        Stmt::FnDef {
            name, params, body, ..
        } => {
            env.set(
                name,
                Value::Function(Rc::new(FunctionDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                })),
            );
            Ok(Flow::Normal)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            if evaluate(cond, env, depth)?.is_truthy() {
                exec_stmts(then_body, env, depth)
            } else {
                exec_stmts(else_body, env, depth)
            }
        }
        Stmt::For {
            var, iter, body, ..
        } => {
            let items = match evaluate(iter, env, depth)? {
                Value::List(items) => items,
                other => {
                    return Err(EvalError::from(RuntimeError::TypeMismatch {
                        expected: "List to iterate over".to_string(),
                        got: other.type_name().to_string(),
                    })
                    .with_span(iter.span()));
                }
            };
            for item in items {
                env.set(var, item);
                match exec_stmts(body, env, depth)? {
                    Flow::Normal => {}
                    ret => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Return { value, span, .. } => {
            let value = match value {
                Some(expr) => evaluate(expr, env, depth)?,
                None => Value::Null,
            };
            Ok(Flow::Return(value, span.clone()))
        }
    };
    // errors without their own span get the statement's
    result.map_err(|e| e.with_span(stmt.span().clone()))
}

fn evaluate(expr: &Expr, env: &mut Environment, depth: usize) -> Result<Value, EvalError> {
    if depth > MAX_DEPTH {
        return Err(EvalError::from(RuntimeError::StackOverflow).with_span(expr.span()));
    }

    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),

        Expr::Var(name, span) => env.get(name).cloned().ok_or_else(|| {
            EvalError::from(RuntimeError::UndefinedVariable(name.clone())).with_span(span.clone())
        }),

        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, env, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        Expr::Unary { op, operand, span } => {
            let value = evaluate(operand, env, depth + 1)?;
            match op {
                UnaryOp::Neg => match value {
                    Value::Number(n) => Ok(Value::Number(-n)),
                    other => Err(EvalError::from(RuntimeError::TypeMismatch {
                        expected: "Number to negate".to_string(),
                        got: other.type_name().to_string(),
                    })
                    .with_span(span.clone())),
                },
                UnaryOp::Not => Ok(Value::Bool(value.is_falsy())),
            }
        }

        Expr::Binary {
            op,
            left,
            right,
            span,
        } => eval_binary(*op, left, right, span, env, depth),

        Expr::Call {
            callee,
            args,
            named,
            span,
        } => {
            let callee = evaluate(callee, env, depth + 1)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(evaluate(arg, env, depth + 1)?);
            }
            let mut named_values = Vec::with_capacity(named.len());
            for (name, arg) in named {
                named_values.push((name.clone(), evaluate(arg, env, depth + 1)?));
            }
            match callee {
                Value::Builtin(builtin) => builtin
                    .call(arg_values, named_values)
                    .map_err(|e| EvalError::from(e).with_span(span.clone())),
                Value::Function(def) => {
                    call_function(&def, arg_values, named_values, env, depth, span)
                }
                other => Err(EvalError::from(RuntimeError::NotCallable(
                    other.type_name().to_string(),
                ))
                .with_span(span.clone())),
            }
        }

        Expr::Index {
            target,
            index,
            span,
        } => {
            let target = evaluate(target, env, depth + 1)?;
            let index = evaluate(index, env, depth + 1)?;
            match (target, index) {
                (Value::List(items), Value::Number(n)) => {
                    if n.fract() != 0.0 {
                        return Err(EvalError::from(RuntimeError::Custom(format!(
                            "list index must be an integer, got {}",
                            n
                        )))
                        .with_span(span.clone()));
                    }
                    let idx = n as i64;
                    if idx < 0 || idx as usize >= items.len() {
                        return Err(EvalError::from(RuntimeError::IndexOutOfBounds {
                            index: idx,
                            len: items.len(),
                        })
                        .with_span(span.clone()));
                    }
                    Ok(items[idx as usize].clone())
                }
                (Value::List(_), other) => Err(EvalError::from(RuntimeError::TypeMismatch {
                    expected: "Number index".to_string(),
                    got: other.type_name().to_string(),
                })
                .with_span(span.clone())),
                (other, _) => Err(EvalError::from(RuntimeError::TypeMismatch {
                    expected: "List to index".to_string(),
                    got: other.type_name().to_string(),
                })
                .with_span(span.clone())),
            }
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    span: &Range<usize>,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, EvalError> {
    // logical operators short-circuit
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = evaluate(left, env, depth + 1)?;
        return match op {
            BinaryOp::And => {
                if lhs.is_falsy() {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Bool(evaluate(right, env, depth + 1)?.is_truthy()))
                }
            }
            BinaryOp::Or => {
                if lhs.is_truthy() {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(evaluate(right, env, depth + 1)?.is_truthy()))
                }
            }
            _ => unreachable!(),
        };
    }

    let lhs = evaluate(left, env, depth + 1)?;
    let rhs = evaluate(right, env, depth + 1)?;

    let mismatch = |lhs: &Value, rhs: &Value| {
        EvalError::from(RuntimeError::TypeMismatch {
            expected: format!("matching operands for '{}'", op.symbol()),
            got: format!("{} and {}", lhs.type_name(), rhs.type_name()),
        })
        .with_span(span.clone())
    };

    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (Value::Display(a), Value::Display(b)) => a
                .concat(b)
                .map(Value::Display)
                .map_err(|e| EvalError::from(e).with_span(span.clone())),
            (lhs, rhs) => Err(mismatch(&lhs, &rhs)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => match op {
                BinaryOp::Sub => Ok(Value::Number(a - b)),
                BinaryOp::Mul => Ok(Value::Number(a * b)),
                BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
                    Err(EvalError::from(RuntimeError::DivisionByZero).with_span(span.clone()))
                }
                BinaryOp::Div => Ok(Value::Number(a / b)),
                BinaryOp::Rem => Ok(Value::Number(a % b)),
                _ => unreachable!(),
            },
            (lhs, rhs) => Err(mismatch(&lhs, &rhs)),
        },
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(&lhs, &rhs)),
            };
            let Some(ordering) = ordering else {
                // NaN comparisons are false
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

fn call_function(
    def: &FunctionDef,
    args: Vec<Value>,
    named: Vec<(String, Value)>,
    env: &mut Environment,
    depth: usize,
    span: &Range<usize>,
) -> Result<Value, EvalError> {
    if let Some((argument, _)) = named.into_iter().next() {
        return Err(EvalError::from(RuntimeError::UnknownNamedArgument {
            name: def.name.clone(),
            argument,
        })
        .with_span(span.clone()));
    }
    if args.len() != def.params.len() {
        return Err(EvalError::from(RuntimeError::ArityMismatch {
            name: def.name.clone(),
            expected: def.params.len(),
            got: args.len(),
        })
        .with_span(span.clone()));
    }
    if depth >= MAX_DEPTH {
        return Err(EvalError::from(RuntimeError::StackOverflow).with_span(span.clone()));
    }

    env.push_scope();
    for (param, value) in def.params.iter().zip(args) {
        env.set(param, value);
    }
    let result = exec_stmts(&def.body, env, depth + 1);
    env.pop_scope();

    match result? {
        Flow::Normal => Ok(Value::Null),
        Flow::Return(value, _) => Ok(value),
    }
}
