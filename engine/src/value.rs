use std::fmt;
use std::rc::Rc;

use rill::ast::Stmt;
use serde_json::Value as JsonValue;

use crate::builtins::Builtin;
use crate::display::Display;
use crate::error::RuntimeError;

/// A user-defined function bound by an `fn` statement.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A runtime value produced by evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    Null,
    Function(Rc<FunctionDef>),
    Builtin(Builtin),
    Display(Display),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Bool(false) | Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Null => "Null",
            Value::Function(_) => "Function",
            Value::Builtin(_) => "Builtin",
            Value::Display(_) => "Display",
        }
    }

    /// Convert to plain JSON data for plot arguments. Functions and
    /// displays have no data representation.
    pub fn to_json(&self) -> Result<JsonValue, RuntimeError> {
        match self {
            Value::Number(n) => Ok(serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null)),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Str(s) => Ok(JsonValue::String(s.clone())),
            Value::Null => Ok(JsonValue::Null),
            Value::List(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Err(RuntimeError::NotPlottable(other.type_name().to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Function(def) => {
                write!(f, "<function {}({})>", def.name, def.params.join(", "))
            }
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.signature),
            Value::Display(display) => write!(f, "<display {}>", display.kind_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b, // NaN != NaN per IEEE 754
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Display(a), Value::Display(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn lists_render_with_brackets() {
        let list = Value::List(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ]);
        assert_eq!(list.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn json_conversion_rejects_functions() {
        let def = Rc::new(FunctionDef {
            name: "f".to_string(),
            params: vec![],
            body: vec![],
        });
        assert!(Value::Function(def).to_json().is_err());
        assert!(Value::Number(1.5).to_json().is_ok());
    }
}
