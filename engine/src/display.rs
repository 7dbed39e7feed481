use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::RuntimeError;

/// A structured result produced by evaluated code instead of raw console
/// output. Every variant carries a title; presentation may override it, and
/// evaluation code never assumes it is visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Display {
    /// A titled group of sub-results.
    Displays {
        children: Vec<Display>,
        title: String,
    },
    /// A parametrized plot request. Argument values are opaque data the
    /// engine passes through to whatever renders the plot.
    Plot {
        args: Vec<JsonValue>,
        kwargs: BTreeMap<String, JsonValue>,
        title: String,
    },
    /// A help card for a function, builtin, or runtime type.
    Object { object: ObjectRef, title: String },
    /// A printed message from the code.
    Print { text: String, title: String },
}

/// What an `Object` display points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectRef {
    Function { name: String, params: Vec<String> },
    Builtin { name: String, signature: String },
    Type { name: String },
}

impl Display {
    pub fn title(&self) -> &str {
        match self {
            Display::Displays { title, .. }
            | Display::Plot { title, .. }
            | Display::Object { title, .. }
            | Display::Print { title, .. } => title,
        }
    }

    /// Rebuild this display with a new title.
    pub fn titled(self, new_title: impl Into<String>) -> Display {
        let new_title = new_title.into();
        match self {
            Display::Displays { children, .. } => Display::Displays {
                children,
                title: new_title,
            },
            Display::Plot { args, kwargs, .. } => Display::Plot {
                args,
                kwargs,
                title: new_title,
            },
            Display::Object { object, .. } => Display::Object {
                object,
                title: new_title,
            },
            Display::Print { text, .. } => Display::Print {
                text,
                title: new_title,
            },
        }
    }

    /// Concatenate two display groups (the `+` operator in user code).
    /// Only `Displays` values concatenate; the right title wins when
    /// non-empty.
    pub fn concat(self, other: Display) -> Result<Display, RuntimeError> {
        match (self, other) {
            (
                Display::Displays {
                    children: mut left,
                    title: left_title,
                },
                Display::Displays {
                    children: right,
                    title: right_title,
                },
            ) => {
                left.extend(right);
                let title = if right_title.is_empty() {
                    left_title
                } else {
                    right_title
                };
                Ok(Display::Displays {
                    children: left,
                    title,
                })
            }
            (left, right) => Err(RuntimeError::DisplayConcat {
                left: left.kind_name().to_string(),
                right: right.kind_name().to_string(),
            }),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Display::Displays { .. } => "Displays",
            Display::Plot { .. } => "Plot",
            Display::Object { .. } => "Object",
            Display::Print { .. } => "Print",
        }
    }
}
