//! Named variables shared by every action of a flow run
//!
//! One [`ExecutionContext`] is created per run and passed by `&mut` through
//! the executor. Each variable is declared with a [`VarKind`] that fixes which
//! mutations it accepts; the kind never changes after declaration.

use crate::document::Document;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::trace;

pub mod reference;
pub mod value;

pub use reference::ValueSource;
pub use value::Value;

/// Declared shape of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    List,
    #[serde(rename = "dict", alias = "mapping", alias = "map")]
    Mapping,
    #[serde(rename = "str", alias = "string", alias = "scalar")]
    Scalar,
}

impl VarKind {
    /// Parse the spelling used in flow files
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "list" => Some(VarKind::List),
            "dict" | "mapping" | "map" => Some(VarKind::Mapping),
            "str" | "string" | "scalar" => Some(VarKind::Scalar),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::List => "list",
            VarKind::Mapping => "dict",
            VarKind::Scalar => "str",
        }
    }

    /// Value a freshly declared variable holds when no initial value is given
    fn empty_value(self) -> Value {
        match self {
            VarKind::List => Value::List(Vec::new()),
            VarKind::Mapping => Value::Map(BTreeMap::new()),
            VarKind::Scalar => Value::Str(String::new()),
        }
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub kind: VarKind,
    pub value: Value,
}

/// The per-run variable store
#[derive(Debug, Default)]
pub struct ExecutionContext {
    vars: HashMap<String, Variable>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) a variable
    ///
    /// A list or mapping declared with a non-matching initial value starts
    /// empty. Returns the stored value.
    pub fn declare(&mut self, name: &str, kind: VarKind, initial: Option<Value>) -> &Value {
        let value = match (kind, initial) {
            (VarKind::List, Some(list @ Value::List(_))) => list,
            (VarKind::Mapping, Some(map @ Value::Map(_))) => map,
            (VarKind::Scalar, Some(value)) => value,
            (kind, _) => kind.empty_value(),
        };
        trace!("Declaring {} variable '{}'", kind, name);
        self.vars.insert(name.to_string(), Variable { kind, value });
        &self.vars[name].value
    }

    pub fn kind(&self, name: &str) -> Result<VarKind> {
        self.variable(name).map(|var| var.kind)
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.variable(name).map(|var| &var.value)
    }

    /// Replace the value of a scalar variable
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        *self.value_mut(name, VarKind::Scalar)? = value;
        Ok(())
    }

    /// Append to a list variable
    pub fn append(&mut self, name: &str, value: Value) -> Result<()> {
        if let Value::List(items) = self.value_mut(name, VarKind::List)? {
            items.push(value);
        }
        Ok(())
    }

    /// Insert or overwrite a key in a mapping variable
    pub fn insert(&mut self, name: &str, key: impl Into<String>, value: Value) -> Result<()> {
        if let Value::Map(map) = self.value_mut(name, VarKind::Mapping)? {
            map.insert(key.into(), value);
        }
        Ok(())
    }

    /// Remove the first element of a list variable equal to `value`
    pub fn remove(&mut self, name: &str, value: &Value) -> Result<()> {
        let items = match self.value_mut(name, VarKind::List)? {
            Value::List(items) => items,
            _ => return Ok(()),
        };
        match items.iter().position(|item| item == value) {
            Some(index) => {
                items.remove(index);
                Ok(())
            }
            None => Err(FlowError::EntryNotFound {
                name: name.to_string(),
                entry: value.to_string(),
            }),
        }
    }

    /// Remove a key from a mapping variable, returning its value
    pub fn remove_key(&mut self, name: &str, key: &str) -> Result<Value> {
        let removed = match self.value_mut(name, VarKind::Mapping)? {
            Value::Map(map) => map.remove(key),
            _ => None,
        };
        removed.ok_or_else(|| FlowError::EntryNotFound {
            name: name.to_string(),
            entry: key.to_string(),
        })
    }

    /// Remove and return the first element of a list variable
    pub fn pop_front(&mut self, name: &str) -> Result<Value> {
        match self.value_mut(name, VarKind::List)? {
            Value::List(items) if !items.is_empty() => Ok(items.remove(0)),
            _ => Err(FlowError::VariableExhausted {
                name: name.to_string(),
            }),
        }
    }

    /// Produce the value a parameter refers to
    ///
    /// `$name.pop` mutates the store; every other form is a read.
    pub fn resolve(&mut self, source: &ValueSource, doc: &dyn Document) -> Result<Value> {
        match source {
            ValueSource::Literal(text) => Ok(Value::Str(text.clone())),
            ValueSource::Var(name) => self.get(name).cloned(),
            ValueSource::Pop(name) => self.pop_front(name),
            ValueSource::Path { name, path } => {
                let mut current = self.get(name)?.clone();
                for segment in path {
                    current = current.field(doc, segment).ok_or_else(|| FlowError::EntryNotFound {
                        name: name.clone(),
                        entry: segment.clone(),
                    })?;
                }
                Ok(current)
            }
        }
    }

    /// Declared variable names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn variable(&self, name: &str) -> Result<&Variable> {
        self.vars.get(name).ok_or_else(|| FlowError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    fn value_mut(&mut self, name: &str, expected: VarKind) -> Result<&mut Value> {
        let var = self
            .vars
            .get_mut(name)
            .ok_or_else(|| FlowError::UndefinedVariable {
                name: name.to_string(),
            })?;
        if var.kind != expected {
            return Err(FlowError::type_mismatch(
                format!("variable '{name}'"),
                expected.as_str(),
                var.kind.as_str(),
            ));
        }
        Ok(&mut var.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentBuilder;
    use proptest::prelude::*;

    #[test]
    fn test_undeclared_variable_is_an_error() {
        let ctx = ExecutionContext::new();
        let err = ctx.get("missing").unwrap_err();
        assert!(matches!(err, FlowError::UndefinedVariable { ref name } if name == "missing"));
    }

    #[test]
    fn test_pop_front_until_exhausted() {
        let doc = DocumentBuilder::new().finish();
        let mut ctx = ExecutionContext::new();
        ctx.declare(
            "queue",
            VarKind::List,
            Some(Value::List(vec![Value::from("a"), Value::from("b")])),
        );
        let pop = ValueSource::parse("$queue.pop");
        assert_eq!(ctx.resolve(&pop, &doc).unwrap(), Value::from("a"));
        assert_eq!(ctx.resolve(&pop, &doc).unwrap(), Value::from("b"));
        let err = ctx.resolve(&pop, &doc).unwrap_err();
        assert!(err.is_undefined_variable());
    }

    #[test]
    fn test_mutations_check_declared_kind() {
        let mut ctx = ExecutionContext::new();
        ctx.declare("title", VarKind::Scalar, None);
        let err = ctx.append("title", Value::from("x")).unwrap_err();
        assert!(matches!(err, FlowError::TypeMismatch { .. }));
        assert!(ctx.remove("title", &Value::from("x")).is_err());
        ctx.set("title", Value::from("Compute")).unwrap();
        assert_eq!(ctx.get("title").unwrap(), &Value::from("Compute"));
    }

    #[test]
    fn test_mapping_insert_and_remove_key() {
        let mut ctx = ExecutionContext::new();
        ctx.declare("prices", VarKind::Mapping, None);
        ctx.insert("prices", "t2.micro", Value::from("0.0116")).unwrap();
        assert_eq!(ctx.remove_key("prices", "t2.micro").unwrap(), Value::from("0.0116"));
        let err = ctx.remove_key("prices", "t2.micro").unwrap_err();
        assert!(matches!(err, FlowError::EntryNotFound { .. }));
    }

    #[test]
    fn test_removing_absent_list_value_is_entry_not_found() {
        let mut ctx = ExecutionContext::new();
        ctx.declare("seen", VarKind::List, None);
        let err = ctx.remove("seen", &Value::from("ghost")).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::VAR_ENTRY_NOT_FOUND);
    }

    #[test]
    fn test_redeclare_resets_value() {
        let mut ctx = ExecutionContext::new();
        ctx.declare("rows", VarKind::List, None);
        ctx.append("rows", Value::from("x")).unwrap();
        let value = ctx.declare("rows", VarKind::List, None).clone();
        assert_eq!(value, Value::List(vec![]));
        assert_eq!(ctx.names(), vec!["rows"]);
    }

    #[test]
    fn test_path_into_node_attributes() {
        let mut builder = DocumentBuilder::new();
        let link = builder.element("a", [("href", "/s3")], "S3");
        let doc = builder.finish();
        let mut ctx = ExecutionContext::new();
        ctx.declare("links", VarKind::List, Some(Value::List(vec![Value::Node(link)])));
        let href = ctx
            .resolve(&ValueSource::parse("$links.0.href"), &doc)
            .unwrap();
        assert_eq!(href, Value::from("/s3"));
        let text = ctx
            .resolve(&ValueSource::parse("$links.0.text"), &doc)
            .unwrap();
        assert_eq!(text, Value::from("S3"));
        let err = ctx
            .resolve(&ValueSource::parse("$links.3"), &doc)
            .unwrap_err();
        assert!(matches!(err, FlowError::EntryNotFound { .. }));
    }

    proptest! {
        #[test]
        fn test_append_then_remove_restores_list(
            initial in prop::collection::vec("[a-z]{1,4}", 0..8),
            extra in "[A-Z]{1,4}",
        ) {
            let mut ctx = ExecutionContext::new();
            let start = Value::List(initial.iter().map(|s| Value::from(s.as_str())).collect());
            ctx.declare("items", VarKind::List, Some(start.clone()));
            ctx.append("items", Value::from(extra.as_str())).unwrap();
            ctx.remove("items", &Value::from(extra.as_str())).unwrap();
            prop_assert_eq!(ctx.get("items").unwrap(), &start);
        }

        #[test]
        fn test_pop_yields_each_element_once(items in prop::collection::vec("[a-z]{1,3}", 0..10)) {
            let mut ctx = ExecutionContext::new();
            let values: Vec<Value> = items.iter().map(|s| Value::from(s.as_str())).collect();
            ctx.declare("queue", VarKind::List, Some(Value::List(values.clone())));
            let mut popped = Vec::new();
            while let Ok(value) = ctx.pop_front("queue") {
                popped.push(value);
            }
            prop_assert_eq!(popped, values);
        }
    }
}
