//! Leaf operations of the flow language

use super::FlowExecutor;
use crate::document::NodeId;
use crate::error::{FlowError, Result};
use crate::flow::{Action, BranchQuery, PathQuery, Selection, TableQuery, TreeQuery, VarUpdate};
use crate::hierarchy::build_tree;
use crate::persist::{FileType, SaveSpec};
use crate::table::{project_branch, project_table, resolve_constants, TabularResult};
use crate::vars::{ExecutionContext, Value, VarKind};
use tracing::{debug, info};

impl FlowExecutor<'_> {
    /// Run a single action, ignoring children
    pub(super) fn apply(
        &self,
        ctx: &mut ExecutionContext,
        input: Value,
        action: &Action,
    ) -> Result<Value> {
        match action {
            Action::Path(query) => self.path(&input, query),
            Action::Table2Csv(query) => self.table(ctx, &input, query),
            Action::BuildConnectionTree(query) => self.tree(ctx, &input, query),
            Action::TreeBranch2Csv(query) => self.branch(ctx, &input, query),
            Action::Get { value } => self.get(&input, value),
            Action::Substring { start, end } => substring(&input, *start, *end),
            Action::Concat { prefix, suffix } => {
                let text = expect_str("concat", &input)?;
                let prefix = ctx.resolve(prefix, self.doc)?.to_cell(self.doc);
                let suffix = ctx.resolve(suffix, self.doc)?.to_cell(self.doc);
                Ok(Value::Str(format!("{prefix}{text}{suffix}")))
            }
            Action::CreateVar { name, kind, value } => {
                let initial = match (kind, value) {
                    (VarKind::Scalar, Some(source)) => Some(ctx.resolve(source, self.doc)?),
                    _ => None,
                };
                Ok(ctx.declare(name, *kind, initial).clone())
            }
            Action::SaveToFile(spec) => {
                self.save(&input, spec)?;
                Ok(input)
            }
            Action::AddToVar(update) => {
                self.add_to_var(ctx, &input, update)?;
                Ok(input)
            }
            Action::RemoveVar(update) => {
                self.remove_var(ctx, &input, update)?;
                Ok(input)
            }
            Action::GetVar { source } => ctx.resolve(source, self.doc),
            Action::End => Ok(input),
        }
    }

    fn path(&self, input: &Value, query: &PathQuery) -> Result<Value> {
        let scope = expect_node("path", input)?;
        let mut found = self.doc.find_all(scope, &query.node_type, &query.filter);
        if !query.exclude.is_empty() {
            found.retain(|node| {
                !query
                    .exclude
                    .iter()
                    .any(|(attr, value)| self.doc.attr(*node, attr) == Some(value.as_str()))
            });
        }
        debug!(
            "path <{}> {} matched {} nodes",
            query.node_type,
            query.filter,
            found.len()
        );
        match query.selection {
            Selection::Multi => Ok(Value::Nodes(found)),
            Selection::Single => found.first().copied().map(Value::Node).ok_or_else(|| {
                FlowError::EmptyQueryResult {
                    action: "path".to_string(),
                    node_type: query.node_type.clone(),
                    filter: query.filter.to_string(),
                }
            }),
        }
    }

    fn table(&self, ctx: &mut ExecutionContext, input: &Value, query: &TableQuery) -> Result<Value> {
        let sources: Vec<NodeId> = match input {
            Value::Node(node) => vec![*node],
            Value::Nodes(nodes) => nodes.clone(),
            other => {
                return Err(FlowError::type_mismatch(
                    "table2csv input",
                    "node or node collection",
                    other.type_name(),
                ))
            }
        };
        let constants = resolve_constants(ctx, self.doc, &query.columns)?;

        let mut merged: Option<TabularResult> = None;
        for source in sources {
            let table = project_table(self.doc, source, &query.filter, &constants, query.enforce)?;
            match merged.as_mut() {
                Some(result) => result.rows.extend(table.rows),
                None => merged = Some(table),
            }
        }
        let table = merged.ok_or_else(|| FlowError::NotTabular {
            node_type: "empty node collection".to_string(),
        })?;
        info!("table2csv produced {} rows", table.rows.len());
        Ok(Value::Table(table))
    }

    fn tree(&self, ctx: &mut ExecutionContext, input: &Value, query: &TreeQuery) -> Result<Value> {
        let root = expect_node("buildConnectionTree", input)?;
        let tree = build_tree(
            self.doc,
            root,
            query.start.as_ref(),
            query.end.as_ref(),
            &query.levels,
        )?;
        debug!(
            "buildConnectionTree produced {} top-level entries, depth {}",
            tree.entries().len(),
            tree.depth()
        );
        if let Some(name) = &query.save_to {
            ctx.declare(name, VarKind::Scalar, Some(Value::Tree(tree.clone())));
        }
        Ok(Value::Tree(tree))
    }

    fn branch(&self, ctx: &mut ExecutionContext, input: &Value, query: &BranchQuery) -> Result<Value> {
        let branch = match input {
            Value::Branch(nodes) | Value::Nodes(nodes) => nodes,
            other => {
                return Err(FlowError::type_mismatch(
                    "treeBranch2csv input",
                    "branch",
                    other.type_name(),
                ))
            }
        };
        let table = project_branch(ctx, self.doc, branch, query.table_index, &query.columns)?;
        Ok(Value::Table(table))
    }

    fn get(&self, input: &Value, value: &str) -> Result<Value> {
        let node = expect_node("get", input)?;
        if value == "text" {
            return Ok(Value::Str(self.doc.text(node)));
        }
        Ok(self
            .doc
            .attr(node, value)
            .map_or(Value::Null, |attr| Value::Str(attr.to_string())))
    }

    fn save(&self, input: &Value, spec: &SaveSpec) -> Result<()> {
        let path = match (spec.file_type, input) {
            (FileType::Csv, Value::Table(table)) => self.sink.write_tabular(table, spec)?,
            (FileType::Csv, other) => {
                return Err(FlowError::type_mismatch(
                    "saveToFile csv input",
                    "table",
                    other.type_name(),
                ))
            }
            (FileType::Json, value) => self.sink.write_structured(&value.to_json(self.doc), spec)?,
        };
        debug!("saveToFile wrote {}", path.display());
        Ok(())
    }

    /// Resolve the value an update applies, defaulting to the input
    fn update_value(
        &self,
        ctx: &mut ExecutionContext,
        input: &Value,
        update: &VarUpdate,
    ) -> Result<Value> {
        match &update.value {
            Some(source) => ctx.resolve(source, self.doc),
            None => Ok(input.clone()),
        }
    }

    fn update_key(
        &self,
        ctx: &mut ExecutionContext,
        action: &str,
        update: &VarUpdate,
    ) -> Result<String> {
        let source = update
            .key
            .as_ref()
            .ok_or_else(|| FlowError::missing_parameter(action, "varKey"))?;
        Ok(ctx.resolve(source, self.doc)?.to_cell(self.doc))
    }

    fn add_to_var(&self, ctx: &mut ExecutionContext, input: &Value, update: &VarUpdate) -> Result<()> {
        match update.kind {
            VarKind::List => {
                let value = self.update_value(ctx, input, update)?;
                ctx.append(&update.name, value)
            }
            VarKind::Mapping => {
                let key = self.update_key(ctx, "addToVar", update)?;
                let value = self.update_value(ctx, input, update)?;
                ctx.insert(&update.name, key, value)
            }
            VarKind::Scalar => {
                let value = self.update_value(ctx, input, update)?;
                ctx.set(&update.name, value)
            }
        }
    }

    fn remove_var(&self, ctx: &mut ExecutionContext, input: &Value, update: &VarUpdate) -> Result<()> {
        match update.kind {
            VarKind::List => {
                let value = self.update_value(ctx, input, update)?;
                ctx.remove(&update.name, &value)
            }
            VarKind::Mapping => {
                let key = self.update_key(ctx, "removeVar", update)?;
                ctx.remove_key(&update.name, &key).map(|_| ())
            }
            VarKind::Scalar => Err(FlowError::type_mismatch(
                format!("removeVar on '{}'", update.name),
                "list or dict",
                VarKind::Scalar.as_str(),
            )),
        }
    }
}

fn expect_node(action: &str, input: &Value) -> Result<NodeId> {
    match input {
        Value::Node(node) => Ok(*node),
        other => Err(FlowError::type_mismatch(
            format!("{action} input"),
            "node",
            other.type_name(),
        )),
    }
}

fn expect_str<'v>(action: &str, input: &'v Value) -> Result<&'v str> {
    input.as_str().ok_or_else(|| {
        FlowError::type_mismatch(format!("{action} input"), "string", input.type_name())
    })
}

/// Character slice with negative offsets counted from the end
fn substring(input: &Value, start: Option<i64>, end: Option<i64>) -> Result<Value> {
    let text = expect_str("substring", input)?;
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let clamp = |offset: i64| -> usize {
        let absolute = if offset < 0 { len + offset } else { offset };
        absolute.clamp(0, len) as usize
    };
    let from = clamp(start.unwrap_or(0));
    let to = clamp(end.unwrap_or(len));
    if from >= to {
        return Ok(Value::Str(String::new()));
    }
    Ok(Value::Str(chars[from..to].iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AttrFilter, Document, DocumentBuilder};
    use crate::flow::ActionNode;
    use crate::persist::MemorySink;
    use crate::vars::ValueSource;

    const NO_ATTRS: [(&str, &str); 0] = [];

    #[test]
    fn test_substring_matches_slice_semantics() {
        let hello = Value::from("HelloWorld");
        assert_eq!(substring(&hello, Some(0), Some(5)).unwrap(), Value::from("Hello"));
        assert_eq!(substring(&hello, Some(5), None).unwrap(), Value::from("World"));
        assert_eq!(substring(&hello, Some(-5), None).unwrap(), Value::from("World"));
        assert_eq!(substring(&hello, Some(3), Some(100)).unwrap(), Value::from("loWorld"));
        assert_eq!(substring(&hello, Some(8), Some(2)).unwrap(), Value::from(""));
        assert!(substring(&Value::Null, None, None).is_err());
    }

    #[test]
    fn test_get_missing_attribute_is_null() {
        let mut builder = DocumentBuilder::new();
        let link = builder.element("a", [("href", "/docs")], "Docs");
        let doc = builder.finish();
        let sink = MemorySink::new();
        let executor = FlowExecutor::new(&doc, &sink);
        let mut ctx = ExecutionContext::new();
        let get = |value: &str| Action::Get {
            value: value.to_string(),
        };
        assert_eq!(
            executor.apply(&mut ctx, Value::Node(link), &get("href")).unwrap(),
            Value::from("/docs")
        );
        assert_eq!(
            executor.apply(&mut ctx, Value::Node(link), &get("title")).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_single_path_without_match_fails() {
        let mut builder = DocumentBuilder::new();
        builder.element("p", NO_ATTRS, "text");
        let doc = builder.finish();
        let sink = MemorySink::new();
        let action = Action::Path(PathQuery {
            selection: Selection::Single,
            node_type: "table".to_string(),
            filter: AttrFilter::new().with("id", "prices"),
            exclude: Vec::new(),
        });
        let err = FlowExecutor::new(&doc, &sink)
            .apply(&mut ExecutionContext::new(), Value::Node(doc.root()), &action)
            .unwrap_err();
        assert!(matches!(err, FlowError::EmptyQueryResult { .. }));
    }

    #[test]
    fn test_exclusion_uses_named_attribute() {
        let mut builder = DocumentBuilder::new();
        let kept = builder.element("li", [("data-kind", "service")], "EC2");
        builder.element("li", [("data-kind", "ad")], "Buy now");
        let doc = builder.finish();
        let sink = MemorySink::new();
        let action = Action::Path(PathQuery {
            selection: Selection::Multi,
            node_type: "li".to_string(),
            filter: AttrFilter::new(),
            exclude: vec![("data-kind".to_string(), "ad".to_string())],
        });
        let result = FlowExecutor::new(&doc, &sink)
            .apply(&mut ExecutionContext::new(), Value::Node(doc.root()), &action)
            .unwrap();
        assert_eq!(result, Value::Nodes(vec![kept]));
    }

    #[test]
    fn test_add_then_remove_restores_list() {
        let doc = DocumentBuilder::new().finish();
        let sink = MemorySink::new();
        let executor = FlowExecutor::new(&doc, &sink);
        let mut ctx = ExecutionContext::new();
        ctx.declare("seen", VarKind::List, Some(Value::List(vec![Value::from("a")])));
        let update = VarUpdate {
            name: "seen".to_string(),
            kind: VarKind::List,
            key: None,
            value: None,
        };
        let input = Value::from("b");
        executor
            .apply(&mut ctx, input.clone(), &Action::AddToVar(update.clone()))
            .unwrap();
        assert_eq!(ctx.get("seen").unwrap(), &Value::List(vec![Value::from("a"), Value::from("b")]));
        let returned = executor
            .apply(&mut ctx, input.clone(), &Action::RemoveVar(update))
            .unwrap();
        assert_eq!(returned, input);
        assert_eq!(ctx.get("seen").unwrap(), &Value::List(vec![Value::from("a")]));
    }

    #[test]
    fn test_dict_updates_resolve_key_references() {
        let doc = DocumentBuilder::new().finish();
        let sink = MemorySink::new();
        let executor = FlowExecutor::new(&doc, &sink);
        let mut ctx = ExecutionContext::new();
        ctx.declare("prices", VarKind::Mapping, None);
        ctx.declare("current", VarKind::Scalar, Some(Value::from("t2.micro")));
        let update = VarUpdate {
            name: "prices".to_string(),
            kind: VarKind::Mapping,
            key: Some(ValueSource::parse("$current")),
            value: None,
        };
        executor
            .apply(&mut ctx, Value::from("0.0116"), &Action::AddToVar(update.clone()))
            .unwrap();
        let Value::Map(prices) = ctx.get("prices").unwrap() else {
            panic!("expected a mapping");
        };
        assert_eq!(prices.get("t2.micro"), Some(&Value::from("0.0116")));
        executor
            .apply(&mut ctx, Value::Null, &Action::RemoveVar(update.clone()))
            .unwrap();
        let err = executor
            .apply(&mut ctx, Value::Null, &Action::RemoveVar(update))
            .unwrap_err();
        assert!(matches!(err, FlowError::EntryNotFound { .. }));
    }

    #[test]
    fn test_create_var_returns_declared_value() {
        let doc = DocumentBuilder::new().finish();
        let sink = MemorySink::new();
        let executor = FlowExecutor::new(&doc, &sink);
        let mut ctx = ExecutionContext::new();
        let action = Action::CreateVar {
            name: "title".to_string(),
            kind: VarKind::Scalar,
            value: Some(ValueSource::parse("Compute")),
        };
        let node = ActionNode::leaf(action);
        assert_eq!(
            executor.execute(&mut ctx, Value::Null, &node).unwrap(),
            Value::from("Compute")
        );
        assert_eq!(ctx.kind("title").unwrap(), VarKind::Scalar);
    }

    #[test]
    fn test_csv_save_requires_table_input() {
        let doc = DocumentBuilder::new().finish();
        let sink = MemorySink::new();
        let action = Action::SaveToFile(SaveSpec {
            to: "out".to_string(),
            file_type: FileType::Csv,
            long_name: false,
            dir: None,
        });
        let err = FlowExecutor::new(&doc, &sink)
            .apply(&mut ExecutionContext::new(), Value::from("text"), &action)
            .unwrap_err();
        assert!(matches!(err, FlowError::TypeMismatch { .. }));
        assert!(sink.saved().is_empty());
    }
}
