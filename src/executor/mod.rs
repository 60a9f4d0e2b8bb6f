//! Flow interpreter
//!
//! [`FlowExecutor`] evaluates an action tree against a document. Each node's
//! action runs first; its children then run against that result according
//! to their [`CompositionMode`]. Siblings do not chain: every child sees the
//! parent's result, and the parent's result becomes its last child's result.

use crate::document::Document;
use crate::error::{FlowError, Result};
use crate::flow::{ActionNode, CompositionMode, FlowDefinition};
use crate::persist::Persistence;
use crate::vars::{ExecutionContext, Value};
use tracing::{debug, info};

mod actions;

/// Evaluates flows against one document, writing output through one sink
pub struct FlowExecutor<'a> {
    doc: &'a dyn Document,
    sink: &'a dyn Persistence,
}

impl<'a> FlowExecutor<'a> {
    pub fn new(doc: &'a dyn Document, sink: &'a dyn Persistence) -> Self {
        Self { doc, sink }
    }

    /// Run every top-level step against the document root
    ///
    /// Returns the last step's result. The first error aborts the run.
    pub fn run(&self, ctx: &mut ExecutionContext, flow: &FlowDefinition) -> Result<Value> {
        let total = flow.steps.len();
        let mut last = Value::Null;
        for (index, step) in flow.steps.iter().enumerate() {
            info!(
                "Running flow step {}/{}: {}",
                index + 1,
                total,
                step.action.name()
            );
            last = self.execute(ctx, Value::Node(self.doc.root()), step)?;
        }
        Ok(last)
    }

    /// Evaluate one node and its children against `input`
    pub fn execute(
        &self,
        ctx: &mut ExecutionContext,
        input: Value,
        node: &ActionNode,
    ) -> Result<Value> {
        debug!(
            "Executing {} ({}) on {}",
            node.action.name(),
            node.mode,
            input
        );
        let produced = self.apply(ctx, input, &node.action)?;
        if node.children.is_empty() {
            return Ok(produced);
        }

        let mut result = Value::Null;
        for child in &node.children {
            result = self.compose(ctx, &produced, child)?;
        }
        Ok(result)
    }

    fn compose(
        &self,
        ctx: &mut ExecutionContext,
        produced: &Value,
        child: &ActionNode,
    ) -> Result<Value> {
        match child.mode {
            CompositionMode::Atomic | CompositionMode::Recursive => {
                self.execute(ctx, produced.clone(), child)
            }
            CompositionMode::Loop => {
                let elements = produced.elements().ok_or_else(|| {
                    FlowError::type_mismatch(
                        format!("loop into '{}'", child.action.name()),
                        "node collection or list",
                        produced.type_name(),
                    )
                })?;
                debug!(
                    "Looping {} over {} elements",
                    child.action.name(),
                    elements.len()
                );
                let mut last = Value::Null;
                for element in elements {
                    last = self.execute(ctx, element, child)?;
                }
                Ok(last)
            }
            CompositionMode::TreeDfs => {
                let Value::Tree(tree) = produced else {
                    return Err(FlowError::type_mismatch(
                        format!("tree-dfs into '{}'", child.action.name()),
                        "hierarchy tree",
                        produced.type_name(),
                    ));
                };
                let mut last = Value::Null;
                let mut visited = 0usize;
                for branch in tree.branches() {
                    visited += 1;
                    last = self.execute(ctx, Value::Branch(branch), child)?;
                }
                debug!("Visited {} branches with {}", visited, child.action.name());
                Ok(last)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse_document, ArenaDocument, AttrFilter};
    use crate::flow::{Action, PathQuery, Selection};
    use crate::persist::{MemorySink, SavedContent};
    use crate::vars::{ValueSource, VarKind};

    fn pricing_page() -> ArenaDocument {
        parse_document(
            r#"<html><body>
                <ul id="services"><li>EC2</li><li>S3</li><li id="skip">Legacy</li></ul>
                <table id="prices">
                  <tr><th>Name</th><th>Age</th></tr>
                  <tr><td>Bob</td><td>30</td></tr>
                  <tr><td>Sue</td><td>41</td></tr>
                </table>
            </body></html>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_table_flow_saves_rows() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let flow = FlowDefinition::from_yaml_str(
            r#"
flow:
  - actionName: path
    actionParams: { type: single, HTMLtype: table, id: prices }
    subActions:
      - actionName: table2csv
        actionParams: { preDefinedColumns: { Service: $ServiceName } }
        subActions:
          - actionName: saveToFile
            actionParams: { to: prices, fileType: csv }
"#,
        )
        .unwrap();
        let mut ctx = ExecutionContext::new();
        ctx.declare("ServiceName", VarKind::Scalar, Some(Value::from("Compute")));

        FlowExecutor::new(&doc, &sink).run(&mut ctx, &flow).unwrap();

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        let SavedContent::Table(table) = &saved[0].content else {
            panic!("expected a table");
        };
        assert_eq!(table.header, vec!["Service", "Name", "Age"]);
        assert_eq!(
            table.rows,
            vec![vec!["Compute", "Bob", "30"], vec!["Compute", "Sue", "41"]]
        );
    }

    #[test]
    fn test_loop_collects_into_variable() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let flow = FlowDefinition::from_yaml_str(
            r#"
flow:
  - actionName: createVar
    actionParams: { name: names, type: list }
  - actionName: path
    actionParams: { HTMLtype: li, exclude: { id: skip } }
    subActions:
      - actionName: get
        actionParams: { value: text }
        actionType: loop
        subActions:
          - actionName: addToVar
            actionParams: { varName: names, varType: list }
  - actionName: getVar
    actionParams: { varName: names }
"#,
        )
        .unwrap();
        let mut ctx = ExecutionContext::new();
        let result = FlowExecutor::new(&doc, &sink).run(&mut ctx, &flow).unwrap();
        assert_eq!(
            result,
            Value::List(vec![Value::from("EC2"), Value::from("S3")])
        );
    }

    #[test]
    fn test_empty_loop_yields_null() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let flow = FlowDefinition::from_yaml_str(
            r#"
- actionName: path
  actionParams: { HTMLtype: video }
  subActions:
    - actionName: get
      actionParams: { value: text }
      actionType: loop
"#,
        )
        .unwrap();
        let result = FlowExecutor::new(&doc, &sink)
            .run(&mut ExecutionContext::new(), &flow)
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_loop_over_scalar_is_type_mismatch() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let flow = FlowDefinition::from_yaml_str(
            r#"
- actionName: path
  actionParams: { type: single, HTMLtype: li }
  subActions:
    - actionName: get
      actionParams: { value: text }
      subActions:
        - actionName: concat
          actionParams: { prefix: "x" }
          actionType: loop
"#,
        )
        .unwrap();
        let err = FlowExecutor::new(&doc, &sink)
            .run(&mut ExecutionContext::new(), &flow)
            .unwrap_err();
        assert!(matches!(err, FlowError::TypeMismatch { .. }));
    }

    #[test]
    fn test_siblings_see_parent_result() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let flow = FlowDefinition::from_yaml_str(
            r#"
- actionName: path
  actionParams: { type: single, HTMLtype: li }
  subActions:
    - actionName: get
      actionParams: { value: text }
      subActions:
        - actionName: concat
          actionParams: { prefix: "<" }
        - actionName: concat
          actionParams: { suffix: ">" }
"#,
        )
        .unwrap();
        let result = FlowExecutor::new(&doc, &sink)
            .run(&mut ExecutionContext::new(), &flow)
            .unwrap();
        assert_eq!(result, Value::from("EC2>"));
    }

    #[test]
    fn test_programmatic_flow_loops_over_path_results() {
        let doc = pricing_page();
        let sink = MemorySink::new();
        let items = ActionNode::leaf(Action::Path(PathQuery {
            selection: Selection::Multi,
            node_type: "li".to_string(),
            filter: AttrFilter::new(),
            exclude: vec![("id".to_string(), "skip".to_string())],
        }));
        let text = ActionNode::leaf(Action::Get {
            value: "text".to_string(),
        })
        .with_mode(CompositionMode::Loop)
        .with_child(ActionNode::leaf(Action::Concat {
            prefix: ValueSource::parse("<"),
            suffix: ValueSource::parse(">"),
        }));
        let flow = FlowDefinition::new(vec![items.with_child(text)]);

        assert_eq!(flow.action_count(), 3);
        assert!(flow.describe().contains("  get [loop]"));
        let result = FlowExecutor::new(&doc, &sink)
            .run(&mut ExecutionContext::new(), &flow)
            .unwrap();
        assert_eq!(result, Value::from("<S3>"));
    }
}
