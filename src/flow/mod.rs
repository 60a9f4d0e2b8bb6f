//! Flow definitions
//!
//! A flow file is YAML with a top-level `flow:` list of action steps. A bare
//! list of steps is accepted too.

use crate::error::{FlowError, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::debug;

pub mod action;
pub mod params;

pub use action::{
    Action, ActionNode, BranchQuery, CompositionMode, PathQuery, Selection, TableQuery, TreeQuery,
    VarUpdate,
};

use action::RawAction;

/// A validated flow: top-level steps run in order against the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinition {
    pub steps: Vec<ActionNode>,
}

struct RawFlow(Vec<RawAction>);

impl<'de> Deserialize<'de> for RawFlow {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFlowHelper {
            WithFlowField { flow: Vec<RawAction> },
            Steps(Vec<RawAction>),
        }

        let steps = match RawFlowHelper::deserialize(deserializer)? {
            RawFlowHelper::WithFlowField { flow } => flow,
            RawFlowHelper::Steps(steps) => steps,
        };
        Ok(RawFlow(steps))
    }
}

impl FlowDefinition {
    pub fn new(steps: Vec<ActionNode>) -> Self {
        Self { steps }
    }

    /// Parse and validate a flow from YAML text
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let raw: RawFlow = serde_yaml::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Validate a flow already parsed as YAML, e.g. one embedded in a job
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self> {
        let raw: RawFlow = serde_yaml::from_value(value)?;
        Self::from_raw(raw)
    }

    /// Read, parse and validate a flow file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| FlowError::FlowDefinition {
            message: format!("cannot read flow file {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        let flow = Self::from_yaml_str(&source)?;
        debug!(
            "Loaded flow {} with {} actions",
            path.display(),
            flow.action_count()
        );
        Ok(flow)
    }

    fn from_raw(raw: RawFlow) -> Result<Self> {
        if raw.0.is_empty() {
            return Err(FlowError::definition("flow has no steps"));
        }
        let steps = raw
            .0
            .into_iter()
            .map(RawAction::into_node)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    /// Total number of action nodes
    pub fn action_count(&self) -> usize {
        self.steps.iter().map(ActionNode::count).sum()
    }

    /// Indented outline of every step
    pub fn describe(&self) -> String {
        self.steps.iter().map(ActionNode::describe).collect()
    }
}
