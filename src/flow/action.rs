//! Typed action nodes
//!
//! Each flow step is parsed once, at load time, into an [`Action`] carrying
//! validated parameters. Unknown action names and missing required
//! parameters are reported before anything runs.

use super::params::Params;
use crate::document::AttrFilter;
use crate::error::{FlowError, Result};
use crate::hierarchy::{LevelSpec, Marker};
use crate::persist::{FileType, SaveSpec};
use crate::table::ConstantColumn;
use crate::vars::{ValueSource, VarKind};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as Yaml};
use std::fmt;

/// How a child action is applied to its parent's result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositionMode {
    /// Run once against the parent's result
    #[default]
    #[serde(alias = "Atomic")]
    Atomic,
    /// Run once per element of the parent's result
    Loop,
    /// Run once against the parent's result as a whole
    #[serde(alias = "rec")]
    Recursive,
    /// Run once per root-to-leaf branch of a hierarchy tree
    #[serde(alias = "tree_dfs")]
    TreeDfs,
}

impl fmt::Display for CompositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositionMode::Atomic => "atomic",
            CompositionMode::Loop => "loop",
            CompositionMode::Recursive => "recursive",
            CompositionMode::TreeDfs => "tree-dfs",
        };
        f.write_str(name)
    }
}

/// Single or multi-node selection for `path`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    pub selection: Selection,
    pub node_type: String,
    pub filter: AttrFilter,
    /// Nodes whose attribute equals the paired value are dropped
    pub exclude: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub filter: AttrFilter,
    pub columns: Vec<ConstantColumn>,
    pub enforce: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeQuery {
    pub levels: LevelSpec,
    pub start: Option<Marker>,
    pub end: Option<Marker>,
    pub save_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchQuery {
    pub table_index: Option<usize>,
    pub columns: Vec<ConstantColumn>,
}

/// Parameters shared by `addToVar` and `removeVar`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarUpdate {
    pub name: String,
    pub kind: VarKind,
    pub key: Option<ValueSource>,
    /// Defaults to the action's input when absent
    pub value: Option<ValueSource>,
}

/// One operation of the flow language
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Path(PathQuery),
    Table2Csv(TableQuery),
    BuildConnectionTree(TreeQuery),
    TreeBranch2Csv(BranchQuery),
    Get { value: String },
    Substring { start: Option<i64>, end: Option<i64> },
    Concat { prefix: ValueSource, suffix: ValueSource },
    CreateVar { name: String, kind: VarKind, value: Option<ValueSource> },
    SaveToFile(SaveSpec),
    AddToVar(VarUpdate),
    RemoveVar(VarUpdate),
    GetVar { source: ValueSource },
    End,
}

impl Action {
    /// Name as written in flow files
    pub fn name(&self) -> &'static str {
        match self {
            Action::Path(_) => "path",
            Action::Table2Csv(_) => "table2csv",
            Action::BuildConnectionTree(_) => "buildConnectionTree",
            Action::TreeBranch2Csv(_) => "treeBranch2csv",
            Action::Get { .. } => "get",
            Action::Substring { .. } => "substring",
            Action::Concat { .. } => "concat",
            Action::CreateVar { .. } => "createVar",
            Action::SaveToFile(_) => "saveToFile",
            Action::AddToVar(_) => "addToVar",
            Action::RemoveVar(_) => "removeVar",
            Action::GetVar { .. } => "getVar",
            Action::End => "end",
        }
    }

    /// Parse an action from its name and raw parameters
    pub fn parse(name: &str, params: Option<&Mapping>) -> Result<Self> {
        match name {
            "path" => parse_path(Params::new("path", params)),
            "table2csv" => parse_table(Params::new("table2csv", params)),
            "buildConnectionTree" => parse_tree(Params::new("buildConnectionTree", params)),
            "treeBranch2csv" => parse_branch(Params::new("treeBranch2csv", params)),
            "get" => {
                let p = Params::new("get", params);
                p.warn_unknown(&["value"]);
                Ok(Action::Get {
                    value: p.required_string("value")?,
                })
            }
            "substring" => {
                let p = Params::new("substring", params);
                p.warn_unknown(&["start", "end"]);
                Ok(Action::Substring {
                    start: p.integer("start")?,
                    end: p.integer("end")?,
                })
            }
            "concat" => {
                let p = Params::new("concat", params);
                p.warn_unknown(&["prefix", "suffix"]);
                let source = |key: &str| -> Result<ValueSource> {
                    Ok(ValueSource::parse(&p.string(key)?.unwrap_or_default()))
                };
                Ok(Action::Concat {
                    prefix: source("prefix")?,
                    suffix: source("suffix")?,
                })
            }
            "createVar" => parse_create_var(Params::new("createVar", params)),
            "saveToFile" => parse_save(Params::new("saveToFile", params)),
            "addToVar" => Ok(Action::AddToVar(parse_var_update(Params::new("addToVar", params))?)),
            "removeVar" => Ok(Action::RemoveVar(parse_var_update(Params::new("removeVar", params))?)),
            "getVar" => {
                let p = Params::new("getVar", params);
                p.warn_unknown(&["varName"]);
                let source = match ValueSource::parse(&p.required_string("varName")?) {
                    ValueSource::Literal(name) => ValueSource::Var(name),
                    reference => reference,
                };
                Ok(Action::GetVar { source })
            }
            "end" => Ok(Action::End),
            other => Err(FlowError::UnknownAction {
                name: other.to_string(),
            }),
        }
    }
}

fn parse_path(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&["type", "HTMLtype", "id", "class", "exclude"]);
    let selection = match p.string("type")?.as_deref() {
        None | Some("multi") => Selection::Multi,
        Some("single") => Selection::Single,
        Some(other) => {
            return Err(FlowError::invalid_parameter(
                "path",
                "type",
                format!("expected single or multi, got '{other}'"),
            ))
        }
    };
    Ok(Action::Path(PathQuery {
        selection,
        node_type: p.required_string("HTMLtype")?,
        filter: AttrFilter::id_or_class(p.string("id")?.as_deref(), p.string("class")?.as_deref()),
        exclude: p.string_pairs("exclude")?,
    }))
}

fn constant_columns(p: &Params<'_>) -> Result<Vec<ConstantColumn>> {
    Ok(p.string_pairs("preDefinedColumns")?
        .into_iter()
        .map(|(name, raw)| ConstantColumn::new(name, ValueSource::parse(&raw)))
        .collect())
}

fn parse_table(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&["id", "class", "preDefinedColumns", "numOfColumnToEnforce"]);
    Ok(Action::Table2Csv(TableQuery {
        filter: AttrFilter::id_or_class(p.string("id")?.as_deref(), p.string("class")?.as_deref()),
        columns: constant_columns(&p)?,
        enforce: p.index("numOfColumnToEnforce")?,
    }))
}

fn parse_tree(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&[
        "treeRelations",
        "StartintPoint",
        "startingPoint",
        "EndingPoint",
        "endingPoint",
        "saveToVar",
    ]);
    let levels = match p.mapping("treeRelations") {
        Ok(Some(map)) => levels_from_mapping(map)?,
        Ok(None) => return Err(FlowError::missing_parameter("buildConnectionTree", "treeRelations")),
        Err(_) => LevelSpec::from_path(&p.required_string("treeRelations")?),
    };
    if levels.is_empty() {
        return Err(FlowError::invalid_parameter(
            "buildConnectionTree",
            "treeRelations",
            "no element types given",
        ));
    }
    let marker = |keys: &[&str]| -> Result<Option<Marker>> {
        Ok(p
            .marker(keys)?
            .map(|(node_type, filter)| Marker::new(node_type, filter)))
    };
    Ok(Action::BuildConnectionTree(TreeQuery {
        levels,
        start: marker(&["startingPoint", "StartintPoint"])?,
        end: marker(&["endingPoint", "EndingPoint"])?,
        save_to: p.string("saveToVar")?,
    }))
}

fn levels_from_mapping(map: &Mapping) -> Result<LevelSpec> {
    let mut pairs = Vec::with_capacity(map.len());
    for (node_type, level) in map {
        let node_type = node_type.as_str();
        let level = level.as_u64().and_then(|level| usize::try_from(level).ok());
        match (node_type, level) {
            (Some(node_type), Some(level)) => pairs.push((node_type.to_string(), level)),
            _ => {
                return Err(FlowError::invalid_parameter(
                    "buildConnectionTree",
                    "treeRelations",
                    "expected element types mapped to non-negative levels",
                ))
            }
        }
    }
    Ok(LevelSpec::from_pairs(pairs))
}

fn parse_branch(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&["idxOfHtmlTable", "preDefinedColumns"]);
    Ok(Action::TreeBranch2Csv(BranchQuery {
        table_index: p.index("idxOfHtmlTable")?,
        columns: constant_columns(&p)?,
    }))
}

fn parse_create_var(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&["name", "type", "value"]);
    let kind = match p.string("type")? {
        Some(raw) => VarKind::parse(&raw).ok_or_else(|| {
            FlowError::invalid_parameter("createVar", "type", format!("unknown variable type '{raw}'"))
        })?,
        None => VarKind::Scalar,
    };
    Ok(Action::CreateVar {
        name: p.required_string("name")?,
        kind,
        value: p.string("value")?.map(|raw| ValueSource::parse(&raw)),
    })
}

fn parse_save(p: Params<'_>) -> Result<Action> {
    p.warn_unknown(&["to", "fileType", "longName", "dir"]);
    let raw_type = p.required_string("fileType")?;
    let file_type = FileType::parse(&raw_type).ok_or_else(|| {
        FlowError::invalid_parameter("saveToFile", "fileType", format!("expected csv or json, got '{raw_type}'"))
    })?;
    Ok(Action::SaveToFile(SaveSpec {
        to: p.required_string("to")?,
        file_type,
        long_name: p.boolean("longName")?.unwrap_or(false),
        dir: p.string("dir")?,
    }))
}

fn parse_var_update(p: Params<'_>) -> Result<VarUpdate> {
    p.warn_unknown(&["varName", "varType", "varKey", "varValue"]);
    let raw_kind = p.required_string("varType")?;
    let kind = VarKind::parse(&raw_kind).ok_or_else(|| {
        FlowError::invalid_parameter(p.action(), "varType", format!("unknown variable type '{raw_kind}'"))
    })?;
    let key = p.string("varKey")?.map(|raw| ValueSource::parse(&raw));
    if kind == VarKind::Mapping && key.is_none() {
        return Err(FlowError::missing_parameter(p.action(), "varKey"));
    }
    Ok(VarUpdate {
        name: p.required_string("varName")?,
        kind,
        key,
        value: p.string("varValue")?.map(|raw| ValueSource::parse(&raw)),
    })
}

/// A parsed flow step with its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNode {
    pub action: Action,
    pub mode: CompositionMode,
    pub children: Vec<ActionNode>,
}

impl ActionNode {
    pub fn leaf(action: Action) -> Self {
        Self {
            action,
            mode: CompositionMode::Atomic,
            children: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: CompositionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_child(mut self, child: ActionNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ActionNode::count).sum::<usize>()
    }

    fn describe_into(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(self.action.name());
        if self.mode != CompositionMode::Atomic {
            out.push_str(&format!(" [{}]", self.mode));
        }
        out.push('\n');
        for child in &self.children {
            child.describe_into(depth + 1, out);
        }
    }

    /// Indented outline of the subtree
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(0, &mut out);
        out
    }
}

/// Flow step as written in YAML, before validation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAction {
    action_name: String,
    #[serde(default)]
    action_params: Option<Yaml>,
    #[serde(default)]
    sub_actions: Vec<RawAction>,
    #[serde(default)]
    action_type: Option<CompositionMode>,
}

impl RawAction {
    pub(crate) fn into_node(self) -> Result<ActionNode> {
        let params = match &self.action_params {
            None | Some(Yaml::Null) => None,
            Some(Yaml::Mapping(map)) => Some(map),
            Some(Yaml::Sequence(items)) if items.is_empty() => None,
            Some(_) => {
                return Err(FlowError::definition(format!(
                    "actionParams of '{}' must be a mapping",
                    self.action_name
                )))
            }
        };
        let action = Action::parse(&self.action_name, params)?;
        let children = self
            .sub_actions
            .into_iter()
            .map(RawAction::into_node)
            .collect::<Result<Vec<_>>>()?;
        Ok(ActionNode {
            action,
            mode: self.action_type.unwrap_or_default(),
            children,
        })
    }
}
