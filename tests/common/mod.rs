//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A pricing page with two priced sections between the start and end markers
pub const PRICING_PAGE: &str = r#"<html>
<body>
  <h1>Pricing</h1>
  <h2 id="compute">Compute</h2>
  <h3>EC2</h3>
  <table class="price-table">
    <tr><th>Instance</th><th>Price per hour</th></tr>
    <tr><td>t2.micro</td><td>0.0116</td></tr>
    <tr><td>t2.small</td><td>0.023</td></tr>
  </table>
  <h3>Lambda</h3>
  <table class="price-table">
    <tr><th>Instance</th><th>Price per hour</th></tr>
    <tr><td>128MB</td><td>0.0000002</td></tr>
  </table>
  <h2 id="storage">Storage</h2>
  <h3>S3</h3>
  <table class="price-table">
    <tr><th>Instance</th><th>Price per hour</th></tr>
    <tr><td>Standard</td><td>0.023</td></tr>
  </table>
  <h2 id="footer">Footer</h2>
  <h3>Legal</h3>
  <table><tr><th>Terms</th></tr></table>
</body>
</html>"#;

/// Walks the compute and storage sections, collecting one table per service
pub const TREE_FLOW: &str = r#"
flow:
  - actionName: createVar
    actionParams: { name: rows, type: list }
  - actionName: buildConnectionTree
    actionParams:
      treeRelations: h2.h3.table
      startingPoint: { h2: { id: compute } }
      endingPoint: { h2: { id: footer } }
      saveToVar: pricing
    subActions:
      - actionName: treeBranch2csv
        actionType: tree_dfs
        actionParams:
          idxOfHtmlTable: 2
          preDefinedColumns: { Provider: $ServiceName, Category: "[0]", Service: "[1]" }
        subActions:
          - actionName: addToVar
            actionParams: { varName: rows, varType: list }
  - actionName: getVar
    actionParams: { varName: rows }
"#;

/// Saves every price table on the page into one CSV
pub const TABLE_FLOW: &str = r#"
flow:
  - actionName: path
    actionParams: { HTMLtype: table, class: price-table }
    subActions:
      - actionName: table2csv
        actionParams: { preDefinedColumns: { Provider: $ServiceName } }
        subActions:
          - actionName: saveToFile
            actionParams: { to: prices, fileType: csv }
"#;

/// Temporary directory holding flows, documents and output
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file relative to the workspace root
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).expect("Failed to read output")
    }

    /// Pricing page plus both flows
    pub fn with_pricing_fixtures(self) -> Self {
        self.write("page.html", PRICING_PAGE);
        self.write("tree.yaml", TREE_FLOW);
        self.write("table.yaml", TABLE_FLOW);
        self
    }
}
