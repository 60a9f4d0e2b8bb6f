//! Property tests for hierarchy building, branch extraction and projection

use proptest::prelude::*;
use scrapeflow::document::{ArenaDocument, AttrFilter, Document, DocumentBuilder, NodeId};
use scrapeflow::hierarchy::{build_tree, LevelSpec, Marker};
use scrapeflow::table::project_table;

const NO_ATTRS: [(&str, &str); 0] = [];

/// Lay out sections of `h2 > h3 > div*` as flat siblings, with noise between them
fn sectioned_document(sections: &[Vec<usize>]) -> (ArenaDocument, Vec<NodeId>) {
    let mut builder = DocumentBuilder::new();
    builder.element("h1", NO_ATTRS, "Title");
    let mut recognized = Vec::new();
    for (s, subsections) in sections.iter().enumerate() {
        recognized.push(builder.element("h2", NO_ATTRS, &format!("section {s}")));
        for (t, leaves) in subsections.iter().enumerate() {
            recognized.push(builder.element("h3", NO_ATTRS, &format!("topic {s}.{t}")));
            builder.element("p", NO_ATTRS, "unleveled");
            for l in 0..*leaves {
                recognized.push(builder.element("div", NO_ATTRS, &format!("leaf {s}.{t}.{l}")));
            }
        }
    }
    builder.element("h2", [("id", "end")], "Footer");
    builder.element("div", NO_ATTRS, "after the end");
    (builder.finish(), recognized)
}

fn sections_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(1usize..4, 1..4), 1..5)
}

proptest! {
    #[test]
    fn prop_branches_cover_recognized_nodes_in_order(sections in sections_strategy()) {
        let (doc, recognized) = sectioned_document(&sections);
        let end = Marker::new("h2", AttrFilter::new().with("id", "end"));
        let tree = build_tree(
            &doc,
            doc.root(),
            None,
            Some(&end),
            &LevelSpec::from_path("h2.h3.div"),
        )
        .unwrap();

        let mut seen = Vec::new();
        for branch in tree.branches() {
            prop_assert_eq!(branch.len(), 3);
            for node in branch {
                if !seen.contains(&node) {
                    seen.push(node);
                }
            }
        }
        prop_assert_eq!(seen, recognized);
    }

    #[test]
    fn prop_one_branch_per_leaf(sections in sections_strategy()) {
        let (doc, _) = sectioned_document(&sections);
        let tree = build_tree(
            &doc,
            doc.root(),
            None,
            None,
            &LevelSpec::from_path("h2.h3.div"),
        )
        .unwrap();

        // The footer's trailing div hangs directly off the footer heading
        let leaves: usize = sections.iter().flatten().sum::<usize>() + 1;
        prop_assert_eq!(tree.branches().count(), leaves);
        for branch in tree.branches() {
            prop_assert_eq!(doc.node_type(*branch.last().unwrap()), "div");
        }
    }

    #[test]
    fn prop_header_width_is_constants_plus_header_cells(
        cells in 1usize..8,
        constants in 0usize..4,
        rows in 0usize..5,
    ) {
        let mut builder = DocumentBuilder::new();
        let table = builder.open("table", NO_ATTRS);
        builder.open("tr", NO_ATTRS);
        for c in 0..cells {
            builder.element("th", NO_ATTRS, &format!("col {c}"));
        }
        builder.close();
        for r in 0..rows {
            builder.open("tr", NO_ATTRS);
            for c in 0..cells {
                builder.element("td", NO_ATTRS, &format!("{r}/{c}"));
            }
            builder.close();
        }
        builder.close();
        let doc = builder.finish();
        let constant_pairs: Vec<(String, String)> = (0..constants)
            .map(|i| (format!("k{i}"), format!("v{i}")))
            .collect();

        let result = project_table(&doc, table, &AttrFilter::new(), &constant_pairs, None).unwrap();

        prop_assert_eq!(result.header.len(), constants + cells);
        prop_assert_eq!(result.rows.len(), rows);
        for row in &result.rows {
            prop_assert_eq!(row.len(), constants + cells);
        }
    }
}
