//! Store-level integration tests for the in-memory graph.

use std::sync::Arc;
use std::thread;

use twinlink_graph::{
    AccessLevel, DataType, GraphError, GraphNode, GraphQueries, GraphStore, LinkKind, MemoryGraph,
    NodeId, Subgraph, Variant,
};

fn folder(graph: &MemoryGraph, name: &str, leaves: usize) -> Subgraph {
    let mut sub = Subgraph::new(GraphNode::object(graph.allocate_id(), name));
    let root = sub.root().clone();
    for i in 0..leaves {
        let leaf = GraphNode::variable(
            graph.allocate_id(),
            &format!("v{i}"),
            Variant::Int32(i as i32),
            DataType::Int32,
        )
        .with_access(AccessLevel::ReadWrite);
        sub.add_child(&root, LinkKind::HasProperty, leaf).unwrap();
    }
    sub
}

#[test]
fn test_replace_appends_after_siblings() {
    let graph = MemoryGraph::default();
    let objects = graph.root();
    let a = graph
        .attach(&objects, LinkKind::OrderedComponent, folder(&graph, "A", 1))
        .unwrap();
    graph
        .attach(&objects, LinkKind::OrderedComponent, folder(&graph, "B", 1))
        .unwrap();

    let removed = graph.replace(&a, folder(&graph, "A", 3)).unwrap();
    assert_eq!(removed.len(), 2);
    assert!(!graph.contains(&a));

    let names: Vec<_> = graph
        .children(&objects)
        .into_iter()
        .map(|n| n.browse_name)
        .collect();
    assert_eq!(names, vec!["B", "A"]);

    let entries = graph.browse(&objects).unwrap();
    assert!(entries.iter().all(|e| e.kind == LinkKind::OrderedComponent));

    let new_a = graph.browse_path(&objects, &["A"]).unwrap();
    assert_ne!(new_a, a);
    assert_eq!(graph.children(&new_a).len(), 3);
}

#[test]
fn test_failed_replace_leaves_old_subtree() {
    let graph = MemoryGraph::default();
    let objects = graph.root();
    let a = graph
        .attach(&objects, LinkKind::Component, folder(&graph, "A", 2))
        .unwrap();

    let mut bad = folder(&graph, "A", 0);
    let root = bad.root().clone();
    bad.add_link(&root, LinkKind::DictionaryEntry, NodeId::numeric(2, 9_999))
        .unwrap();

    let err = graph.replace(&a, bad).unwrap_err();
    assert!(matches!(err, GraphError::NodeNotFound(_)));
    assert!(graph.contains(&a));
    assert_eq!(graph.subtree(&a).len(), 3);
}

#[test]
fn test_browse_path_and_tree() {
    let graph = MemoryGraph::default();
    let objects = graph.root();
    graph
        .attach(&objects, LinkKind::Organizes, folder(&graph, "A", 2))
        .unwrap();

    let v1 = graph.browse_path(&objects, &["A", "v1"]).unwrap();
    assert_eq!(graph.read(&v1).unwrap(), Variant::Int32(1));
    assert!(graph.browse_path(&objects, &["A", "missing"]).is_none());

    let tree = graph.tree(&objects).unwrap();
    assert_eq!(tree.children.len(), 1);
    assert_eq!(tree.children[0].children.len(), 2);
    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["children"][0]["browse_name"], "A");
}

#[test]
fn test_ancestor_lookup() {
    let graph = MemoryGraph::default();
    let objects = graph.root();
    let a = graph
        .attach(&objects, LinkKind::Organizes, folder(&graph, "A", 1))
        .unwrap();
    let v0 = graph.browse_path(&a, &["v0"]).unwrap();

    assert_eq!(graph.ancestor_where(&v0, &|id| id == &objects), Some(objects.clone()));
    assert_eq!(graph.ancestor_where(&v0, &|_| true), Some(a));
    assert_eq!(graph.ancestor_where(&objects, &|_| true), None);
}

#[test]
fn test_readers_see_whole_subtrees() {
    let graph = Arc::new(MemoryGraph::default());
    let objects = graph.root();
    let a = graph
        .attach(&objects, LinkKind::Component, folder(&graph, "A", 4))
        .unwrap();

    let writer = {
        let graph = Arc::clone(&graph);
        thread::spawn(move || {
            let mut current = a;
            for _ in 0..50 {
                let sub = folder(&graph, "A", 4);
                let next = sub.root().clone();
                graph.replace(&current, sub).unwrap();
                current = next;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            let objects = objects.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    for entry in graph.browse(&objects).unwrap() {
                        // A visible subtree root always has all of its leaves.
                        let count = graph.children(&entry.target).len();
                        assert!(count == 4 || !graph.contains(&entry.target));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(graph.browse(&objects).unwrap().len(), 1);
}

#[test]
fn test_readers_never_see_partial_children() {
    let graph = Arc::new(MemoryGraph::default());
    let objects = graph.root();
    let mut sub = Subgraph::new(GraphNode::variable(
        graph.allocate_id(),
        "Keys",
        Variant::Int32(1),
        DataType::Int32,
    ));
    let keys = sub.root().clone();
    sub.graft(&keys, LinkKind::Component, folder(&graph, "Key0", 0))
        .unwrap();
    graph.attach(&objects, LinkKind::Organizes, sub).unwrap();

    let writer = {
        let graph = Arc::clone(&graph);
        let keys = keys.clone();
        thread::spawn(move || {
            for round in 0..100 {
                let count = round % 4 + 1;
                let children = (0..count)
                    .map(|i| (LinkKind::Component, folder(&graph, &format!("Key{i}"), 0)))
                    .collect();
                graph
                    .replace_children(&keys, Variant::Int32(count as i32), children)
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            let keys = keys.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    // Value and key objects always come from the same write.
                    let node = graph.node(&keys).unwrap();
                    assert_eq!(node.value, Variant::Int32(node.children().count() as i32));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}
