mod common;

use std::sync::Arc;

use common::FakeCluster;
use kube_invariants::services::{split_documents, ResourceDispatcher};
use proptest::prelude::*;

/// One generated document: empty, malformed, or a valid service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Doc {
    Empty,
    Malformed,
    Valid,
}

fn render(docs: &[Doc]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| match doc {
            Doc::Empty => "  \n".to_string(),
            Doc::Malformed => "kind: [unterminated\n".to_string(),
            Doc::Valid => format!("apiVersion: v1\nkind: Service\nmetadata:\n  name: svc-{i}\n"),
        })
        .collect::<Vec<_>>()
        .join("---\n")
}

fn doc_strategy() -> impl Strategy<Value = Vec<Doc>> {
    prop::collection::vec(
        prop_oneof![Just(Doc::Empty), Just(Doc::Malformed), Just(Doc::Valid)],
        1..12,
    )
}

proptest! {
    /// Property: splitting keeps one segment per document, empty ones included
    #[test]
    fn prop_split_preserves_positions(docs in doc_strategy()) {
        let blob = render(&docs);
        prop_assert_eq!(split_documents(&blob).len(), docs.len());
    }

    /// Property: only empty documents are skipped and every failing document
    /// is reported by its 1-based index
    #[test]
    fn prop_dispatch_reports_every_failure(docs in doc_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let cluster = FakeCluster::new();
        let dispatcher = ResourceDispatcher::new(Arc::new(cluster.clone()), "ns");
        let blob = render(&docs);

        let result = runtime.block_on(dispatcher.apply(blob.as_bytes()));

        let expected_failures: Vec<usize> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == Doc::Malformed)
            .map(|(i, _)| i + 1)
            .collect();
        let valid = docs.iter().filter(|d| **d == Doc::Valid).count();

        match result {
            Ok(summary) => {
                prop_assert!(expected_failures.is_empty());
                prop_assert_eq!(summary.created.len(), valid);
                prop_assert_eq!(summary.skipped, docs.len() - valid);
            }
            Err(err) => prop_assert_eq!(err.indices(), expected_failures),
        }
        prop_assert_eq!(cluster.calls().len(), valid);
    }
}
