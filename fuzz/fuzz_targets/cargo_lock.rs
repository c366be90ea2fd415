#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use vigil_sca_scanner::{CargoLockParser, LockfileParser, build_dependency_tree, impact_paths};

// parse -> tree -> impact paths for every reachable node
fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(graph) = CargoLockParser.parse(content, "fuzz/Cargo.lock") else {
        return;
    };
    let (tree, unique) = build_dependency_tree(&graph.nodes, &graph.root);
    let targets: HashSet<String> = unique.into_iter().take(16).collect();
    let _ = impact_paths(&tree, &targets);
});
