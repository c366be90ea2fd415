#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_sca_scanner::{LockfileParser, NpmLockParser, build_dependency_tree};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data)
        && let Ok(graph) = NpmLockParser.parse(content, "fuzz/package-lock.json")
    {
        let _ = build_dependency_tree(&graph.nodes, &graph.root);
    }
});
