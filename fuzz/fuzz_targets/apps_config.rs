#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use vigil_jas_scanner::{AppsConfig, JasScanType};

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = AppsConfig::parse(content, Path::new("fuzz/apps-config.yml")) {
        for module in &config.modules {
            for scan_type in JasScanType::ALL {
                let _ = module.should_skip_scanner(scan_type);
                let _ = module.source_roots(scan_type);
                let _ = module.exclude_patterns(scan_type);
            }
        }
    }
});
