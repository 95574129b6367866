// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for asset index parsing and selection

#![no_main]

use gpw_core::StaticManifest;
use gpw_worker::discovery::{parse_index, select_assets};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(paths) = parse_index(data) {
        let manifest = StaticManifest::default();
        let selected = select_assets(paths, "/assets/", &manifest);

        for path in &selected {
            assert!(path.starts_with("/assets/"));
            assert!(!manifest.contains(path));
            assert_eq!(selected.iter().filter(|p| *p == path).count(), 1);
        }
    }
});
