// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for push payload decoding

#![no_main]

use gpw_worker::{NotificationConfig, PushPayload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let defaults = NotificationConfig::default();
    let intent = PushPayload::decode(Some(data)).into_intent(&defaults);

    // Decoding never fails and never leaves a field blank
    assert!(!intent.title.is_empty());
    assert!(!intent.body.is_empty());
    assert!(!intent.data.url.is_empty());
    assert_eq!(intent.icon, defaults.icon);
});
