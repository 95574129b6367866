// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for request identity normalization

#![no_main]

use arbitrary::Arbitrary;
use gpw_core::{Method, Request, RequestIdentity};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    method: u8,
    url: String,
}

const METHODS: [Method; 7] = [
    Method::Get,
    Method::Head,
    Method::Post,
    Method::Put,
    Method::Patch,
    Method::Delete,
    Method::Options,
];

fuzz_target!(|input: Input| {
    let method = METHODS[input.method as usize % METHODS.len()];
    let id = Request::get(input.url.as_str()).with_method(method).identity();

    assert!(!id.url.contains('#'));
    assert_eq!(id.is_cacheable(), method == Method::Get);

    // Normalizing twice changes nothing
    assert_eq!(RequestIdentity::new(id.method, &id.url), id);

    assert_eq!(RequestIdentity::parse_key(&id.to_key()), Some(id.clone()));

    let _ = input.url.parse::<Method>();
});
