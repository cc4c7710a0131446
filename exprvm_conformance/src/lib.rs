// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end conformance tests for `exprvm`.
//!
//! The tests live in `tests/conformance.rs`; this crate has no library surface.
