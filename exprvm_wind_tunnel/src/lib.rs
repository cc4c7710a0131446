// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `exprvm`.
//!
//! Run with `cargo bench -p exprvm_wind_tunnel`.
