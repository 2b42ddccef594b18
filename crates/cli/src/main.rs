// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! benchviz CLI entry point.

fn main() {
    if let Err(e) = benchviz_cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
