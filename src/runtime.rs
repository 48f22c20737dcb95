// SPDX-License-Identifier: MPL-2.0

//! Runtime for the `inkwell` binary.
//!
//! Only `main` enters it. Everything in the library spawns onto the runtime
//! it is called from, which lets tests use `#[tokio::test]` instead.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

/// Cap on blocking threads; every cache call shares one SQLite connection
const MAX_BLOCKING_THREADS: usize = 8;

static SHARED: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(MAX_BLOCKING_THREADS)
        .enable_all()
        .thread_name("inkwell-worker")
        .build()
        .expect("failed to create async runtime")
});

/// Drive `future` to completion on the shared runtime
pub fn block_on<F: Future>(future: F) -> F::Output {
    SHARED.block_on(future)
}
