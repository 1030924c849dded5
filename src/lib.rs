pub mod artifact;
pub mod cache;
pub mod config;
pub mod eval;
pub mod extract;
pub mod generate;
pub mod graph;
pub mod hash;
pub mod meta;
pub mod parse;
pub mod progress;
pub mod project;
pub mod resolve;
pub mod run;
pub mod scanner;
pub mod shared;
pub mod task;
pub mod work;

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;
