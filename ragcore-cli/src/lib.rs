// All core functionality lives in ragcore-core; this crate is a thin
// `clap`-based driver around it.

pub use ragcore_core::*;
