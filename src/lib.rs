// src/lib.rs — Library root for voxbook

pub mod audio;
pub mod cli;
pub mod core;
pub mod infra;
pub mod session;
pub mod speech;
pub mod text;
pub mod util;
