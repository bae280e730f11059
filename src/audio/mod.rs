// src/audio/mod.rs — Audio assembly

pub mod assembler;

pub use assembler::AudioAssembler;
