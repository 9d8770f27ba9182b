//! Core library of the kiln toolchain.
//!
//! kiln lowers a typed declaration tree (the IR) into a WebAssembly
//! module. The pipeline is roughly:
//!
//!   IR units (.json)
//!     -> loader            (serde + walkdir)
//!     -> declarations      (emit/skip, naming, locals and labels)
//!     -> lower_body        (expression trees to symbolic instructions)
//!     -> facades           (multifile facade classes, lowered the same way)
//!     -> codegen_wasm      (wasm-encoder)
//!
//! Higher-level tools (the CLI) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and configuration
// ---------------------------------------------------------------------

pub mod config;
pub mod error;

// ---------------------------------------------------------------------
// IR: types, declarations, expressions
// ---------------------------------------------------------------------

pub mod builder;
pub mod ir;
pub mod loader;
pub mod types;

// ---------------------------------------------------------------------
// Naming and type mapping
// ---------------------------------------------------------------------

pub mod index;
pub mod intrinsics;
pub mod names;
pub mod type_mapper;

// ---------------------------------------------------------------------
// Lowering passes
// ---------------------------------------------------------------------

pub mod copy;
pub mod declarations;
pub mod facades;
pub mod lower_body;

// ---------------------------------------------------------------------
// Back-end: target module, encoding and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen_wasm;
pub mod compiler;
pub mod module;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, compile_units, compile_with};
pub use config::CodegenConfig;
pub use error::CoreError;
pub use module::WasmModule;
