//! Compiler configuration.
//!
//! Deserializes from camelCase JSON. Every knob has a default so an empty
//! document (or no document) is a valid configuration.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Reserved. The core pipeline is optimization-free; levels are applied
    /// by downstream passes over the emitted LLVM IR.
    pub optimization_level: u8,
    /// LLVM target triple.
    pub target_triple: String,
    /// Module name echoed into the LLVM header.
    pub module_name: String,
    pub wasm: WasmSection,
    pub lua: LuaSection,
    pub js: JsSection,
    pub determinism: DeterminismSection,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            optimization_level: 0,
            target_triple: "x86_64-unknown-linux-gnu".to_string(),
            module_name: "main".to_string(),
            wasm: WasmSection::default(),
            lua: LuaSection::default(),
            js: JsSection::default(),
            determinism: DeterminismSection::default(),
        }
    }
}

impl CompilerConfig {
    /// Reads a configuration document.
    ///
    /// # Errors
    ///
    /// Fails when the document is not valid configuration JSON.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    /// The single strict-mode switch: scope errors in the lowerer, the Lua
    /// `continue` policy, and warning promotion all follow it.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.determinism.strict
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WasmSection {
    pub memory_initial_pages: u32,
    pub memory_max_pages: Option<u32>,
}

impl Default for WasmSection {
    fn default() -> Self {
        Self {
            memory_initial_pages: 1,
            memory_max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LuaSection {
    pub emit_continue_warning: bool,
}

impl Default for LuaSection {
    fn default() -> Self {
        Self {
            emit_continue_warning: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsSection {
    pub semicolons: bool,
    pub indent: usize,
}

impl Default for JsSection {
    fn default() -> Self {
        Self {
            semicolons: true,
            indent: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeterminismSection {
    /// Promote warnings to errors and reject loose constructs.
    pub strict: bool,
}
