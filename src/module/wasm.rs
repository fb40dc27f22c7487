//! WebAssembly module initializer.
//!
//! Loads the module artifact, then compiles, links and instantiates it with
//! wasmtime on the blocking pool so the async caller only ever sees one
//! suspension point. The start function (if any) runs during instantiation.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, trace};
use wasmtime::{Config, Engine, ExternType, Linker, Module, Store};

use super::instance::ModuleInstance;
use super::{ExportKind, LoadedModule, ModuleExport, ModuleInitializer, ModuleLoadError, ModuleSource};

/// Loads, compiles and instantiates a WebAssembly artifact.
pub struct WasmModuleInitializer {
    source: ModuleSource,
    engine: Engine,
    client: reqwest::Client,
    trap_unknown_imports: bool,
}

impl WasmModuleInitializer {
    /// Create an initializer for the given artifact source.
    pub fn new(source: ModuleSource) -> Result<Self> {
        let mut config = Config::new();
        config.wasm_reference_types(true);
        config.wasm_multi_value(true);

        let engine = Engine::new(&config)?;
        debug!("Created WebAssembly engine");

        Ok(Self {
            source,
            engine,
            client: reqwest::Client::new(),
            trap_unknown_imports: false,
        })
    }

    /// Satisfy imports the host does not provide with functions that trap
    /// when called. Off by default: an unresolved import fails instantiation.
    pub fn with_trapping_imports(mut self, enabled: bool) -> Self {
        self.trap_unknown_imports = enabled;
        self
    }
}

fn export_kind(ty: &ExternType) -> ExportKind {
    match ty {
        ExternType::Func(_) => ExportKind::Function,
        ExternType::Memory(_) => ExportKind::Memory,
        ExternType::Table(_) => ExportKind::Table,
        ExternType::Global(_) => ExportKind::Global,
        #[allow(unreachable_patterns)]
        _ => ExportKind::Other,
    }
}

/// Compile `bytes` (binary or WAT text), instantiate it and describe the result.
fn instantiate(
    engine: &Engine,
    source: String,
    bytes: &[u8],
    trap_unknown_imports: bool,
) -> Result<LoadedModule, ModuleLoadError> {
    if bytes.is_empty() {
        return Err(ModuleLoadError::Malformed("empty module artifact".to_string()));
    }

    trace!("Compiling WebAssembly module ({} bytes)", bytes.len());
    let module = Module::new(engine, bytes).map_err(|e| ModuleLoadError::Malformed(format!("{:#}", e)))?;

    let mut linker: Linker<()> = Linker::new(engine);
    if trap_unknown_imports {
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(|e| ModuleLoadError::Instantiate(format!("{:#}", e)))?;
    }

    trace!("Instantiating WebAssembly module");
    let mut store = Store::new(engine, ());
    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|e| ModuleLoadError::Instantiate(format!("{:#}", e)))?;

    let exports = module
        .exports()
        .map(|export| ModuleExport {
            name: export.name().to_string(),
            kind: export_kind(&export.ty()),
        })
        .collect();

    Ok(LoadedModule {
        source,
        size_bytes: bytes.len(),
        import_count: module.imports().count(),
        exports,
        instance: Some(ModuleInstance::new(store, instance)),
    })
}

/// Instantiate a WAT snippet synchronously.
#[cfg(test)]
pub(crate) fn instantiate_wat(wat: &str) -> LoadedModule {
    instantiate(&Engine::default(), "inline.wat".to_string(), wat.as_bytes(), false).unwrap()
}

#[async_trait]
impl ModuleInitializer for WasmModuleInitializer {
    async fn initialize(&mut self) -> Result<LoadedModule, ModuleLoadError> {
        let bytes = self.source.fetch(&self.client).await?;
        debug!("Loaded {} bytes from {}", bytes.len(), self.source);

        let engine = self.engine.clone();
        let source = self.source.to_string();
        let trap_unknown_imports = self.trap_unknown_imports;
        let module =
            tokio::task::spawn_blocking(move || instantiate(&engine, source, &bytes, trap_unknown_imports))
                .await
                .map_err(|e| ModuleLoadError::Instantiate(e.to_string()))??;

        info!(
            "📦 Module ready: {} export(s), {} import(s)",
            module.exports.len(),
            module.import_count
        );
        Ok(module)
    }
}
