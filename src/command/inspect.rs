use anyhow::{Context, Result};

use crate::bridge::DEFAULT_PANIC_EXPORT;
use crate::config::ConfigError;
use crate::module::{ModuleInitializer, ModuleSource, WasmModuleInitializer};

pub async fn run_inspect(module: String, json: bool, trap_unknown_imports: bool) -> Result<()> {
    let source = ModuleSource::parse(&module).ok_or(ConfigError::UnsupportedModuleSource(module))?;

    let mut initializer = WasmModuleInitializer::new(source.clone())
        .context("Failed to create WebAssembly engine")?
        .with_trapping_imports(trap_unknown_imports);
    let loaded = initializer
        .initialize()
        .await
        .with_context(|| format!("Failed to initialize module {}", source))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&loaded)?);
        return Ok(());
    }

    println!("Module: {}", loaded.source);
    println!("  Size: {} bytes", loaded.size_bytes);
    println!("  Imports: {}", loaded.import_count);
    println!("  Exports: {}", loaded.exports.len());
    for export in &loaded.exports {
        println!("    {:<8} {}", export.kind.to_string(), export.name);
    }

    if loaded.has_export(DEFAULT_PANIC_EXPORT) {
        println!("\n✅ Panic hook `{}` is exported", DEFAULT_PANIC_EXPORT);
    } else {
        println!(
            "\n⚠️  Panic hook `{}` is not exported; use --panic-export or --no-panic-export-check with `run`",
            DEFAULT_PANIC_EXPORT
        );
    }

    Ok(())
}
