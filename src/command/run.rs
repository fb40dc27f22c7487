use anyhow::{bail, Context, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::debug;

use crate::bridge::ProcessPanicBridge;
use crate::cli::{self, RunArgs};
use crate::config::StartupConfig;
use crate::diagnostics::{DiagnosticSink, FanoutSink, JsonLinesSink, TracingSink};
use crate::module::WasmModuleInitializer;
use crate::mount::{HtmlDocument, MountTarget, RootComponent};
use crate::runtime;
use crate::startup::{StartupError, StartupOutcome, StartupSequencer};

fn build_config(args: RunArgs) -> Result<StartupConfig> {
    let document = cli::resolve_document(&args.document)?;

    let mut config = StartupConfig::new(&args.module, document)?.with_init_timeout_ms(args.init_timeout_ms)?;
    config.mount_target = MountTarget::new(args.target);
    config.root_component = RootComponent::new(args.root);
    config.panic_export = (!args.no_panic_export_check).then_some(args.panic_export);
    config.trap_unknown_imports = args.trap_unknown_imports;
    config.output = args.out;
    config.events = args.events;
    config.validate()?;

    Ok(config)
}

fn build_sink(config: &StartupConfig) -> Result<Arc<dyn DiagnosticSink>> {
    let Some(path) = &config.events else {
        return Ok(Arc::new(TracingSink));
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open events file: {:?}", path))?;
    debug!("Writing diagnostic events to {:?}", path);

    Ok(Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(JsonLinesSink::new(Box::new(file)))),
    ))
}

pub async fn run_startup(args: RunArgs) -> Result<()> {
    let config = build_config(args)?;
    let sink = build_sink(&config)?;

    let initializer = WasmModuleInitializer::new(config.module.clone())
        .context("Failed to create WebAssembly engine")?
        .with_trapping_imports(config.trap_unknown_imports);
    let bridge = ProcessPanicBridge::new(sink.clone()).with_required_export(config.panic_export.clone());
    let document = HtmlDocument::load(&config.document).await?;

    let mut sequencer = StartupSequencer::new(initializer, bridge, document, sink)
        .with_target(config.mount_target.clone())
        .with_root(config.root_component.clone())
        .with_init_timeout(config.init_timeout);

    let outcome = match sequencer.run().await {
        Ok(outcome) => outcome,
        Err(StartupError::MountTargetMissing(id)) => bail!(
            "No element with id=\"{}\" in {}; pass --target to mount elsewhere",
            id,
            config.document.display()
        ),
        Err(e) => {
            return Err(e).with_context(|| format!("Startup failed for module {}", config.module));
        }
    };

    if let Some(report) = runtime::get_report() {
        debug!("Startup report published for run {}", report.run_id);
    }

    let html = sequencer.into_host().into_html();
    match &config.output {
        Some(path) => {
            tokio::fs::write(path, &html)
                .await
                .with_context(|| format!("Failed to write mounted document: {:?}", path))?;
            eprintln!("{}, written to {}", summary(&outcome, &config), path.display());
        }
        None => {
            print!("{}", html);
            debug!("{}", summary(&outcome, &config));
        }
    }

    Ok(())
}

fn summary(outcome: &StartupOutcome, config: &StartupConfig) -> String {
    format!(
        "✅ Mounted <{}> into <{} id=\"{}\"> in {:.3} ms (run {}, {} export(s))",
        config.root_component.name(),
        outcome.host.tag,
        outcome.host.id,
        outcome.elapsed.as_secs_f64() * 1000.0,
        outcome.run_id,
        outcome.module.exports.len()
    )
}
