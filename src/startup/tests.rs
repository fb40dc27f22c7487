//! Tests for the startup sequencer.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::bridge::{BridgeError, PanicBridge, ProcessPanicBridge};
    use crate::diagnostics::{DiagnosticEvent, RecordingSink};
    use crate::module::{
        ExportKind, LoadedModule, ModuleExport, ModuleInitializer, ModuleLoadError, ModuleSource,
        WasmModuleInitializer,
    };
    use crate::mount::{HostElement, HtmlDocument, MountError, MountHost, MountTarget, RootComponent};
    use crate::startup::{InitializationState, StartupError, StartupPhase, StartupSequencer};

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn calls(log: &CallLog) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    fn count(log: &CallLog, call: &str) -> usize {
        log.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn hooked_module() -> LoadedModule {
        LoadedModule::new(
            "fake.wasm",
            vec![ModuleExport {
                name: "setup_panic".to_string(),
                kind: ExportKind::Function,
            }],
        )
    }

    struct FakeInitializer {
        log: CallLog,
        delay: Duration,
        failure: Option<String>,
    }

    #[async_trait]
    impl ModuleInitializer for FakeInitializer {
        async fn initialize(&mut self) -> Result<LoadedModule, ModuleLoadError> {
            tokio::time::sleep(self.delay).await;
            self.log.lock().unwrap().push("initialize");
            match &self.failure {
                Some(cause) => Err(ModuleLoadError::Instantiate(cause.clone())),
                None => Ok(hooked_module()),
            }
        }
    }

    struct FakeBridge {
        log: CallLog,
        fail: bool,
    }

    impl PanicBridge for FakeBridge {
        fn install(&mut self, state: &InitializationState) -> Result<(), BridgeError> {
            if state.module().is_none() {
                return Err(BridgeError::Premature {
                    phase: state.phase(),
                });
            }
            self.log.lock().unwrap().push("install_bridge");
            if self.fail {
                return Err(BridgeError::AlreadyInstalled);
            }
            Ok(())
        }
    }

    struct FakeHost {
        log: CallLog,
        ids: Vec<&'static str>,
        attached: Vec<String>,
    }

    impl MountHost for FakeHost {
        fn element_by_id(&self, id: &str) -> Option<HostElement> {
            self.log.lock().unwrap().push("lookup");
            self.ids.iter().find(|known| **known == id).map(|known| HostElement {
                id: known.to_string(),
                tag: "div".to_string(),
                content_offset: 0,
            })
        }

        fn attach(&mut self, host: &HostElement, _root: &RootComponent) -> Result<(), MountError> {
            self.log.lock().unwrap().push("attach");
            self.attached.push(host.id.clone());
            Ok(())
        }
    }

    struct Harness {
        log: CallLog,
        sink: Arc<RecordingSink>,
        sequencer: StartupSequencer<FakeInitializer, FakeBridge, FakeHost>,
    }

    fn harness(delay: Duration, init_failure: Option<&str>, bridge_fails: bool) -> Harness {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());

        let sequencer = StartupSequencer::new(
            FakeInitializer {
                log: log.clone(),
                delay,
                failure: init_failure.map(str::to_string),
            },
            FakeBridge {
                log: log.clone(),
                fail: bridge_fails,
            },
            FakeHost {
                log: log.clone(),
                ids: vec!["app"],
                attached: Vec::new(),
            },
            sink.clone(),
        );

        Harness {
            log,
            sink,
            sequencer,
        }
    }

    fn reported_durations(sink: &RecordingSink) -> Vec<f64> {
        sink.events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::InitCompleted { elapsed_ms } => Some(elapsed_ms),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let mut h = harness(Duration::from_millis(5), None, false);

        let outcome = h.sequencer.run().await.unwrap();

        assert_eq!(
            calls(&h.log),
            vec!["initialize", "install_bridge", "lookup", "attach"]
        );
        assert_eq!(outcome.host.id, "app");
        assert!(outcome.module.has_export("setup_panic"));
        assert_eq!(h.sequencer.phase(), StartupPhase::Mounted);
        assert!(!outcome.run_id.is_nil());
    }

    #[tokio::test]
    async fn test_delayed_init_reports_duration_and_mounts_once() {
        let mut h = harness(Duration::from_millis(5), None, false);

        let outcome = h.sequencer.run().await.unwrap();

        let durations = reported_durations(&h.sink);
        assert_eq!(durations.len(), 1);
        assert!(durations[0] >= 5.0, "reported {} ms", durations[0]);
        assert!(outcome.elapsed >= Duration::from_millis(5));

        assert_eq!(h.sequencer.host().attached, vec!["app".to_string()]);
        assert_eq!(h.sink.count("mounted"), 1);
    }

    #[tokio::test]
    async fn test_init_failure_skips_bridge_and_mount() {
        let mut h = harness(Duration::ZERO, Some("network error"), false);

        let err = h.sequencer.run().await.unwrap_err();

        match &err {
            StartupError::ModuleLoad(ModuleLoadError::Instantiate(cause)) => {
                assert_eq!(cause, "network error")
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("network error"));

        assert_eq!(count(&h.log, "install_bridge"), 0);
        assert_eq!(count(&h.log, "attach"), 0);
        assert!(reported_durations(&h.sink).is_empty());
        assert_eq!(
            h.sink.events(),
            vec![DiagnosticEvent::InitFailed {
                cause: "module instantiation failed: network error".to_string()
            }]
        );
        assert_eq!(h.sequencer.phase(), StartupPhase::Failed);
    }

    #[tokio::test]
    async fn test_bridge_failure_skips_mount() {
        let mut h = harness(Duration::ZERO, None, true);

        let err = h.sequencer.run().await.unwrap_err();

        assert!(matches!(err, StartupError::Bridge(BridgeError::AlreadyInstalled)));
        assert_eq!(calls(&h.log), vec!["initialize", "install_bridge"]);
        assert!(reported_durations(&h.sink).is_empty());
        assert_eq!(h.sink.count("mounted"), 0);
        assert_eq!(
            h.sink.events(),
            vec![DiagnosticEvent::BridgeFailed {
                cause: "panic bridge is already installed in this process".to_string()
            }]
        );
        // Initialization itself succeeded; only the mount was withheld
        assert_eq!(h.sequencer.phase(), StartupPhase::Ready);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_after_mount() {
        let mut h = harness(Duration::ZERO, None, false);
        h.sequencer.run().await.unwrap();

        let err = h.sequencer.run().await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::AlreadyStarted(StartupPhase::Mounted)
        ));
        assert_eq!(count(&h.log, "initialize"), 1);
        assert_eq!(count(&h.log, "install_bridge"), 1);
        assert_eq!(count(&h.log, "attach"), 1);
        assert_eq!(reported_durations(&h.sink).len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_after_failure() {
        let mut h = harness(Duration::ZERO, Some("network error"), false);
        assert!(h.sequencer.run().await.is_err());

        let err = h.sequencer.run().await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::AlreadyStarted(StartupPhase::Failed)
        ));
        assert_eq!(count(&h.log, "initialize"), 1);
    }

    #[tokio::test]
    async fn test_init_timeout_aborts_startup() {
        let mut h = harness(Duration::from_millis(200), None, false);
        h.sequencer = h.sequencer.with_init_timeout(Some(Duration::from_millis(10)));

        let err = h.sequencer.run().await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::ModuleLoad(ModuleLoadError::TimedOut(limit)) if limit == Duration::from_millis(10)
        ));
        assert_eq!(count(&h.log, "install_bridge"), 0);
        assert_eq!(count(&h.log, "attach"), 0);
        assert_eq!(h.sink.count("init_failed"), 1);
        assert_eq!(h.sequencer.phase(), StartupPhase::Failed);
    }

    #[tokio::test]
    async fn test_missing_mount_target() {
        let mut h = harness(Duration::ZERO, None, false);
        h.sequencer = h.sequencer.with_target(MountTarget::new("root"));

        let err = h.sequencer.run().await.unwrap_err();

        assert!(matches!(err, StartupError::MountTargetMissing(ref id) if id == "root"));
        assert_eq!(count(&h.log, "attach"), 0);
        // Initialization did finish, so its duration is still reported
        assert_eq!(reported_durations(&h.sink).len(), 1);
        assert_ne!(h.sequencer.phase(), StartupPhase::Mounted);
    }

    #[tokio::test]
    async fn test_real_module_mounts_into_html_shell() {
        let dir = TempDir::new().unwrap();
        let wasm_path = dir.path().join("app.wat");
        fs::write(
            &wasm_path,
            r#"(module (func (export "setup_panic")) (func (export "getBoard")))"#,
        )
        .unwrap();

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());
        let document = HtmlDocument::parse(r#"<body><div id="app"></div></body>"#);

        let mut sequencer = StartupSequencer::new(
            WasmModuleInitializer::new(ModuleSource::Path(wasm_path)).unwrap(),
            FakeBridge {
                log: log.clone(),
                fail: false,
            },
            document,
            sink.clone(),
        )
        .with_root(RootComponent::new("Chessboard"));

        let outcome = sequencer.run().await.unwrap();

        assert!(outcome.module.has_export("getBoard"));
        assert_eq!(calls(&log), vec!["install_bridge"]);
        assert_eq!(
            sequencer.into_host().into_html(),
            r#"<body><div id="app"><div data-root-component="Chessboard"></div></div></body>"#
        );
        assert_eq!(reported_durations(&sink).len(), 1);
    }

    #[tokio::test]
    async fn test_real_module_failure_leaves_document_untouched() {
        let dir = TempDir::new().unwrap();
        let wasm_path = dir.path().join("broken.wasm");
        fs::write(&wasm_path, b"\0asm\x01\0\0\0\xff\xff").unwrap();

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());
        let shell = r#"<body><div id="app"></div></body>"#;

        let mut sequencer = StartupSequencer::new(
            WasmModuleInitializer::new(ModuleSource::Path(wasm_path)).unwrap(),
            FakeBridge {
                log: log.clone(),
                fail: false,
            },
            HtmlDocument::parse(shell),
            sink.clone(),
        );

        let err = sequencer.run().await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::ModuleLoad(ModuleLoadError::Malformed(_))
        ));
        assert!(calls(&log).is_empty());
        assert_eq!(sequencer.host().mounted_into(), None);
        assert_eq!(sequencer.into_host().into_html(), shell);
    }

    #[tokio::test]
    async fn test_trapping_module_hook_blocks_mount() {
        let dir = TempDir::new().unwrap();
        let wasm_path = dir.path().join("app.wat");
        fs::write(
            &wasm_path,
            r#"(module (func (export "setup_panic") unreachable) (func (export "getBoard")))"#,
        )
        .unwrap();

        let sink = Arc::new(RecordingSink::new());
        let shell = r#"<body><div id="app"></div></body>"#;

        // Fails before the process-wide hook is touched
        let mut sequencer = StartupSequencer::new(
            WasmModuleInitializer::new(ModuleSource::Path(wasm_path)).unwrap(),
            ProcessPanicBridge::new(sink.clone()),
            HtmlDocument::parse(shell),
            sink.clone(),
        );

        let err = sequencer.run().await.unwrap_err();

        assert!(
            matches!(err, StartupError::Bridge(BridgeError::HookFailed { ref export, .. }) if export == "setup_panic"),
            "got {:?}",
            err
        );
        let names: Vec<&str> = sink.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["panic", "bridge_failed"]);
        assert_eq!(sequencer.phase(), StartupPhase::Ready);
        assert_eq!(sequencer.host().mounted_into(), None);
        assert_eq!(sequencer.into_host().into_html(), shell);
    }

    #[tokio::test]
    async fn test_trapping_start_function_blocks_bridge_and_mount() {
        let dir = TempDir::new().unwrap();
        let wasm_path = dir.path().join("app.wat");
        fs::write(
            &wasm_path,
            r#"(module (func $start unreachable) (start $start) (func (export "setup_panic")))"#,
        )
        .unwrap();

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(RecordingSink::new());

        let mut sequencer = StartupSequencer::new(
            WasmModuleInitializer::new(ModuleSource::Path(wasm_path)).unwrap(),
            FakeBridge {
                log: log.clone(),
                fail: false,
            },
            HtmlDocument::parse(r#"<div id="app"></div>"#),
            sink.clone(),
        );

        let err = sequencer.run().await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::ModuleLoad(ModuleLoadError::Instantiate(_))
        ));
        assert!(calls(&log).is_empty());
        assert_eq!(sink.count("init_failed"), 1);
        assert_eq!(sequencer.phase(), StartupPhase::Failed);
    }
}
