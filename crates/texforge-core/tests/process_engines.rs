//! Subprocess adapter tests against shell-script stand-ins for TeX engines.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use texforge_core::*;

const BUDGET: Duration = Duration::from_secs(10);

const DOC: &str = "\\documentclass{article}\n\\usepackage{amsmath}\n\\begin{document}\nHi\n\\end{document}\n";

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// `tectonic -X compile --outdir <ws> <ws>/document.tex`
fn fake_tectonic(dir: &Path) -> PathBuf {
    script(
        dir,
        "tectonic",
        r#"
if [ "$1" = "--version" ]; then echo "tectonic 0.15.0"; exit 0; fi
outdir="$4"
if grep -q FAIL "$5"; then
  echo "note: running TeX ..."
  echo "error: ! Undefined control sequence." >&2
  exit 1
fi
printf '%%PDF-tectonic' > "$outdir/document.pdf"
echo "note: Writing document.pdf"
"#,
    )
}

/// pdflatex that understands `-ini` format dumps and `-fmt=` loads.
///
/// Every dump appends a line to `dumps.log` next to the script.
fn fake_pdflatex(dir: &Path) -> PathBuf {
    let log = dir.join("dumps.log");
    let body = format!(
        r#"
case "$1" in
  --version) echo "pdfTeX 3.141592653-2.6-1.40.25 (TeX Live 2023)"; exit 0;;
  -ini)
    job="${{3#-jobname=}}"
    echo "$job" >> "{log}"
    if grep -q BROKEN preamble.tex; then echo "! Emergency stop."; exit 1; fi
    cp preamble.tex "$job.fmt"
    exit 0;;
esac
fmt=""
case "$1" in -fmt=*) fmt="${{1#-fmt=}}"; shift;; esac
outdir="$3"
if [ -n "$fmt" ]; then
  dir="${{TEXFORMATS%%:*}}"
  if [ ! -f "$dir/$fmt.fmt" ]; then echo "! I can't find the format file"; exit 1; fi
fi
if grep -q FAIL "$4"; then echo "! Undefined control sequence."; exit 1; fi
printf '%%PDF-%s' "${{fmt:-plain}}" > "$outdir/document.pdf"
"#,
        log = log.display()
    );
    script(dir, "pdflatex", &body)
}

fn dumps(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("dumps.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

fn invocation<'a>(source: &'a str, workspace: &'a Path) -> Invocation<'a> {
    Invocation {
        source,
        workspace,
        environment: None,
        budget: BUDGET,
        diagnostics_limit: 5000,
    }
}

#[tokio::test]
async fn test_tectonic_produces_artifact() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    let engine = TectonicEngine::with_program(fake_tectonic(bin.path()));

    let outcome = engine.run(invocation(DOC, ws.path())).await;

    match outcome {
        EngineOutcome::Success {
            artifact,
            diagnostics,
        } => {
            assert_eq!(artifact, b"%PDF-tectonic");
            assert!(diagnostics.contains("Writing document.pdf"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(std::fs::read_to_string(ws.path().join("document.tex")).unwrap(), DOC);
}

#[tokio::test]
async fn test_failure_combines_both_streams() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    let engine = TectonicEngine::with_program(fake_tectonic(bin.path()));

    let outcome = engine.run(invocation("FAIL", ws.path())).await;

    assert_eq!(
        outcome,
        EngineOutcome::Failure {
            failure: CompileFailure::NoArtifactProduced {
                engine: EngineKind::Tectonic
            },
            diagnostics: "note: running TeX ...\n\nerror: ! Undefined control sequence.\n"
                .to_string(),
        }
    );
}

#[tokio::test]
async fn test_stale_artifact_is_never_returned() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    std::fs::write(ws.path().join("document.pdf"), b"%PDF-previous-job").unwrap();
    let engine = TectonicEngine::with_program(fake_tectonic(bin.path()));

    let outcome = engine.run(invocation("FAIL", ws.path())).await;

    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_diagnostics_keep_the_tail() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    let noisy = script(
        bin.path(),
        "xelatex",
        "i=0\nwhile [ $i -lt 2000 ]; do echo \"line $i of output\"; i=$((i+1)); done\necho LAST-LINE\nexit 1\n",
    );
    let engine = ClassicEngine::with_program(EngineKind::Xelatex, noisy);

    let mut run = invocation(DOC, ws.path());
    run.diagnostics_limit = 100;
    let outcome = engine.run(run).await;

    let diagnostics = outcome.diagnostics();
    assert!(diagnostics.len() <= 100);
    assert!(diagnostics.trim_end().ends_with("LAST-LINE"));
}

#[tokio::test]
async fn test_hung_engine_times_out() {
    let bin = TempDir::new().unwrap();
    let ws = TempDir::new().unwrap();
    let hung = script(bin.path(), "lualatex", "echo starting\nsleep 30\n");
    let engine = ClassicEngine::with_program(EngineKind::Lualatex, hung);

    let mut run = invocation(DOC, ws.path());
    run.budget = Duration::from_millis(300);
    let started = std::time::Instant::now();
    let outcome = engine.run(run).await;

    assert_eq!(
        outcome,
        EngineOutcome::failed(CompileFailure::EngineTimeout {
            engine: EngineKind::Lualatex,
            budget: Duration::from_millis(300),
        })
    );
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_executable_is_unavailable() {
    let ws = TempDir::new().unwrap();
    let engine = ClassicEngine::with_program(EngineKind::Pdflatex, "/nonexistent/pdflatex");

    let outcome = engine.run(invocation(DOC, ws.path())).await;

    assert_eq!(
        outcome,
        EngineOutcome::failed(CompileFailure::EngineUnavailable {
            engine: EngineKind::Pdflatex
        })
    );
    assert_eq!(
        engine.probe(BUDGET).await,
        EngineProbe::Unavailable
    );
}

#[tokio::test]
async fn test_probe_reports_first_version_line() {
    let bin = TempDir::new().unwrap();
    let engine = FormatEngine::with_program(fake_pdflatex(bin.path()));

    let probe = engine.probe(BUDGET).await;

    assert_eq!(
        probe,
        EngineProbe::Available("pdfTeX 3.141592653-2.6-1.40.25 (TeX Live 2023)".to_string())
    );
}

fn orchestrator(bin: &Path, cache: &Path) -> Orchestrator {
    let format = Arc::new(FormatEngine::with_program(fake_pdflatex(bin)));
    let mut registry = EngineRegistry::new();
    registry
        .register(Arc::new(TectonicEngine::with_program(fake_tectonic(bin))))
        .register(format.clone())
        .register_environment_builder(EngineKind::PdflatexFast, format);
    let dirs = CacheDirs::from_root(cache).unwrap();
    Orchestrator::new(&dirs, registry, OrchestratorConfig::default())
}

#[tokio::test]
async fn test_fast_path_dumps_format_once() {
    let bin = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let orchestrator = orchestrator(bin.path(), cache.path());
    let key = EnvironmentKey::of("\\documentclass{article}\n\\usepackage{amsmath}\n");

    for _ in 0..2 {
        let result = orchestrator
            .compile(CompileRequest::new(DOC).engine("pdflatex-fast"))
            .await;
        assert_eq!(result.engine, Some(EngineKind::PdflatexFast));
        assert_eq!(
            result.artifact(),
            Some(format!("%PDF-{key}").as_bytes())
        );
    }

    assert_eq!(dumps(bin.path()), 1);
    assert_eq!(orchestrator.health().await.cached_environments, 1);

    let dumped = std::fs::read_to_string(
        cache.path().join("environments").join(format!("{key}.fmt")),
    )
    .unwrap();
    assert_eq!(
        dumped,
        "\\documentclass{article}\n\\usepackage{amsmath}\n\\dump\n"
    );
}

#[tokio::test]
async fn test_broken_preamble_falls_back_to_tectonic() {
    let bin = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let orchestrator = orchestrator(bin.path(), cache.path());

    let source = "\\documentclass{article}\n\\BROKEN\n\\begin{document}x\\end{document}";
    let result = orchestrator
        .compile(CompileRequest::new(source).engine("pdflatex-fast"))
        .await;

    assert_eq!(result.engine, Some(EngineKind::Tectonic));
    assert!(result.fallback_used());
    assert_eq!(result.artifact(), Some(&b"%PDF-tectonic"[..]));
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(orchestrator.health().await.cached_environments, 0);
    assert!(
        std::fs::read_dir(cache.path().join("scratch"))
            .unwrap()
            .next()
            .is_none()
    );
}

#[tokio::test]
async fn test_fast_compile_error_falls_back() {
    let bin = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let orchestrator = orchestrator(bin.path(), cache.path());

    let source = "\\documentclass{article}\n\\begin{document}FAIL\\end{document}";
    let result = orchestrator
        .compile(CompileRequest::new(source).engine("pdflatex-fast"))
        .await;

    // The fake tectonic rejects FAIL too, so the fallback failure is final.
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(
        result.failure(),
        Some(&CompileFailure::NoArtifactProduced {
            engine: EngineKind::Tectonic
        })
    );
    assert!(result.diagnostics.contains("Undefined control sequence"));
}
