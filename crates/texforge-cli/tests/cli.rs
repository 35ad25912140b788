//! End-to-end tests of the `texforge` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn texforge(cache: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("texforge").unwrap();
    cmd.arg("--cache-dir").arg(cache.path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("texforge")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("compile"))
        .stdout(predicate::str::contains("engines"));
}

#[test]
fn test_compile_missing_file_fails() {
    let cache = TempDir::new().unwrap();
    texforge(&cache)
        .args(["compile", "does-not-exist.tex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_compile_rejects_unknown_engine() {
    let cache = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("doc.tex");
    std::fs::write(&file, "\\begin{document}x\\end{document}").unwrap();

    texforge(&cache)
        .arg("compile")
        .arg(&file)
        .args(["--engine", "context"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid engine"));
    assert!(!dir.path().join("doc.pdf").exists());
}

#[test]
fn test_engines_reports_cache() {
    let cache = TempDir::new().unwrap();
    texforge(&cache)
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("pdflatex-fast"))
        .stdout(predicate::str::contains("Cached environments: 0"));
}

#[cfg(unix)]
#[test]
fn test_compile_with_engine_on_path() {
    use std::os::unix::fs::PermissionsExt;

    let cache = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let tectonic = bin.path().join("tectonic");
    std::fs::write(
        &tectonic,
        "#!/bin/sh\nprintf '%%PDF-fake' > \"$4/document.pdf\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&tectonic, std::fs::Permissions::from_mode(0o755)).unwrap();

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("paper.tex");
    std::fs::write(&file, "\\documentclass{article}\\begin{document}x\\end{document}").unwrap();

    let path = format!(
        "{}:{}",
        bin.path().display(),
        std::env::var("PATH").unwrap_or_default()
    );
    texforge(&cache)
        .env("PATH", path)
        .arg("compile")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("paper.pdf"));

    assert_eq!(std::fs::read(dir.path().join("paper.pdf")).unwrap(), b"%PDF-fake");
}
