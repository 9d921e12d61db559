//! CLI integration tests for quay.
//!
//! These tests run the binary against temporary workspaces.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the quay binary command, run inside `dir`.
fn quay(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quay").unwrap();
    cmd.current_dir(dir).env_remove("QUAY_OFFLINE");
    cmd
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// A workspace with a directory repository and two projects, `app`
/// depending on `lib`.
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(
        &root.join("Quay.toml"),
        "[workspace]\nmembers = [\"projects/*\"]\n\n\
         [[repository]]\nname = \"central\"\nkind = \"dir\"\npath = \"repo\"\n",
    );
    write(&root.join("repo/util/util-1.0.jar"), "1.0");
    write(&root.join("repo/util/util-1.4.jar"), "1.4");
    write(&root.join("repo/util/util-2.0.jar"), "2.0");

    write(&root.join("projects/lib/Quay.toml"), "[project]\nversion = \"1.0\"\n");
    write(&root.join("projects/lib/src/Lib.java"), "class Lib {}");
    write(
        &root.join("projects/app/Quay.toml"),
        "[project]\nversion = \"0.3\"\n\n[paths]\n\
         buildpath = \"lib;version=project, util;version='[1.0,2.0)'\"\n\
         runpath = \"util;version=1.0\"\n",
    );
    write(&root.join("projects/app/src/App.java"), "class App {}");

    tmp
}

// ============================================================================
// quay paths
// ============================================================================

#[test]
fn test_paths_text() {
    let tmp = workspace();

    quay(tmp.path())
        .args(["paths", "app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("buildpath:"))
        .stdout(predicate::str::contains("util;version=1.0.0"))
        .stdout(predicate::str::contains("lib;version=project"))
        .stdout(predicate::str::contains("dependson: lib"));
}

#[test]
fn test_paths_json() {
    let tmp = workspace();

    let output = quay(tmp.path())
        .args(["paths", "app", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["project"], "app");
    assert_eq!(report["buildpath"][0]["bsn"], "app");
    assert_eq!(report["buildpath"][2]["version"], "1.0.0");
    assert_eq!(report["runpath"][0]["version"], "2.0.0");
    assert_eq!(report["dependson"][0], "lib");
}

#[test]
fn test_paths_from_project_directory() {
    let tmp = workspace();

    quay(&tmp.path().join("projects/app/src"))
        .arg("paths")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("app\n"));
}

#[test]
fn test_paths_with_missing_entry_fails() {
    let tmp = workspace();
    write(
        &tmp.path().join("projects/lib/Quay.toml"),
        "[project]\n[paths]\nbuildpath = \"nothing;version=3.0\"\n",
    );

    quay(tmp.path())
        .args(["paths", "lib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found in repositories [central]"));
}

#[test]
fn test_directory_flag() {
    let tmp = workspace();
    let elsewhere = TempDir::new().unwrap();

    quay(elsewhere.path())
        .args(["-C", tmp.path().to_str().unwrap(), "tree", "app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("├── lib"));
}

// ============================================================================
// quay build / stale / clean
// ============================================================================

#[test]
fn test_build_produces_archives() {
    let tmp = workspace();

    quay(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Built lib"))
        .stderr(predicate::str::contains("Built app"));

    assert!(tmp.path().join("projects/app/generated/app.tar.gz").is_file());
    assert!(tmp.path().join("projects/lib/generated/lib.tar.gz").is_file());
    assert!(tmp.path().join("projects/app/generated/buildfiles").is_file());
}

#[test]
fn test_stale_then_fresh() {
    let tmp = workspace();

    quay(tmp.path())
        .args(["stale", "lib"])
        .assert()
        .success()
        .stdout("stale lib\n");

    quay(tmp.path()).args(["build", "lib"]).assert().success();

    quay(tmp.path())
        .args(["stale", "lib"])
        .assert()
        .success()
        .stdout("fresh lib\n");

    quay(tmp.path())
        .args(["build", "lib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Fresh lib"));
}

#[test]
fn test_offline_is_always_stale() {
    let tmp = workspace();
    quay(tmp.path()).args(["build", "lib"]).assert().success();

    quay(tmp.path())
        .args(["--offline", "stale", "lib"])
        .assert()
        .success()
        .stdout("stale lib\n");
}

#[test]
fn test_clean_removes_outputs() {
    let tmp = workspace();
    quay(tmp.path()).args(["build", "lib"]).assert().success();
    assert!(tmp.path().join("projects/lib/generated/lib.tar.gz").is_file());

    quay(tmp.path())
        .args(["clean", "lib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Cleaned lib"));

    assert!(!tmp.path().join("projects/lib/generated/lib.tar.gz").exists());
    assert!(tmp.path().join("projects/lib/generated").is_dir());
}

#[test]
fn test_cycle_is_reported() {
    let tmp = workspace();
    write(
        &tmp.path().join("projects/lib/Quay.toml"),
        "[project]\n[paths]\ndependson = \"app\"\n",
    );

    quay(tmp.path())
        .args(["paths", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn test_build_continues_past_cycle() {
    let tmp = workspace();
    write(
        &tmp.path().join("projects/lib/Quay.toml"),
        "[project]\n[paths]\ndependson = \"app\"\n",
    );
    write(&tmp.path().join("projects/solo/Quay.toml"), "[project]\n");
    write(&tmp.path().join("projects/solo/src/Solo.java"), "class Solo {}");

    quay(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed app: circular dependency"))
        .stderr(predicate::str::contains("Built solo"));

    assert!(tmp.path().join("projects/solo/generated/solo.tar.gz").is_file());
    assert!(!tmp.path().join("projects/app/generated/app.tar.gz").exists());
}

// ============================================================================
// quay release / repos
// ============================================================================

#[test]
fn test_release_and_list() {
    let tmp = workspace();

    quay(tmp.path())
        .args(["release", "lib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Released lib"));

    assert!(tmp.path().join("repo/lib/lib-1.0.0.tar.gz").is_file());

    quay(tmp.path())
        .args(["repos", "lib"])
        .assert()
        .success()
        .stdout("central: 1.0.0\n");

    quay(tmp.path())
        .arg("repos")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("central (rw)"));
}

#[test]
fn test_unknown_project() {
    let tmp = workspace();

    quay(tmp.path())
        .args(["build", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("available projects: app, lib"));
}

#[test]
fn test_outside_workspace() {
    let tmp = TempDir::new().unwrap();

    quay(tmp.path())
        .arg("stale")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: could not find `Quay.toml`"))
        .stderr(predicate::str::contains("help: create a `Quay.toml` with a [workspace] table"));
}
