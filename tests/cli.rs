use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cmd(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("heartmula_release").unwrap();
    cmd.arg("--project-root")
        .arg(project)
        .env_remove("CODESIGN_IDENTITY")
        .env_remove("RUST_LOG");
    cmd
}

/// Every input the default rule set asks for.
fn complete_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let write = |rel: &str, contents: &str| {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    };

    write("launcher.py", "from backend.app.main import app\n");
    write("backend/__init__.py", "");
    write("backend/app/__init__.py", "");
    write("backend/app/main.py", "app = None\n");
    write(
        "backend/requirements.txt",
        "fastapi>=0.110\nuvicorn[standard]\npywebview\nnumpy<2\n",
    );
    write("frontend/dist/index.html", "<!doctype html>");
    write(
        "build/macos/icon.svg",
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="1024" height="1024"/>"#,
    );
    write("build/macos/Launch HeartMuLa.command", "#!/bin/sh\n");
    write("build/macos/README.txt", "Drag HeartMuLa Studio to Applications.\n");
    fs::create_dir_all(root.join("build/macos/hooks")).unwrap();
    tmp
}

#[test]
fn help_lists_every_stage() {
    let tmp = TempDir::new().unwrap();
    let output = cmd(tmp.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for stage in [
        "validate-only",
        "build-icon",
        "bundle",
        "sign",
        "package",
        "release",
        "smoke-test",
    ] {
        assert!(stdout.contains(stage), "missing {stage}");
    }
}

#[test]
fn validate_only_on_empty_project_names_stage_and_rule() {
    let tmp = TempDir::new().unwrap();

    cmd(tmp.path())
        .arg("validate-only")
        .assert()
        .code(1)
        .stderr(contains("validate stage failed"))
        .stderr(contains("launcher.py"))
        .stderr(contains("npm run build"));
}

#[test]
fn validate_only_passes_with_complete_inputs() {
    let tmp = complete_project();

    cmd(tmp.path())
        .arg("validate-only")
        .assert()
        .success()
        .stdout(contains("All required inputs present"));

    // No side effects.
    assert!(!tmp.path().join("dist").exists());
    assert!(!tmp.path().join("build/macos/work").exists());
}

#[test]
fn failed_warning_rule_does_not_block() {
    let tmp = complete_project();
    fs::write(
        tmp.path().join("backend/requirements.txt"),
        "fastapi\nuvicorn\nnumpy==2.1.0\n",
    )
    .unwrap();

    cmd(tmp.path())
        .arg("validate-only")
        .assert()
        .success()
        .stderr(contains("numpy"));
}

#[test]
fn malformed_config_is_a_usage_error() {
    let tmp = complete_project();
    fs::write(tmp.path().join("release.toml"), "[package\nversion = 1").unwrap();

    cmd(tmp.path())
        .arg("validate-only")
        .assert()
        .code(2)
        .stderr(contains("configuration error"));
}

#[test]
fn missing_project_root_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();

    cmd(&tmp.path().join("nope"))
        .arg("validate-only")
        .assert()
        .code(2)
        .stderr(contains("is not a directory"));
}

#[test]
fn sign_without_bundle_points_at_bundle_stage() {
    let tmp = complete_project();

    cmd(tmp.path())
        .args(["sign", "--identity", "ad-hoc"])
        .assert()
        .code(1)
        .stderr(contains("bundle stage failed"))
        .stderr(contains("Run the bundle command first"));
}

#[test]
fn build_icon_without_source_names_stage() {
    let tmp = complete_project();
    fs::remove_file(tmp.path().join("build/macos/icon.svg")).unwrap();

    cmd(tmp.path())
        .arg("build-icon")
        .assert()
        .code(1)
        .stderr(contains("build-icon stage failed"))
        .stderr(contains("icon.svg"));
}
