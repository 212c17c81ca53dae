//! Command line tests for `d2p export`
//!
//! Export needs no API key, so these run the real binary against plan files
//! in a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLAN: &str = r#"{
  "title": "Habit Tracker",
  "summary": "A mobile app for tracking daily habits",
  "milestones": [
    { "id": "m2", "name": "Build", "description": "Core features", "orderIndex": 1, "taskIds": ["t2"] },
    { "id": "m1", "name": "Design", "description": "", "orderIndex": 0, "taskIds": ["t1"] }
  ],
  "tasks": [
    { "id": "t1", "title": "Design habit screens", "description": "Wireframes", "priority": "HIGH",
      "milestoneId": "m1", "dependsOn": [], "estimatedEffort": "1 week", "orderIndex": 0 },
    { "id": "t2", "title": "Build streak tracking", "description": "", "priority": "CRITICAL",
      "milestoneId": "m2", "dependsOn": ["t1"], "estimatedEffort": "", "orderIndex": 0 }
  ],
  "estimatedDuration": "3 months",
  "risks": ["Scope creep"],
  "assumptions": []
}"#;

struct CliTestEnv {
    dir: TempDir,
}

impl CliTestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(dir.path().join("home")).expect("failed to create HOME");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("failed to write fixture");
        path
    }

    fn d2p(&self) -> Command {
        let mut cmd = Command::cargo_bin("d2p").expect("d2p binary");
        cmd.current_dir(self.dir.path())
            .env("HOME", self.path("home"))
            .env("XDG_DATA_HOME", self.path("data"))
            .env("XDG_CONFIG_HOME", self.path("config"))
            .env_remove("ANTHROPIC_API_KEY");
        cmd
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn test_export_markdown_to_stdout() {
    let env = CliTestEnv::new();
    let plan = env.write("plan.json", PLAN);

    env.d2p()
        .args(["export", arg(&plan)])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Habit Tracker\n"))
        .stdout(predicate::str::contains("**Estimated Duration**: 3 months"))
        .stdout(predicate::str::contains("## Design\n"))
        .stdout(predicate::str::contains("- [ ] **Build streak tracking** [CRITICAL]"))
        .stdout(predicate::str::contains("## Risks"))
        .stdout(predicate::str::contains("## Assumptions").not());
}

#[test]
fn test_export_orders_milestones() {
    let env = CliTestEnv::new();
    let plan = env.write("plan.json", PLAN);

    let output = env.d2p().args(["export", arg(&plan)]).output().expect("run d2p");
    let stdout = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let design = stdout.find("## Design").expect("design heading");
    let build = stdout.find("## Build").expect("build heading");
    assert!(design < build);
}

#[test]
fn test_export_json_to_file() {
    let env = CliTestEnv::new();
    let plan = env.write("plan.json", PLAN);
    let out = env.path("copy.json");

    env.d2p()
        .args(["export", arg(&plan), "--format", "json", "--output", arg(&out)])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).expect("read output")).expect("json");
    let original: serde_json::Value = serde_json::from_str(PLAN).expect("json");
    assert_eq!(written["title"], original["title"]);
    assert_eq!(written["tasks"][1]["dependsOn"], original["tasks"][1]["dependsOn"]);
}

#[test]
fn test_export_md_alias() {
    let env = CliTestEnv::new();
    let plan = env.write("plan.json", PLAN);

    env.d2p()
        .args(["export", arg(&plan), "-f", "md"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Habit Tracker"));
}

#[test]
fn test_export_rejects_invalid_plan() {
    let env = CliTestEnv::new();
    let broken = PLAN.replace(r#""milestoneId": "m2""#, r#""milestoneId": "m9""#);
    let plan = env.write("broken.json", &broken);

    env.d2p()
        .args(["export", arg(&plan)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a valid plan"));
}

#[test]
fn test_export_missing_file() {
    let env = CliTestEnv::new();

    env.d2p()
        .args(["export", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read nope.json"));
}
