use std::path::Path;
use std::process::{Command, Output};

use vmk_core::models::{Coordinates, Narration, PlanStatus, Region, VideoPlan};

fn videomaker(workdir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_videomaker"))
        .current_dir(workdir)
        .arg("--config")
        .arg(workdir.join("config.toml"))
        .args(args)
        .output()
        .unwrap()
}

fn write_plan(dir: &Path, with_image: bool) -> String {
    let image = dir.join("source.png");
    if with_image {
        std::fs::write(&image, b"not decoded by validation").unwrap();
    }
    let output = dir.join("videos");
    std::fs::create_dir_all(&output).unwrap();

    let mut plan = VideoPlan::create_empty(image, output, 30.0);
    plan.meta_info.title = "Smoke".to_string();
    plan.meta_info.description = "Smoke test plan".to_string();
    plan.meta_info.status = PlanStatus::Completed;
    plan.regions.push(Region::new(
        "region_1",
        "Everything",
        Coordinates::default(),
        Narration::new("One short sentence.", 5.0),
    ));

    let path = dir.join("plan.json");
    plan.save_json(&path).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn invalid_plan_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write_plan(dir.path(), false);

    let out = videomaker(dir.path(), &["generate", &plan, "--validate-only"]);

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Source image not found"), "{stderr}");
    assert!(dir.path().join("config.toml").is_file());
}

#[test]
fn valid_plan_passes_validation() {
    let dir = tempfile::tempdir().unwrap();
    let plan = write_plan(dir.path(), true);

    let out = videomaker(dir.path(), &["generate", &plan, "--validate-only"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Plan is valid"));
    // Nothing ran, so no run directory was created
    let runs = std::fs::read_dir(dir.path().join("videos")).unwrap().count();
    assert_eq!(runs, 0);
}

#[test]
fn unsupported_plan_version_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(write_plan(dir.path(), true)).unwrap()).unwrap();
    json["plan_version"] = serde_json::json!(99);
    std::fs::write(&path, json.to_string()).unwrap();

    let out = videomaker(dir.path(), &["generate", path.to_str().unwrap(), "--validate-only"]);

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("load plan"));
}
