use std::fs;
use std::path::{Path, PathBuf};

fn rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn rel(path: &Path) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    rel.replace('\\', "/")
}

fn src_files(sub: &str) -> Vec<PathBuf> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(sub);
    if path.is_file() {
        vec![path]
    } else {
        rs_files(&path)
    }
}

#[test]
fn store_does_not_depend_on_sampling() {
    let mut violations = Vec::new();

    for file in src_files("store") {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in ["crate::system", "sysinfo"] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} imports forbidden dependency `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Store layering violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn presentation_does_not_touch_platform_or_sqlite() {
    let mut violations = Vec::new();

    for file in ["format.rs", "report.rs"].into_iter().flat_map(src_files) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in ["crate::system::platform", "crate::system::host", "rusqlite"] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} imports forbidden dependency `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Presentation boundary violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn sampler_reaches_hardware_only_through_backends() {
    let mut violations = Vec::new();

    for file in src_files("system/sampler.rs") {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in ["sysinfo::", "super::platform", "crate::system::platform"] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} reaches past its backends via `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Sampler boundary violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn target_os_cfg_is_scoped_to_system_platform() {
    let mut violations = Vec::new();

    for file in src_files("") {
        let content = fs::read_to_string(&file).unwrap_or_default();
        if !content.contains("target_os") {
            continue;
        }

        let rel_path = rel(&file);
        if !rel_path.starts_with("src/system/platform/") {
            violations.push(format!(
                "{} contains `target_os` cfg but is outside allowed boundary",
                rel_path
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Unexpected target_os cfg usage:\n{}",
        violations.join("\n")
    );
}
