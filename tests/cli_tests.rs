//! Exit codes and output of the `package` command.

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    #[allow(deprecated)]
    fn bundler() -> Command {
        let mut cmd = Command::cargo_bin("kodegen_bundler_universal").unwrap();
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn project(build_script: &str, resources: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/icon.icns"), b"icns").unwrap();
        std::fs::write(dir.path().join("assets/sprite1.png"), b"png").unwrap();
        std::fs::write(
            dir.path().join("Bundle.toml"),
            format!(
                r#"[bundle]
name = "Clicker"
identifier = "org.example.clicker"
version = "1.0.0"
icon = "assets/icon.icns"
resources = [{resources}]

[build]
program = "sh"
args = ["-c", "{build_script}"]
artifact = "out/{{{{triple}}}}/{{{{bin}}}}"
"#
            ),
        )
        .unwrap();
        dir
    }

    const WRITE_SLICE: &str = "mkdir -p out/{{triple}} && printf '{{arch}}' > out/{{triple}}/{{bin}}";

    #[test]
    fn test_missing_config_exits_2() {
        let dir = TempDir::new().unwrap();
        bundler()
            .current_dir(dir.path())
            .args(["package", "--config", "Missing.toml"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Failed to read config file"));
    }

    #[test]
    fn test_invalid_identifier_exits_2() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        bundler()
            .current_dir(dir.path())
            .args(["package", "--identifier", "clicker"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("identifier"));
    }

    #[test]
    fn test_empty_argument_values_exit_2() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        for args in [["package", "--arch", " "], ["package", "--name", ""]] {
            bundler()
                .current_dir(dir.path())
                .args(args)
                .assert()
                .code(2)
                .stderr(predicate::str::contains("Invalid arguments"));
        }
        assert!(!dir.path().join("target").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_json_skip_build_warning_stays_off_stdout() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        bundler()
            .current_dir(dir.path())
            .args(["package", "--json"])
            .assert()
            .success();

        let assert = bundler()
            .current_dir(dir.path())
            .args(["package", "--json", "--skip-build"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Skipping build"));
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(summary["checksum"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_unsupported_architecture_exits_4() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        bundler()
            .current_dir(dir.path())
            .args(["package", "--arch", "x86_64", "--arch", "sparc"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("sparc"));
    }

    #[test]
    fn test_skip_build_without_artifacts_exits_4() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        bundler()
            .current_dir(dir.path())
            .args(["package", "--skip-build"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("merge stage"));
    }

    #[cfg(unix)]
    #[test]
    fn test_toolchain_failure_exits_3() {
        let dir = project("exit 1", r#""assets/*.png""#);
        bundler()
            .current_dir(dir.path())
            .arg("package")
            .assert()
            .code(3)
            .stderr(predicate::str::contains("compile stage"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unmatched_resource_exits_5() {
        let dir = project(WRITE_SLICE, r#""fonts/*.ttf""#);
        bundler()
            .current_dir(dir.path())
            .arg("package")
            .assert()
            .code(5)
            .stderr(predicate::str::contains("fonts/*.ttf"));
        assert!(!dir.path().join("target/bundle/Clicker.app").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_json_summary() {
        let dir = project(WRITE_SLICE, r#""assets/*.png""#);
        let assert = bundler()
            .current_dir(dir.path())
            .args(["package", "--json", "--output", "dist"])
            .assert()
            .success();

        let output = assert.get_output();
        let stdout = String::from_utf8(output.stdout.clone()).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert!(String::from_utf8_lossy(&output.stderr).contains("Packaging Clicker 1.0.0"));

        assert_eq!(
            summary["architectures"],
            serde_json::json!(["x86_64", "arm64"])
        );
        assert!(
            summary["path"]
                .as_str()
                .unwrap()
                .ends_with("dist/Clicker.app")
        );
        assert_eq!(summary["checksum"].as_str().unwrap().len(), 64);
        assert!(dir.path().join("dist/Clicker.app/Contents/Info.plist").is_file());
    }
}
