//! Integration tests for the stemsplit CLI.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a stemsplit Command with a clean environment
fn stemsplit() -> Command {
    let mut cmd = cargo_bin_cmd!("stemsplit");
    cmd.env_remove("STEMSPLIT_PROGRAM")
        .env_remove("STEMSPLIT_MODEL")
        .env_remove("STEMSPLIT_PORT")
        .env_remove("RUST_LOG");
    cmd
}

/// A stand-in separator that writes both stems under `-o`.
fn write_fake_separator(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("fake-demucs.sh");
    fs::write(
        &path,
        r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "Separating track song.wav" >&2
printf ' 50%%|#####     | 1/2 [00:01<00:01]\r 100%%|##########| 2/2 [00:02<00:00]\n' >&2
mkdir -p "$out/htdemucs_ft/song"
printf 'v' > "$out/htdemucs_ft/song/vocals.mp3"
printf 'i' > "$out/htdemucs_ft/song/no_vocals.mp3"
"#,
    )
    .unwrap();
    path
}

fn write_config(dir: &TempDir, script: &std::path::Path) -> std::path::PathBuf {
    let path = dir.path().join("stemsplit.toml");
    fs::write(
        &path,
        format!(
            "[separator]\nprogram = \"sh\"\nargs = [{:?}]\nbitrate = 192\n",
            script.to_string_lossy()
        ),
    )
    .unwrap();
    path
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        stemsplit()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("separate"));
    }

    #[test]
    fn test_version() {
        stemsplit().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        stemsplit().arg("explode").assert().failure();
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_command {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("using defaults"))
            .stdout(predicate::str::contains("htdemucs_ft"))
            .stdout(predicate::str::contains("Separation phases: 4"));
    }

    #[test]
    fn test_config_env_override() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .env("STEMSPLIT_MODEL", "htdemucs")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Separation phases: 1 (model htdemucs)"));
    }

    #[test]
    fn test_config_invalid_env_port_fails() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .env("STEMSPLIT_PORT", "not-a-port")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("STEMSPLIT_PORT"));
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created stemsplit.toml"));
        assert!(dir.path().join("stemsplit.toml").exists());

        stemsplit()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("stemsplit.toml"),
            "[separator]\nbitrate = 0\n",
        )
        .unwrap();
        stemsplit()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("separator.bitrate must be greater than 0"));
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .args(["--config", "nope.toml", "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Config file not found"));
    }
}

// =============================================================================
// Separate Command Tests
// =============================================================================

mod separate_command {
    use super::*;

    #[test]
    fn test_separate_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        stemsplit()
            .current_dir(dir.path())
            .args(["separate", "missing.wav"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Input file not found"));
    }

    #[test]
    fn test_separate_writes_stems_and_keeps_input() {
        let dir = TempDir::new().unwrap();
        let script = write_fake_separator(&dir);
        let config = write_config(&dir, &script);
        let input = dir.path().join("My Song.wav");
        fs::write(&input, b"RIFF----WAVE").unwrap();
        let out = dir.path().join("stems");

        stemsplit()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&config)
            .arg("separate")
            .arg(&input)
            .arg("--out-dir")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("vocals_192.mp3"))
            .stdout(predicate::str::contains("instrumental_192.mp3"));

        assert_eq!(fs::read_to_string(out.join("vocals_192.mp3")).unwrap(), "v");
        assert_eq!(
            fs::read_to_string(out.join("instrumental_192.mp3")).unwrap(),
            "i"
        );
        assert!(input.exists());
    }

    #[test]
    fn test_separate_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fail.sh");
        fs::write(&script, "echo 'model not found' >&2\nexit 1\n").unwrap();
        let config = write_config(&dir, &script);
        let input = dir.path().join("song.wav");
        fs::write(&input, b"RIFF").unwrap();

        stemsplit()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&config)
            .arg("separate")
            .arg(&input)
            .assert()
            .failure()
            .stderr(predicate::str::contains("model not found"));
        assert!(input.exists());
    }
}
