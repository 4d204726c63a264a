use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[grid]\n"
        + "height = 32\n"
        + "width = 32\n"
        + "\n"
        + "[init]\n"
        + "population = 600\n"
        + "sick = 10\n"
        + "vaccinated = 50\n"
        + "seed = 7\n"
        + "\n"
        + "[model]\n"
        + "prob_infection = 0.5\n"
        + "prob_breakthrough = 0.05\n"
        + "sick_duration = 8\n"
        + "\n"
        + "[output]\n"
        + "steps_per_save = 4\n"
        + "saves_per_file = 16\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagio"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    // A resumed run keeps appending to one continuous metrics series:
    // 3 trajectory files of 16 saves x 4 steps each.
    let metrics: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(test_dir.join("run-0000").join("metrics.json"))
            .expect("failed to read metrics"),
    )
    .expect("failed to parse metrics");
    assert_eq!(metrics["sick_fractions"].as_array().unwrap().len(), 192);

    let results_path = test_dir.join("run-0000").join("results.json");
    assert!(results_path.is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(test_dir.join("config.toml").is_file());

    fs::remove_dir_all(&test_dir).ok();
}
