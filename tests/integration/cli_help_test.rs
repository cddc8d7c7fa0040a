use std::process::Command;

fn help(args: &[&str]) -> String {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("mailsmith"))
        .args(args)
        .output()
        .expect("should run successfully");
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_top_level_help_lists_build_commands() {
    let stdout = help(&["--help"]);
    assert!(stdout.contains("BUILD COMMANDS"));
    for command in ["sass", "prebcp", "cpcss", "cpimages", "pb", "teste", "watch", "run", "tasks"] {
        assert!(stdout.contains(command), "missing {} in help", command);
    }
}

#[test]
fn test_pb_help_describes_stages() {
    let stdout = help(&["pb", "--help"]);
    assert!(stdout.contains("prebcp, cpcss and cpimages in parallel"));
    assert!(stdout.contains("mailsmith pb --root"));
}

#[test]
fn test_watch_help_lists_options() {
    let stdout = help(&["watch", "--help"]);
    assert!(stdout.contains("--port"));
    assert!(stdout.contains("--no-preview"));
    assert!(stdout.contains("live-reload"));
}

#[test]
fn test_tasks_help_mentions_dot() {
    let stdout = help(&["tasks", "--help"]);
    assert!(stdout.contains("--dot"));
}

#[test]
fn test_version_flag() {
    let stdout = help(&["--version"]);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
