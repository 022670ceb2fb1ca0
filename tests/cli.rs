//! CLI based tests
use std::process::ExitCode;

use mqft::main as mqft_main;

use rusty_fork::rusty_fork_test;

#[test]
fn show_config_files() {
    assert_eq!(mqft_main(["mqft", "config-files"]), ExitCode::SUCCESS);
}

#[test]
fn bad_option() {
    assert_eq!(
        mqft_main(["mqft", "--this-ridiculous-option-does-not-exist"]),
        ExitCode::FAILURE
    );
}

#[test]
fn help() {
    assert_eq!(mqft_main(["mqft", "--help"]), ExitCode::SUCCESS);
}

rusty_fork_test! {

#[test]
fn no_command() {
    assert_eq!(mqft_main(["mqft"]), ExitCode::FAILURE);
}

#[test]
fn show_config() {
    assert_eq!(mqft_main(["mqft", "show-config"]), ExitCode::SUCCESS);
}

#[test]
fn show_config_rejects_bad_values() {
    assert_eq!(
        mqft_main(["mqft", "--queue-depth", "0", "show-config"]),
        ExitCode::FAILURE
    );
}

#[test]
fn get_without_server() {
    let namespace = format!("mqft-cli-test-{:08x}", fastrand::u32(..));
    assert_eq!(
        mqft_main([
            "mqft",
            "--quiet",
            "--namespace",
            &namespace,
            "--session-timeout",
            "1",
            "get",
            "/etc/hostname",
        ]),
        ExitCode::FAILURE
    );
}

}
