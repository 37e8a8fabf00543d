use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestProject;

#[test]
fn test_missing_reference_fails_before_any_lookup() -> Result<()> {
    let project = TestProject::new()?;
    project.write_file("global-requirement-pins.txt", "# Global pins\nrequests<3.0\n")?;

    project
        .command(&["check_pins"])?
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("Cannot determine which requirements reference")
                .and(predicate::str::contains("--requirements_sha")),
        );
    Ok(())
}

#[test]
fn test_missing_pin_file() -> Result<()> {
    let project = TestProject::new()?;

    project
        .command(&["check_pins", "--requirements_sha", "abc123"])?
        .assert()
        .failure()
        .stderr(predicate::str::contains("global-requirement-pins.txt"));
    Ok(())
}

#[test]
fn test_strict_mode_rejects_malformed_line() -> Result<()> {
    let project = TestProject::new()?;
    project.write_file("pins.txt", "requests<3.0\n!!not a requirement\n")?;

    project
        .command(&["check_pins", "--file", "pins.txt", "--strict", "--requirements_sha", "abc123"])?
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2").and(predicate::str::contains("--strict")));
    Ok(())
}

#[test]
fn test_help_lists_underscore_subcommands() -> Result<()> {
    let project = TestProject::new()?;

    project.command(&["--help"])?.assert().success().stdout(
        predicate::str::contains("check_pins")
            .and(predicate::str::contains("bump_upstream_shas"))
            .and(predicate::str::contains("freeze_roles_for_milestone"))
            .and(predicate::str::contains("unfreeze_roles_from_milestone")),
    );
    Ok(())
}
