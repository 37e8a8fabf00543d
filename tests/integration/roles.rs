use anyhow::Result;

use crate::common::{TestProject, git_available, role_entry};

const PINNED_SHA: &str = "89abcdef0123456789abcdef0123456789abcdef";

/// Config marking remotes named `os-*` as first-party.
fn write_config(project: &TestProject) -> Result<String> {
    let path = project.write_file("osa-releases.toml", "primary_git_host = \"/remotes/os-\"\n")?;
    Ok(path.display().to_string())
}

#[test]
fn test_freeze_then_unfreeze_restores_file() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let keystone = project.create_remote("os-keystone", "master")?;
    let head = keystone.rev_parse_head()?;
    let nova = project.create_remote("os-nova", "stable/2024.1")?;
    let nova_head = nova.rev_parse_head()?;

    let original = format!(
        "---\n{}{}- name: pinned_role\n  scm: git\n  src: https://example.org/pinned\n  version: {PINNED_SHA}\n",
        role_entry("os_keystone", &keystone, "master", "master"),
        role_entry("os_nova", &nova, "stable/2024.1", "stable/2024.1"),
    );
    project.write_file("ansible-role-requirements.yml", &original)?;

    project
        .run(&["freeze_roles_for_milestone"])?
        .assert_success()
        .assert_stdout_contains(&format!("frozen at {head}"))
        .assert_stdout_contains("skipped (no trackbranch)")
        .assert_stdout_contains("2 role(s) changed, 0 failed, 3 total");

    let frozen = project.read_file("ansible-role-requirements.yml")?;
    assert!(frozen.contains(&format!("  version: {head}\n  trackbranch: master\n")));
    assert!(frozen.contains(&format!("  version: {nova_head}\n  trackbranch: stable/2024.1\n")));
    assert!(frozen.contains(&format!("  version: {PINNED_SHA}\n")));

    // Freezing again is a no-op even after upstream moved on
    keystone.commit_file("tasks/main.yml", "---\n")?;
    project
        .run(&["freeze_roles_for_milestone"])?
        .assert_success()
        .assert_stdout_contains("already frozen")
        .assert_stdout_contains("0 role(s) changed");
    assert_eq!(project.read_file("ansible-role-requirements.yml")?, frozen);

    project
        .run(&["unfreeze_roles_from_milestone"])?
        .assert_success()
        .assert_stdout_contains("tracking master")
        .assert_stdout_contains("2 role(s) changed, 0 failed, 3 total");
    assert_eq!(project.read_file("ansible-role-requirements.yml")?, original);
    Ok(())
}

#[test]
fn test_unfreeze_without_git_remotes() -> Result<()> {
    let project = TestProject::new()?;
    let original = format!(
        "- name: os_glance\n  scm: git\n  src: https://opendev.org/openstack/openstack-ansible-os_glance\n  version: {PINNED_SHA}\n  trackbranch: master\n"
    );
    project.write_file("ansible-role-requirements.yml", &original)?;

    project.run(&["unfreeze_roles_from_milestone"])?.assert_success();

    let text = project.read_file("ansible-role-requirements.yml")?;
    assert_eq!(text, original.replace(PINNED_SHA, "master"));
    Ok(())
}

#[test]
fn test_bump_copies_notes_and_skips_external_off_master() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let config = write_config(&project)?;

    let keystone = project.create_remote("os-keystone", "master")?;
    let old = keystone.rev_parse_head()?;
    let head = keystone.commit_file("releasenotes/notes/keystone-fix-1234.yaml", "fixes:\n  - x\n")?;
    let external = project.create_remote("ext-ceph", "master")?;
    let external_old = external.rev_parse_head()?;
    external.commit_file("tasks/main.yml", "---\n")?;

    project.write_file(
        "ansible-role-requirements.yml",
        &role_entry("os_keystone", &keystone, &old, "master"),
    )?;
    project.write_file(
        "external-role-requirements.yml",
        &role_entry("ceph-ansible", &external, &external_old, "master"),
    )?;

    project
        .run(&[
            "--config",
            &config,
            "bump_roles",
            "--branch",
            "stable/2024.1",
            "--external-file",
            "external-role-requirements.yml",
        ])?
        .assert_success()
        .assert_stdout_contains(&format!("{old} -> {head} (1 release note(s))"))
        .assert_stdout_contains("skipped (external, not on master)");

    let roles = project.read_file("ansible-role-requirements.yml")?;
    assert!(roles.contains(&format!("version: {head}\n")));
    let external_roles = project.read_file("external-role-requirements.yml")?;
    assert!(external_roles.contains(&format!("version: {external_old}\n")));
    assert!(project.project_path().join("releasenotes/notes/keystone-fix-1234.yaml").exists());

    // On master external roles move too
    project
        .run(&[
            "--config",
            &config,
            "bump_roles",
            "--branch",
            "master",
            "--external-file",
            "external-role-requirements.yml",
        ])?
        .assert_success()
        .assert_stdout_contains("up to date");
    let external_roles = project.read_file("external-role-requirements.yml")?;
    assert!(!external_roles.contains(&external_old));
    Ok(())
}

#[test]
fn test_missing_external_file_fails() -> Result<()> {
    let project = TestProject::new()?;
    project.write_file("ansible-role-requirements.yml", "---\n")?;

    project
        .run(&["unfreeze_roles_from_milestone", "--external-file", "missing.yml"])?
        .assert_failure()
        .assert_stderr_contains("missing.yml");
    Ok(())
}

#[test]
fn test_unfreeze_external_write_failure_keeps_main_file() -> Result<()> {
    let project = TestProject::new()?;
    let role = |name: &str| {
        format!(
            "- name: {name}\n  scm: git\n  src: https://opendev.org/openstack/{name}\n  version: {PINNED_SHA}\n  trackbranch: master\n"
        )
    };
    project.write_file("ansible-role-requirements.yml", &role("os_glance"))?;
    let external = role("ext_role");
    project.write_file("external.yml", &external)?;
    // a directory on the temp path makes the external write fail for any user
    std::fs::create_dir(project.project_path().join(".external.yml.tmp"))?;

    project
        .run(&["unfreeze_roles_from_milestone", "--external-file", "external.yml"])?
        .assert_failure()
        .assert_stderr_contains("partially failed: 1 updated, 1 failed")
        .assert_stderr_contains("external.yml");

    assert_eq!(
        project.read_file("ansible-role-requirements.yml")?,
        role("os_glance").replace(PINNED_SHA, "master")
    );
    assert_eq!(project.read_file("external.yml")?, external);
    Ok(())
}
