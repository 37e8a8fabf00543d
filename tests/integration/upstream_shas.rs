use anyhow::Result;

use crate::common::{TestProject, git_available};

const OLD_SHA: &str = "0123456789abcdef0123456789abcdef01234567";

#[test]
fn test_no_matching_manifest_fails() -> Result<()> {
    let project = TestProject::new()?;

    project
        .run(&["bump_upstream_shas", "--path", "nothing/here/*.yml"])?
        .assert_failure()
        .assert_stderr_contains("No manifest found for patterns")
        .assert_stderr_contains("nothing/here/*.yml");
    Ok(())
}

#[test]
fn test_files_without_projects_fail() -> Result<()> {
    let project = TestProject::new()?;
    project.write_file("playbooks/defaults/repo_packages/extras.yml", "---\nfoo: bar\n")?;

    project.run(&["bump_upstream_shas"])?.assert_failure().assert_stderr_contains("No manifest found");
    Ok(())
}

#[test]
fn test_bump_moves_install_branch_to_track_head() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let nova = project.create_remote("nova", "master")?;
    let head = nova.commit_file("nova/__init__.py", "")?;

    let manifest = format!(
        "---\n\
         ## Nova service\n\
         nova_git_repo: {}\n\
         nova_git_install_branch: {OLD_SHA} # HEAD of \"master\" as of 01.01.2025\n\
         nova_git_track_branch: master\n\
         \n\
         heat_git_repo: https://opendev.org/openstack/heat\n\
         heat_git_install_branch: {OLD_SHA}\n\
         heat_git_track_branch: None\n",
        nova.url()
    );
    let relative = "playbooks/defaults/repo_packages/openstack_services.yml";
    project.write_file(relative, &manifest)?;

    project
        .run(&["bump_upstream_shas"])?
        .assert_success()
        .assert_stdout_contains("1 project(s) updated, 0 failed");

    let text = project.read_file(relative)?;
    assert!(text.contains(&format!("nova_git_install_branch: {head} # HEAD of \"master\" as of")));
    assert!(text.contains(&format!("heat_git_install_branch: {OLD_SHA}\n")));
    assert!(text.contains("## Nova service\n"));

    // Second run has nothing to do and leaves the file alone
    project
        .run(&["bump_upstream_shas"])?
        .assert_success()
        .assert_stdout_contains("0 project(s) updated, 0 failed");
    assert_eq!(project.read_file(relative)?, text);
    Ok(())
}

#[test]
fn test_unknown_branch_is_reported_not_fatal() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let glance = project.create_remote("glance", "master")?;

    let manifest = format!(
        "glance_git_repo: {}\nglance_git_install_branch: {OLD_SHA}\nglance_git_track_branch: stable/1999.1\n",
        glance.url()
    );
    let relative = "inventory/group_vars/all/glance_git.yml";
    project.write_file(relative, &manifest)?;

    project
        .run(&["bump_upstream_shas"])?
        .assert_success()
        .assert_stdout_contains("0 project(s) updated, 1 failed");
    assert_eq!(project.read_file(relative)?, manifest);
    Ok(())
}

#[test]
fn test_write_failure_in_one_manifest_is_partial() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let nova = project.create_remote("nova", "master")?;
    let glance = project.create_remote("glance", "master")?;
    let nova_head = nova.rev_parse_head()?;

    let manifest = |name: &str, url: String| {
        format!(
            "{name}_git_repo: {url}\n{name}_git_install_branch: {OLD_SHA}\n{name}_git_track_branch: master\n"
        )
    };
    project.write_file("playbooks/defaults/repo_packages/a.yml", &manifest("nova", nova.url()))?;
    let blocked = manifest("glance", glance.url());
    project.write_file("playbooks/defaults/repo_packages/b.yml", &blocked)?;
    // a directory on the temp path makes the write of b.yml fail for any user
    std::fs::create_dir(project.project_path().join("playbooks/defaults/repo_packages/.b.yml.tmp"))?;

    project
        .run(&["bump_upstream_shas"])?
        .assert_failure()
        .assert_stderr_contains("partially failed: 1 updated, 1 failed")
        .assert_stderr_contains("b.yml");

    let written = project.read_file("playbooks/defaults/repo_packages/a.yml")?;
    assert!(written.contains(&format!("nova_git_install_branch: {nova_head}\n")));
    assert_eq!(project.read_file("playbooks/defaults/repo_packages/b.yml")?, blocked);
    Ok(())
}

#[test]
fn test_path_is_searched_with_defaults() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let nova = project.create_remote("nova", "master")?;
    let glance = project.create_remote("glance", "master")?;
    let nova_head = nova.rev_parse_head()?;
    let glance_head = glance.rev_parse_head()?;

    project.write_file(
        "playbooks/defaults/repo_packages/openstack_services.yml",
        &format!(
            "nova_git_repo: {}\nnova_git_install_branch: {OLD_SHA}\nnova_git_track_branch: master\n",
            nova.url()
        ),
    )?;
    project.write_file(
        "extra/glance_git.yml",
        &format!(
            "glance_git_repo: {}\nglance_git_install_branch: {OLD_SHA}\nglance_git_track_branch: master\n",
            glance.url()
        ),
    )?;

    project
        .run(&["bump_upstream_shas", "--path", "extra/*.yml"])?
        .assert_success()
        .assert_stdout_contains("2 project(s) updated, 0 failed");

    assert!(project.read_file("playbooks/defaults/repo_packages/openstack_services.yml")?.contains(&nova_head));
    assert!(project.read_file("extra/glance_git.yml")?.contains(&glance_head));
    Ok(())
}
