use anyhow::Result;

use crate::common::{TestProject, git_available};

#[test]
fn test_git_collection_moves_to_highest_release_tag() -> Result<()> {
    if !git_available() {
        eprintln!("Skipping test: git not available");
        return Ok(());
    }
    let project = TestProject::new()?;
    let remote = project.create_remote("ansible-config_template", "master")?;
    remote.tag("1.0.0")?;
    remote.commit_file("plugins/action/config_template.py", "")?;
    remote.tag_annotated("1.2.0")?;
    remote.commit_file("plugins/action/README.md", "")?;
    remote.tag("2.0.0.0rc1")?;

    let original = format!(
        "collections:\n  - name: openstack.config_template\n    type: git\n    source: {}#/\n    version: 1.0.0\n",
        remote.url()
    );
    project.write_file("ansible-collection-requirements.yml", &original)?;

    project
        .run(&["bump_collections"])?
        .assert_success()
        .assert_stdout_contains("1 collection(s) updated, 0 failed");

    let text = project.read_file("ansible-collection-requirements.yml")?;
    assert_eq!(text, original.replace("version: 1.0.0", "version: 1.2.0"));
    Ok(())
}

#[test]
fn test_missing_collection_file_fails() -> Result<()> {
    let project = TestProject::new()?;

    project
        .run(&["bump_collections"])?
        .assert_failure()
        .assert_stderr_contains("ansible-collection-requirements.yml");
    Ok(())
}
