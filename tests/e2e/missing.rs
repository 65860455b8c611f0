//! Behavior around missing files and taskless targets.

use crate::*;

#[tokio::test]
async fn missing_file_target_fails_but_cache_is_written() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.path("out");
    let missing = space.path("gone.cpp");

    let maek = space.maek();
    maek.rule(&[out.as_str()], &[missing.as_str()], &[]);
    assert!(!maek.update(&[out]).await?);

    // The cache file is rewritten even on the failure path.
    assert!(space.read("maek-cache.json").is_ok());
    Ok(())
}

#[tokio::test]
async fn abstract_target_without_task_fails() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let maek = space.maek();
    assert!(!maek.update(&[":nothing".to_string()]).await?);
    Ok(())
}

#[tokio::test]
async fn existing_file_without_task_is_fine() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("README", "docs")?;
    let maek = space.maek();
    assert!(maek.update(&[space.path("README")]).await?);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn missing_cache_file_is_a_cold_start() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "x")?;
    let (input, out) = (space.path("in"), space.path("out"));

    let maek = space.maek();
    maek.rule(
        &[out.as_str()],
        &[input.as_str()],
        &[sh(&format!("cp {} {}", input, out))],
    );
    assert!(maek.update(&[out]).await?);
    assert_eq!(space.read("out")?, "x");
    Ok(())
}
