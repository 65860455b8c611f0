//! Generic-rule scenarios: caching, re-registration, failure handling.

use crate::*;

#[cfg(unix)]
#[tokio::test]
async fn rule_runs_once_then_caches() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "hello")?;
    let (log, input, out) = (space.path("log"), space.path("in"), space.path("out"));

    let maek = space.maek();
    maek.rule(
        &[out.as_str()],
        &[input.as_str()],
        &[sh(&format!("echo ran >> {}; cp {} {}", log, input, out))],
    );

    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.read("out")?, "hello");
    assert_eq!(space.line_count("log"), 1);

    // No filesystem change: the second update skips the recipe.
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 1);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn cache_survives_engine_restart() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "hello")?;
    let (log, input, out) = (space.path("log"), space.path("in"), space.path("out"));
    let recipe = [sh(&format!("echo ran >> {}; cp {} {}", log, input, out))];

    let maek = space.maek();
    maek.rule(&[out.as_str()], &[input.as_str()], &recipe);
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 1);

    // A fresh engine makes the same skip decision from the persisted cache.
    let maek = space.maek();
    maek.rule(&[out.as_str()], &[input.as_str()], &recipe);
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 1);

    // Changing the input invalidates the key.
    space.write("in", "changed")?;
    let maek = space.maek();
    maek.rule(&[out.as_str()], &[input.as_str()], &recipe);
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 2);
    assert_eq!(space.read("out")?, "changed");

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn deleted_output_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "x")?;
    let (log, input, out) = (space.path("log"), space.path("in"), space.path("out"));

    let maek = space.maek();
    maek.rule(
        &[out.as_str()],
        &[input.as_str()],
        &[sh(&format!("echo ran >> {}; cp {} {}", log, input, out))],
    );
    assert!(maek.update(&[out.clone()]).await?);
    std::fs::remove_file(space.path("out"))?;
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 2);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn stale_cache_entries_are_dropped() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "x")?;
    let (input, out) = (space.path("in"), space.path("out"));

    space.write("maek-cache.json", r#"{"long/gone/target": ["stale"]}"#)?;

    let maek = space.maek();
    maek.rule(&[out.as_str()], &[input.as_str()], &[sh(&format!("cp {} {}", input, out))]);
    assert!(maek.update(&[out.clone()]).await?);

    let cache = space.read("maek-cache.json")?;
    assert!(!cache.contains("long/gone/target"));
    assert!(cache.contains(&out));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn later_registration_wins() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.path("out");

    let maek = space.maek();
    maek.rule(&[out.as_str()], &[], &[sh(&format!("echo first > {}", out))]);
    maek.rule(&[out.as_str()], &[], &[sh(&format!("echo second > {}", out))]);
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.read("out")?, "second\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn chained_rules_build_in_order() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "data")?;
    let (input, mid, out) = (space.path("in"), space.path("mid"), space.path("out"));

    let maek = space.maek();
    maek.rule(&[mid.as_str()], &[input.as_str()], &[sh(&format!("cp {} {}", input, mid))]);
    maek.rule(&[out.as_str()], &[mid.as_str()], &[sh(&format!("cp {} {}", mid, out))]);
    assert!(maek.update(&[out.clone()]).await?);
    assert_eq!(space.read("out")?, "data");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failed_command_is_not_cached() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let (log, out) = (space.path("log"), space.path("out"));

    let maek = space.maek();
    maek.rule(
        &[out.as_str()],
        &[],
        &[sh(&format!("echo tried >> {}; exit 1", log))],
    );
    assert!(!maek.update(&[out.clone()]).await?);
    // The second run repeats the attempt; nothing was cached.
    assert!(!maek.update(&[out.clone()]).await?);
    assert_eq!(space.line_count("log"), 2);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn prerequisite_failure_stops_dependents() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let (mid, out) = (space.path("mid"), space.path("out"));

    let maek = space.maek();
    maek.rule(&[mid.as_str()], &[], &[sh("exit 1")]);
    maek.rule(&[out.as_str()], &[mid.as_str()], &[sh(&format!("touch {}", out))]);
    assert!(!maek.update(&[out]).await?);
    assert!(space.read("out").is_err());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn diamond_prerequisite_runs_once() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "x")?;
    let (log, input, base) = (space.path("log"), space.path("in"), space.path("base"));
    let (left, right) = (space.path("left"), space.path("right"));

    let maek = space.maek();
    maek.rule(
        &[base.as_str()],
        &[input.as_str()],
        &[sh(&format!("echo base >> {}; cp {} {}", log, input, base))],
    );
    maek.rule(&[left.as_str()], &[base.as_str()], &[sh(&format!("cp {} {}", base, left))]);
    maek.rule(&[right.as_str()], &[base.as_str()], &[sh(&format!("cp {} {}", base, right))]);

    assert!(maek.update(&[left, right]).await?);
    // Both sides demanded `base`; its recipe ran once.
    assert_eq!(space.line_count("log"), 1);
    Ok(())
}
