//! The sample build description: a small C++ game built into `dist/game`,
//! with a test runner under `:test`.

use maek::{Maek, Overrides};

#[derive(argh::FromArgs)]
/// maek, a small content-addressed parallel build engine
struct Opts {
    /// targets to bring up to date [default=:dist]
    #[argh(positional)]
    targets: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts: Opts = argh::from_env();

    let maek = Maek::new()?;

    let player = maek.cpp("Player.cpp", None, Overrides::default())?;
    let level = maek.cpp("Level.cpp", None, Overrides::default())?;
    let game = maek.cpp("game.cpp", None, Overrides::default())?;
    let test = maek.cpp("test.cpp", None, Overrides::default())?;

    let game_exe = maek.link(
        &[game, player.clone(), level.clone()],
        "dist/game",
        Overrides::default(),
    )?;
    let test_exe = maek.link(&[test, player, level], "test/game-test", Overrides::default())?;

    maek.rule(&[":test"], &[test_exe.as_str()], &[vec![test_exe.clone()]]);
    maek.rule(&[":dist"], &[game_exe.as_str()], &[]);

    let targets = if opts.targets.is_empty() {
        vec![":dist".to_string()]
    } else {
        opts.targets
    };
    if !maek.update(&targets).await? {
        std::process::exit(1);
    }
    Ok(())
}
