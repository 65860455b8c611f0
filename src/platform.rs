//! Platform adapter: artifact suffixes and toolchain command bases.

use anyhow::bail;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Os {
    Linux,
    Macos,
    Windows,
}

/// Host-specific build conventions.  The command bases are plain data so a
/// caller (or a test) can substitute its own toolchain.
#[derive(Clone, Debug)]
pub struct Platform {
    pub os: Os,
    pub obj_suffix: &'static str,
    pub exe_suffix: &'static str,
    /// Base compiler invocation; compile and dependency-probe commands
    /// extend it.  Empty when the platform has no configured toolchain.
    pub compiler: Vec<String>,
    /// Base linker invocation.
    pub linker: Vec<String>,
}

fn command(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

impl Platform {
    /// Detects the host platform.  Fatal on anything the suffix table
    /// doesn't cover.
    pub fn host() -> anyhow::Result<Platform> {
        Platform::for_os(std::env::consts::OS)
    }

    fn for_os(os: &str) -> anyhow::Result<Platform> {
        match os {
            "linux" => Ok(Platform {
                os: Os::Linux,
                obj_suffix: ".o",
                exe_suffix: "",
                compiler: command(&["g++", "-std=c++20", "-Wall", "-Werror", "-g"]),
                linker: command(&["g++", "-std=c++20", "-Wall", "-Werror", "-g"]),
            }),
            "macos" => Ok(Platform {
                os: Os::Macos,
                obj_suffix: ".o",
                exe_suffix: "",
                compiler: command(&["clang++", "-std=c++20", "-Wall", "-Werror", "-g"]),
                linker: command(&["clang++", "-std=c++20", "-Wall", "-Werror", "-g"]),
            }),
            // The suffix table covers windows; the toolchain does not, yet.
            "windows" => Ok(Platform {
                os: Os::Windows,
                obj_suffix: ".obj",
                exe_suffix: ".exe",
                compiler: Vec::new(),
                linker: Vec::new(),
            }),
            os => bail!("unsupported platform {:?}", os),
        }
    }
}
