//! The rule-authoring surface: generic rules, the compile and link task
//! builders, and the option set they share.

use crate::db;
use crate::jobs;
use crate::platform::Platform;
use crate::task::{Task, TaskKind};
use crate::work::Work;
use anyhow::bail;

/// Build options.  The `Maek` object holds the global defaults; each rule
/// call can override individual fields, which replace (not extend) the
/// global value.
#[derive(Clone, Debug)]
pub struct Options {
    /// Prepended to derived object paths.
    pub obj_prefix: String,
    pub obj_suffix: String,
    pub exe_suffix: String,
    /// Extra prerequisites for compile tasks.
    pub depends: Vec<String>,
    /// Extra compiler flags.
    pub cpp_flags: Vec<String>,
    /// Extra linker flags.
    pub link_libs: Vec<String>,
}

impl Options {
    pub fn platform_defaults(platform: &Platform) -> Self {
        Options {
            obj_prefix: "objs/".to_string(),
            obj_suffix: platform.obj_suffix.to_string(),
            exe_suffix: platform.exe_suffix.to_string(),
            depends: Vec::new(),
            cpp_flags: Vec::new(),
            link_libs: Vec::new(),
        }
    }

    fn merge(&self, over: &Overrides) -> Options {
        Options {
            obj_prefix: over.obj_prefix.clone().unwrap_or_else(|| self.obj_prefix.clone()),
            obj_suffix: over.obj_suffix.clone().unwrap_or_else(|| self.obj_suffix.clone()),
            exe_suffix: over.exe_suffix.clone().unwrap_or_else(|| self.exe_suffix.clone()),
            depends: over.depends.clone().unwrap_or_else(|| self.depends.clone()),
            cpp_flags: over.cpp_flags.clone().unwrap_or_else(|| self.cpp_flags.clone()),
            link_libs: over.link_libs.clone().unwrap_or_else(|| self.link_libs.clone()),
        }
    }
}

/// Per-call option overrides; `None` fields fall back to the globals.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub obj_prefix: Option<String>,
    pub obj_suffix: Option<String>,
    pub exe_suffix: Option<String>,
    pub depends: Option<Vec<String>>,
    pub cpp_flags: Option<Vec<String>>,
    pub link_libs: Option<Vec<String>>,
}

/// The build description under construction plus the engine that runs it.
pub struct Maek {
    pub options: Options,
    pub platform: Platform,
    work: Work,
}

impl Maek {
    pub fn new() -> anyhow::Result<Maek> {
        let platform = Platform::host()?;
        let options = Options::platform_defaults(&platform);
        Ok(Maek {
            options,
            platform,
            work: Work::new(jobs::default_jobs(), db::DEFAULT_PATH),
        })
    }

    /// As `new`, with an explicit cache-file path.
    pub fn with_cache_path(cache_path: &str) -> anyhow::Result<Maek> {
        let platform = Platform::host()?;
        let options = Options::platform_defaults(&platform);
        Ok(Maek {
            options,
            platform,
            work: Work::new(jobs::default_jobs(), cache_path),
        })
    }

    /// Registers a generic task: bring `prereqs` up to date, then run each
    /// recipe command in order.
    pub fn rule(&self, targets: &[&str], prereqs: &[&str], recipe: &[Vec<String>]) {
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        let label = targets.join(", ");
        self.work.register(Task::new(
            targets,
            prereqs.iter().map(|t| t.to_string()).collect(),
            label,
            TaskKind::Recipe {
                recipe: recipe.to_vec(),
            },
        ));
    }

    /// Registers a compile task for one translation unit and returns the
    /// derived object path.
    pub fn cpp(
        &self,
        source: &str,
        object_base: Option<&str>,
        over: Overrides,
    ) -> anyhow::Result<String> {
        if self.platform.compiler.is_empty() {
            bail!("no c++ toolchain is configured for this platform");
        }
        let opts = self.options.merge(&over);

        let base = match object_base {
            Some(base) => base.to_string(),
            None => format!("{}{}", opts.obj_prefix, strip_extension(source)),
        };
        let object = format!("{}{}", base, opts.obj_suffix);
        let dep_info = format!("{}.d", base);

        let mut compile_command = self.platform.compiler.clone();
        compile_command.extend(opts.cpp_flags.iter().cloned());
        compile_command.extend(["-c", "-o", object.as_str(), source].map(String::from));

        let mut probe_command = self.platform.compiler.clone();
        probe_command.extend(opts.cpp_flags.iter().cloned());
        probe_command
            .extend(["-E", "-M", "-MG", "-MT", "x ", "-MF", dep_info.as_str(), source].map(String::from));

        let mut prereqs = vec![source.to_string()];
        prereqs.extend(opts.depends.iter().cloned());

        self.work.register(Task::new(
            vec![object.clone(), dep_info.clone()],
            prereqs,
            format!("CPP {}", object),
            TaskKind::Compile {
                object: object.clone(),
                dep_info,
                compile_command,
                probe_command,
            },
        ));
        Ok(object)
    }

    /// Registers a link task and returns the derived executable path.
    pub fn link(
        &self,
        objects: &[String],
        exe_base: &str,
        over: Overrides,
    ) -> anyhow::Result<String> {
        if self.platform.linker.is_empty() {
            bail!("no c++ toolchain is configured for this platform");
        }
        let opts = self.options.merge(&over);
        let exe = format!("{}{}", exe_base, opts.exe_suffix);

        let mut link_command = self.platform.linker.clone();
        link_command.extend(["-o", exe.as_str()].map(String::from));
        link_command.extend(objects.iter().cloned());
        link_command.extend(opts.link_libs.iter().cloned());

        self.work.register(Task::new(
            vec![exe.clone()],
            objects.to_vec(),
            format!("LINK {}", exe),
            TaskKind::Link {
                exe: exe.clone(),
                link_command,
            },
        ));
        Ok(exe)
    }

    /// Brings the given targets up to date.  Returns false when the build
    /// failed (already reported); internal errors propagate.
    pub async fn update(&self, targets: &[String]) -> anyhow::Result<bool> {
        self.work.update(targets).await
    }
}

/// `objs/` + source path minus its extension is the default object base.
fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}
