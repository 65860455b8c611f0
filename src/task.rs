//! Task records: the unit of work behind one or more targets.

use crate::error::UpdateResult;
use futures::future::{LocalBoxFuture, Shared};
use serde_json::Value;
use std::cell::RefCell;

/// Abstract targets name phases (`:test`, `:dist`) with no on-disk
/// artifact; everything else is a POSIX-style file path.
pub fn is_abstract(target: &str) -> bool {
    target.starts_with(':')
}

/// A cache key: a JSON array summarizing every input that can change a
/// task's outputs.  Compared across runs in canonical string form.
pub type Key = Value;

/// Canonical serialization used for cache-hit comparison.
pub fn canon(key: &Key) -> String {
    key.to_string()
}

/// Handle to a task's in-flight update.  Every requester of any of the
/// task's targets awaits the same one, so the body runs at most once per
/// driver invocation.
pub type Pending = Shared<LocalBoxFuture<'static, UpdateResult<()>>>;

pub struct Task {
    /// Non-empty; this task claims to produce each of these.
    pub targets: Vec<String>,
    /// Targets that must be up to date before the body runs.
    pub prereqs: Vec<String>,
    /// Human-readable identifier for diagnostics.
    pub label: String,
    pub kind: TaskKind,
    /// Key from the end of the previous successful run, if any.
    pub cached_key: RefCell<Option<Key>>,
    pub pending: RefCell<Option<Pending>>,
    /// First requester this run, for diagnostics.
    pub requested_by: RefCell<Option<String>>,
}

pub enum TaskKind {
    /// An explicit command list over explicit prerequisites.
    Recipe { recipe: Vec<Vec<String>> },
    /// One translation unit to one object, discovering headers through the
    /// dependency-probe command.
    Compile {
        object: String,
        dep_info: String,
        compile_command: Vec<String>,
        probe_command: Vec<String>,
    },
    /// Objects into an executable.
    Link {
        exe: String,
        link_command: Vec<String>,
    },
}

impl Task {
    pub fn new(targets: Vec<String>, prereqs: Vec<String>, label: String, kind: TaskKind) -> Self {
        assert!(!targets.is_empty(), "task {} has no targets", label);
        Task {
            targets,
            prereqs,
            label,
            kind,
            cached_key: RefCell::new(None),
            pending: RefCell::new(None),
            requested_by: RefCell::new(None),
        }
    }

    /// A task producing any abstract target has no key function: it runs on
    /// every update.
    pub fn cacheable(&self) -> bool {
        !self.targets.iter().any(|t| is_abstract(t))
    }
}
