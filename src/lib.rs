//! maek is a small, hackable, content-addressed parallel build engine.
//!
//! A build description registers tasks; each task produces one or more
//! targets (file paths, or `:`-prefixed abstract phases) from prerequisites
//! by running a recipe of external commands.  The engine resolves the
//! dependency graph on demand, runs independent tasks concurrently up to a
//! job cap, and skips tasks whose content-hashed inputs and outputs are
//! unchanged since the last successful run.

pub mod db;
pub mod depfile;
pub mod error;
pub mod hash;
pub mod jobs;
pub mod platform;
pub mod process;
pub mod rules;
pub mod task;
pub mod work;

pub use error::BuildError;
pub use rules::{Maek, Options, Overrides};
