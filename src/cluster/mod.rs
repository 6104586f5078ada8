//! Cluster lifecycle: launch node processes, wait for the cloud to form,
//! tear it down.

mod handle;
mod launcher;
mod startup;
pub use handle::*;
pub use launcher::*;
pub use startup::*;

#[cfg(test)]
mod launcher_test;
