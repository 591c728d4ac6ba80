//! bakery-lib: resolution and execution of templated multi-target image builds.
//!
//! This crate turns a declarative configuration tree into an ordered set of
//! concrete build jobs and runs them:
//! - `vars`: variable environment with overrides and deferred defaults
//! - `tags`: deterministic image tags
//! - `config`: the configuration tree and its loaders
//! - `resolve`: inheritance, matrix expansion, context graph and selection
//! - `schedule`: dependency batches
//! - `execute`: the runner and the build invoker seam

pub mod config;
pub mod execute;
pub mod resolve;
pub mod schedule;
pub mod tags;
pub mod template;
pub mod vars;

pub use config::{BakeConfig, ConfigError, load_config};
pub use execute::{BuildInvoker, ExecuteConfig, RunReport, RunStatus, execute_plan};
pub use resolve::{BuildPlan, ResolveError, ResolveOptions, resolve};
