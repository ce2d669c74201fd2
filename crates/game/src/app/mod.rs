mod audio;
mod bootstrap;
mod loop_runner;
mod roster;
mod save;
mod scenario;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
