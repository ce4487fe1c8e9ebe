pub mod completions;
pub mod info;
pub mod install;
pub mod update;
