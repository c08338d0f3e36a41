// Runners Module
// Process execution shared by the provisioner and generator

pub mod shell;

pub use shell::{OutputCallback, ShellConfig, ShellOutput, ShellRunner};
