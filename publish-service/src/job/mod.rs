pub mod models;
pub mod parser;

pub use models::{
    CommitIdentity, CronEntry, GenerateConfig, JobDefinition, ProvisionConfig, PublishConfig,
    RuntimeRequirement,
};
pub use parser::JobParser;
