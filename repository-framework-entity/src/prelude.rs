pub use super::{
    tags::Entity as Tags, task_revisions::Entity as TaskRevisions,
    task_steps::Entity as TaskSteps, task_tags::Entity as TaskTags, tasks::Entity as Tasks,
};
