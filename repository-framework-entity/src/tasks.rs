use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub author_id: Option<String>,
    pub total_minutes: Option<i32>,
    pub source: Option<String>,
    pub discarded: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::task_steps::Entity")]
    TaskSteps,
}

impl Related<super::task_steps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskSteps.def()
    }
}

impl Related<super::tags::Entity> for Entity {
    fn to() -> RelationDef {
        super::task_tags::Relation::Tags.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::task_tags::Relation::Tasks.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
