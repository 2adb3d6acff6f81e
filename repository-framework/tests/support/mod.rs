#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use migration::{Migrator, MigratorTrait};
use repository_framework::{
    ColumnSchema, ColumnType, DataMapper, DomainEntity, FilterColumnMapper, FilterMap,
    FilterValue, GenericRepository, JoinEdge, ModelSchema, OnClause, RepositoryError, RowImage,
    RepositoryConfig, SortPrecedence, TagFilterConfig,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, FromQueryResult, QueryResult};

pub static TASKS: ModelSchema = ModelSchema::new(
    "tasks",
    &[
        ColumnSchema::new("id", ColumnType::Text),
        ColumnSchema::new("name", ColumnType::Text),
        ColumnSchema::new("author_id", ColumnType::Text),
        ColumnSchema::new("total_minutes", ColumnType::Integer),
        ColumnSchema::new("source", ColumnType::Text),
        ColumnSchema::new("discarded", ColumnType::Boolean),
        ColumnSchema::new("created_at", ColumnType::DateTime),
        ColumnSchema::new("updated_at", ColumnType::DateTime),
    ],
);

pub static TASK_STEPS: ModelSchema = ModelSchema::new(
    "task_steps",
    &[
        ColumnSchema::new("id", ColumnType::Text),
        ColumnSchema::new("task_id", ColumnType::Text),
        ColumnSchema::new("name", ColumnType::Text),
        ColumnSchema::new("position", ColumnType::Integer),
    ],
);

pub static TAGS: ModelSchema = ModelSchema::new(
    "tags",
    &[
        ColumnSchema::new("id", ColumnType::Text),
        ColumnSchema::new("key", ColumnType::Text),
        ColumnSchema::new("value", ColumnType::Text),
        ColumnSchema::new("author_id", ColumnType::Text),
        ColumnSchema::new("tag_type", ColumnType::Text),
    ],
);

pub static TASK_TAGS: ModelSchema = ModelSchema::new(
    "task_tags",
    &[
        ColumnSchema::new("task_id", ColumnType::Text),
        ColumnSchema::new("tag_id", ColumnType::Text),
    ],
);

pub static TASK_REVISIONS: ModelSchema = ModelSchema::new(
    "task_revisions",
    &[
        ColumnSchema::new("id", ColumnType::Text),
        ColumnSchema::new("rev", ColumnType::Integer),
        ColumnSchema::new("name", ColumnType::Text),
    ],
);

pub static TASK_MAPPERS: &[FilterColumnMapper] = &[
    FilterColumnMapper::new(
        &TASKS,
        &[
            ("id", "id"),
            ("name", "name"),
            ("author_id", "author_id"),
            ("total_minutes", "total_minutes"),
            ("source", "source"),
        ],
    ),
    FilterColumnMapper::with_joins(
        &TASK_STEPS,
        &[("step_name", "name")],
        &[JoinEdge::inner(
            &TASK_STEPS,
            OnClause::new("task_steps", "task_id", "tasks", "id"),
        )],
    ),
];

pub const SOURCE_SORT_ORDER: &[&str] = &["manual", "tbca", "taco", "private", "gs1", "auto"];

pub const TASK_TAG_FILTER: TagFilterConfig =
    TagFilterConfig::new(&TAGS, &TASK_TAGS, "task_id", "tag_id", "task");

pub static TASK_CONFIG: RepositoryConfig = RepositoryConfig::new(&TASKS, TASK_MAPPERS)
    .with_tags(TASK_TAG_FILTER)
    .with_sort_precedence(SortPrecedence::new("source", SOURCE_SORT_ORDER));

pub static REVISION_MAPPERS: &[FilterColumnMapper] = &[FilterColumnMapper::new(
    &TASK_REVISIONS,
    &[("id", "id"), ("rev", "rev"), ("name", "name")],
)];

pub static REVISION_CONFIG: RepositoryConfig =
    RepositoryConfig::new(&TASK_REVISIONS, REVISION_MAPPERS);

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStep {
    pub id: String,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskTag {
    pub id: String,
    pub key: String,
    pub value: String,
    pub author_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub author_id: Option<String>,
    pub total_minutes: Option<i32>,
    pub source: Option<String>,
    pub discarded: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub steps: Vec<TaskStep>,
    pub tags: Vec<TaskTag>,
}

impl DomainEntity for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn discarded(&self) -> bool {
        self.discarded
    }
}

pub struct TaskMapper;

#[async_trait]
impl DataMapper for TaskMapper {
    type Domain = Task;

    async fn domain_to_rows<C>(
        &self,
        _db: &C,
        domain: &Task,
    ) -> Result<Vec<RowImage>, RepositoryError>
    where
        C: ConnectionTrait,
    {
        let mut rows = vec![RowImage::new("tasks", &["id"])
            .set("id", domain.id.clone())
            .set("name", domain.name.clone())
            .set("author_id", domain.author_id.clone())
            .set("total_minutes", domain.total_minutes)
            .set("source", domain.source.clone())
            .set("discarded", domain.discarded)
            .set("created_at", domain.created_at)
            .set("updated_at", domain.updated_at)];
        for step in &domain.steps {
            rows.push(
                RowImage::new("task_steps", &["id"])
                    .set("id", step.id.clone())
                    .set("task_id", domain.id.clone())
                    .set("name", step.name.clone())
                    .set("position", step.position),
            );
        }
        for tag in &domain.tags {
            rows.push(
                RowImage::new("tags", &["id"])
                    .set("id", tag.id.clone())
                    .set("key", tag.key.clone())
                    .set("value", tag.value.clone())
                    .set("author_id", tag.author_id.clone())
                    .set("tag_type", "task"),
            );
            rows.push(
                RowImage::new("task_tags", &["task_id", "tag_id"])
                    .set("task_id", domain.id.clone())
                    .set("tag_id", tag.id.clone()),
            );
        }
        Ok(rows)
    }

    fn row_to_domain(&self, row: &QueryResult) -> Result<Task, RepositoryError> {
        let model = entity::tasks::Model::from_query_result(row, "")?;
        Ok(Task {
            id: model.id,
            name: model.name,
            author_id: model.author_id,
            total_minutes: model.total_minutes,
            source: model.source,
            discarded: model.discarded,
            created_at: model.created_at,
            updated_at: model.updated_at,
            steps: Vec::new(),
            tags: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub id: String,
    pub rev: i32,
    pub name: String,
}

impl DomainEntity for Revision {
    fn id(&self) -> &str {
        &self.id
    }

    fn discarded(&self) -> bool {
        false
    }
}

pub struct RevisionMapper;

#[async_trait]
impl DataMapper for RevisionMapper {
    type Domain = Revision;

    async fn domain_to_rows<C>(
        &self,
        _db: &C,
        domain: &Revision,
    ) -> Result<Vec<RowImage>, RepositoryError>
    where
        C: ConnectionTrait,
    {
        Ok(vec![RowImage::new("task_revisions", &["id", "rev"])
            .set("id", domain.id.clone())
            .set("rev", domain.rev)
            .set("name", domain.name.clone())])
    }

    fn row_to_domain(&self, row: &QueryResult) -> Result<Revision, RepositoryError> {
        Ok(Revision {
            id: row.try_get("", "id")?,
            rev: row.try_get("", "rev")?,
            name: row.try_get("", "name")?,
        })
    }
}

pub type TaskRepo<'db> = GenericRepository<'db, DatabaseConnection, TaskMapper>;
pub type RevisionRepo<'db> = GenericRepository<'db, DatabaseConnection, RevisionMapper>;

/// Fresh in-memory database with the example schema applied.
pub async fn init_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options)
        .await
        .expect("failed to open the in-memory test database");
    Migrator::up(&db, None).await.expect("migrations failed");
    db
}

pub fn task_repo(db: &DatabaseConnection) -> TaskRepo<'_> {
    GenericRepository::new(db, TaskMapper, &TASK_CONFIG)
}

pub fn revision_repo(db: &DatabaseConnection) -> RevisionRepo<'_> {
    GenericRepository::new(db, RevisionMapper, &REVISION_CONFIG)
}

pub fn dt(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").expect("bad test timestamp")
}

pub fn task(id: &str, name: &str) -> Task {
    Task {
        id: id.to_owned(),
        name: name.to_owned(),
        author_id: Some("author-1".to_owned()),
        total_minutes: None,
        source: None,
        discarded: false,
        created_at: dt("2024-03-01 10:00:00"),
        updated_at: dt("2024-03-01 10:00:00"),
        steps: Vec::new(),
        tags: Vec::new(),
    }
}

pub fn step(id: &str, name: &str, position: i32) -> TaskStep {
    TaskStep {
        id: id.to_owned(),
        name: name.to_owned(),
        position,
    }
}

pub fn tag(id: &str, key: &str, value: &str, author_id: &str) -> TaskTag {
    TaskTag {
        id: id.to_owned(),
        key: key.to_owned(),
        value: value.to_owned(),
        author_id: author_id.to_owned(),
    }
}

pub fn filters<const N: usize>(pairs: [(&str, FilterValue); N]) -> FilterMap {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}
