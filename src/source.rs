use serde::{Deserialize, Serialize};

/// The relational database tables are extracted from.
/// The `type` field is used as the discriminator via serde's tag attribute.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Postgres {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
        /// Restrict discovery to one schema; all non-system schemas otherwise
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
    },
    Mysql {
        host: String,
        port: u16,
        user: String,
        password: String,
        /// In MySQL the database is the only schema inspected
        database: String,
    },
}

impl Source {
    /// Returns the source type as a string ("postgres" or "mysql")
    pub fn source_type(&self) -> &'static str {
        match self {
            Source::Postgres { .. } => "postgres",
            Source::Mysql { .. } => "mysql",
        }
    }

    pub fn database(&self) -> &str {
        match self {
            Source::Postgres { database, .. } | Source::Mysql { database, .. } => database,
        }
    }

    /// The schema discovery is restricted to, if any.
    pub fn schema_filter(&self) -> Option<&str> {
        match self {
            Source::Postgres { schema, .. } => schema.as_deref(),
            Source::Mysql { database, .. } => Some(database.as_str()),
        }
    }
}

// Hand-written so the password never reaches logs.
impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Postgres {
                host,
                port,
                user,
                database,
                schema,
                ..
            } => f
                .debug_struct("Postgres")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .field("schema", schema)
                .finish_non_exhaustive(),
            Source::Mysql {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("Mysql")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}
