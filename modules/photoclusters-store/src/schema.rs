// Table definitions and the confirmation gate for destructive maintenance.

/// Phrase an operator must type to drop and recreate a table.
pub const CONFIRMATION_PHRASE: &str = "Delete";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Submissions,
    Photos,
    Clusters,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Submissions, Table::Photos, Table::Clusters];

    pub fn name(self) -> &'static str {
        match self {
            Table::Submissions => "submissions",
            Table::Photos => "photos",
            Table::Clusters => "clusters",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn create_statement(self) -> &'static str {
        match self {
            Table::Submissions => {
                r#"
                CREATE TABLE IF NOT EXISTS submissions (
                    ID          TEXT PRIMARY KEY,
                    Title       TEXT,
                    URL         TEXT,
                    URLDomain   TEXT,
                    Subreddit   TEXT,
                    SubredditID TEXT,
                    PostURL     TEXT,
                    PostTime    BIGINT,
                    PostAuthor  TEXT,
                    PostScore   INTEGER
                )
                "#
            }
            Table::Photos => {
                r#"
                CREATE TABLE IF NOT EXISTS photos (
                    id        TEXT PRIMARY KEY,
                    filename  TEXT,
                    subreddit TEXT,
                    size      INTEGER,
                    path      TEXT
                )
                "#
            }
            Table::Clusters => {
                r#"
                CREATE TABLE IF NOT EXISTS clusters (
                    file          TEXT PRIMARY KEY,
                    subreddit     TEXT,
                    picture_array BLOB,
                    bandwidth     REAL,
                    labels        BLOB,
                    clusters      BLOB,
                    weights       BLOB
                )
                "#
            }
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Proof that an operator confirmed a destructive operation.
/// Only obtainable from the exact confirmation phrase.
#[derive(Debug)]
pub struct Confirmation(());

impl Confirmation {
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        (phrase == CONFIRMATION_PHRASE).then_some(Confirmation(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_requires_exact_phrase() {
        assert!(Confirmation::from_phrase("Delete").is_some());
        assert!(Confirmation::from_phrase("delete").is_none());
        assert!(Confirmation::from_phrase(" Delete").is_none());
        assert!(Confirmation::from_phrase("").is_none());
    }

    #[test]
    fn table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.name()), Some(table));
            assert!(table.create_statement().contains(table.name()));
        }
        assert_eq!(Table::from_name("comments"), None);
    }
}
