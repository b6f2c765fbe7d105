use std::sync::Arc;

use phoning::models::{TABLE_NAME, Volunteer};
use phoning::orm::{Db, Model};

#[tokio::test]
async fn test_db_basic_crud() {
    use sqlx::FromRow;

    #[derive(Debug, FromRow, PartialEq, Eq)]
    struct Person {
        name: String,
    }

    let db = Db::connect("sqlite::memory:").await.unwrap();
    db.execute("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();
    db.execute("INSERT INTO person (name) VALUES ('Alice')")
        .await
        .unwrap();

    let people: Vec<Person> = db.fetch_all("SELECT name FROM person").await.unwrap();
    let names: Vec<String> = people.into_iter().map(|person| person.name).collect();
    assert_eq!(names, vec!["Alice"]);
}

async fn column_names(db: &Db) -> Vec<String> {
    db.fetch_all::<(String,)>(&format!(
        "SELECT name FROM pragma_table_info('{}')",
        TABLE_NAME
    ))
    .await
    .unwrap()
    .into_iter()
    .map(|(name,)| name)
    .collect()
}

#[tokio::test]
async fn test_migrate_creates_table_once() {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    Volunteer::migrate(db.clone()).await.unwrap();
    Volunteer::migrate(db.clone()).await.unwrap();

    let recorded: Vec<(String,)> = db
        .fetch_all("SELECT table_name FROM __phoning_migrations")
        .await
        .unwrap();
    assert_eq!(recorded, vec![(TABLE_NAME.to_string(),)]);

    let columns = column_names(&db).await;
    for expected in ["id", "email", "disponibilite", "experience", "created_at"] {
        assert!(columns.iter().any(|c| c == expected), "missing {expected}");
    }
}

#[tokio::test]
async fn test_migrate_adds_missing_columns_on_schema_change() {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    db.execute(
        "CREATE TABLE __phoning_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name TEXT UNIQUE NOT NULL,
            schema_sql TEXT NOT NULL,
            hash TEXT NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .await
    .unwrap();
    db.execute(&format!(
        "CREATE TABLE {TABLE_NAME} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            prenom TEXT, nom TEXT, mobile TEXT, email TEXT UNIQUE
        )"
    ))
    .await
    .unwrap();
    db.execute(&format!(
        "INSERT INTO __phoning_migrations (table_name, schema_sql, hash) \
         VALUES ('{TABLE_NAME}', 'old', 'stale')"
    ))
    .await
    .unwrap();

    Volunteer::migrate(db.clone()).await.unwrap();

    let columns = column_names(&db).await;
    for added in ["ville", "code_postal", "disponibilite", "experience", "created_at"] {
        assert!(columns.iter().any(|c| c == added), "missing {added}");
    }
    let hashes: Vec<(String,)> = db
        .fetch_all("SELECT hash FROM __phoning_migrations")
        .await
        .unwrap();
    assert_eq!(hashes.len(), 1);
    assert_ne!(hashes[0].0, "stale");
}
