mod common;

use chrono::NaiveDateTime;
use common::{FakeConnection, rows};
use plainq::{
    ColumnDesc, Db, DbConfig, DbError, MappingErrorKind, Model, SqlType, ToValue, Value, params,
    query, query_with, with_mapping_check,
};
use std::pin::pin;
use std::task::{Context, Waker};

#[derive(Debug, Clone, PartialEq, Model)]
#[orm(rename_all = "PascalCase")]
struct Post {
    post_id: i32,
    text: Option<String>,
    creation_date: NaiveDateTime,
}

#[derive(Debug, Model)]
struct Tag {
    #[orm(column = "TagId")]
    id: i32,
    #[orm(column = "Name")]
    name: String,
}

#[derive(Debug, plainq::FromRow)]
struct Empty {}

#[derive(Debug, plainq::FromRow)]
struct PostId {
    #[orm(column = "PostId")]
    id: i64,
}

#[derive(Debug, plainq::FromRow)]
struct Person {
    #[orm(column = "PersonId")]
    person_id: i32,
    #[orm(column = "FirstName")]
    first_name: String,
}

fn post_columns() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::new("PostId", SqlType::Int).key().auto_increment(),
        ColumnDesc::new("Text", SqlType::String).nullable(),
        ColumnDesc::new("CreationDate", SqlType::DateTime),
    ]
}

fn tag_columns() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::new("TagId", SqlType::Int).key(),
        ColumnDesc::new("Name", SqlType::String),
    ]
}

fn created() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .unwrap()
        .naive_utc()
}

fn sample_post() -> Post {
    Post {
        post_id: 0,
        text: Some("hello".into()),
        creation_date: created(),
    }
}

fn mapping_kind(err: &DbError) -> MappingErrorKind {
    err.as_mapping()
        .unwrap_or_else(|| panic!("expected a mapping error, got {err}"))
        .kind()
}

#[tokio::test]
async fn insert_returning_key_sql_server() {
    let conn = FakeConnection::sql_server("insert_returning_key_sql_server")
        .table("Posts", post_columns())
        .returning(rows(&["PostId"], vec![vec![Value::Int(42)]]));
    let mut db = Db::new(conn).unwrap();

    let id: i32 = db.insert_returning_key::<i32, _>(&sample_post()).await.unwrap();
    assert_eq!(id, 42);

    let conn = db.connection();
    assert_eq!(
        conn.statements,
        vec![(
            "INSERT INTO Posts ([Text], [CreationDate]) OUTPUT inserted.[PostId] VALUES (@P1, @P2)"
                .to_string(),
            vec![Value::String("hello".into()), Value::DateTime(created())],
        )]
    );
    assert_eq!((conn.opens, conn.closes, conn.open), (1, 1, false));
}

#[tokio::test]
async fn insert_returning_key_postgres() {
    let conn = FakeConnection::postgres("insert_returning_key_postgres")
        .table("Posts", post_columns())
        .returning(rows(&["PostId"], vec![vec![Value::Int(7)]]));
    let mut db = Db::new(conn).unwrap();

    let id: i32 = db.insert_returning_key::<i32, _>(&sample_post()).await.unwrap();
    assert_eq!(id, 7);
    assert_eq!(
        db.connection().statements[0].0,
        "INSERT INTO Posts (\"Text\", \"CreationDate\") VALUES ($1, $2) RETURNING \"PostId\""
    );
}

#[tokio::test]
async fn update_delete_and_get_by_key() {
    let conn = FakeConnection::sql_server("update_delete_and_get_by_key")
        .table("Posts", post_columns())
        .returning(rows(
            &["PostId", "Text", "CreationDate"],
            vec![vec![
                Value::Int(3),
                Value::Null(SqlType::String),
                Value::DateTime(created()),
            ]],
        ));
    let mut db = Db::new(conn).unwrap();

    let post: Post = db.get_by_key::<Post>(params! { "PostId" => 3 }).await.unwrap();
    assert_eq!(post.post_id, 3);
    assert_eq!(post.text, None);

    let changed = Post {
        text: Some("edited".into()),
        ..post
    };
    assert_eq!(db.update(&changed).await.unwrap(), 1);
    assert_eq!(db.delete::<Post>(params! { "PostId" => 3 }).await.unwrap(), 1);

    let statements: Vec<&str> = db
        .connection()
        .statements
        .iter()
        .map(|(sql, _)| sql.as_str())
        .collect();
    assert_eq!(
        statements,
        vec![
            "SELECT [PostId], [Text], [CreationDate] FROM Posts WHERE [PostId]=@P1",
            "UPDATE Posts SET [Text]=@P1, [CreationDate]=@P2 WHERE [PostId]=@P3",
            "DELETE FROM Posts WHERE [PostId]=@P1",
        ]
    );
    assert_eq!(
        db.connection().statements[1].1,
        vec![
            Value::String("edited".into()),
            Value::DateTime(created()),
            Value::Int(3)
        ]
    );
}

#[tokio::test]
async fn get_by_key_without_row_is_not_found() {
    let conn = FakeConnection::sql_server("get_by_key_without_row_is_not_found")
        .table("Posts", post_columns());
    let mut db = Db::new(conn).unwrap();

    let err = db.get_by_key::<Post>(params! { "PostId" => 1 }).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)), "{err}");
}

#[tokio::test]
async fn table_without_identity_or_key() {
    let conn = FakeConnection::sql_server("table_without_identity_or_key").table(
        "Tags",
        vec![
            ColumnDesc::new("TagId", SqlType::Int),
            ColumnDesc::new("Name", SqlType::String),
        ],
    );
    let mut db = Db::new(conn).unwrap();
    let tag = Tag {
        id: 1,
        name: "rust".into(),
    };

    let err = db.insert_returning_key::<i32, _>(&tag).await.unwrap_err();
    assert!(matches!(err, DbError::AutoIncrementNotFound { .. }), "{err}");
    let err = db.update(&tag).await.unwrap_err();
    assert!(matches!(err, DbError::NoKeyColumns { .. }), "{err}");

    // Plain inserts need neither.
    assert_eq!(db.insert(&tag).await.unwrap(), 1);
    assert_eq!(
        db.connection().statements[0].0,
        "INSERT INTO Tags ([TagId], [Name]) VALUES (@P1, @P2)"
    );
}

#[tokio::test]
async fn dropped_operation_is_closed_by_the_next_one() {
    let mut conn = FakeConnection::sql_server("dropped_operation_is_closed_by_the_next_one")
        .table("Posts", post_columns());
    conn.stall_statements = true;
    let mut db = Db::new(conn).unwrap();

    {
        let post = sample_post();
        let insert = pin!(db.insert(&post));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(insert.poll(&mut cx).is_pending());
    }
    let conn = db.connection();
    assert_eq!((conn.opens, conn.closes, conn.open), (1, 0, true));

    db.connection_mut().stall_statements = false;
    assert_eq!(db.insert(&sample_post()).await.unwrap(), 1);
    let conn = db.connection();
    assert_eq!((conn.opens, conn.closes, conn.open), (2, 2, false));
}

#[tokio::test]
async fn table_columns_are_probed_once() {
    let conn = FakeConnection::sql_server("table_columns_are_probed_once")
        .table("Posts", post_columns())
        .table("Tags", tag_columns());
    let mut db = Db::new(conn).unwrap();

    let first = db.columns::<Post>().await.unwrap();
    let second = db.columns::<Post>().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(db.connection().probes, vec!["SELECT * FROM Posts"]);

    db.columns::<Tag>().await.unwrap();
    assert_eq!(
        db.connection().probes,
        vec!["SELECT * FROM Posts", "SELECT * FROM Tags"]
    );
}

#[tokio::test]
async fn failed_probes_are_not_cached() {
    let conn = FakeConnection::sql_server("failed_probes_are_not_cached");
    let mut db = Db::new(conn).unwrap();

    assert!(db.columns::<Post>().await.is_err());
    db.connection_mut()
        .tables
        .insert("Posts".to_string(), post_columns());
    assert_eq!(db.columns::<Post>().await.unwrap().len(), 3);
    assert_eq!(db.connection().probes.len(), 2);
}

#[tokio::test]
async fn connection_is_closed_again_on_error() {
    let mut conn = FakeConnection::sql_server("connection_is_closed_again_on_error")
        .table("Posts", post_columns());
    conn.fail_statements = true;
    let mut db = Db::new(conn).unwrap();

    let err = db.insert(&sample_post()).await.unwrap_err();
    assert_eq!(err.to_string(), "connection reset");
    let conn = db.connection();
    assert_eq!((conn.opens, conn.closes, conn.open), (1, 1, false));
}

#[tokio::test]
async fn open_connection_stays_open() {
    let mut conn =
        FakeConnection::sql_server("open_connection_stays_open").table("Posts", post_columns());
    conn.open = true;
    let mut db = Db::new(conn).unwrap();

    db.insert(&sample_post()).await.unwrap();
    let conn = db.connection();
    assert_eq!((conn.opens, conn.closes, conn.open), (0, 0, true));
}

#[tokio::test]
async fn unknown_driver_fails_fast() {
    let conn = FakeConnection::with_driver("sqlite", "unknown_driver_fails_fast");
    let err = Db::new(conn).unwrap_err();
    assert!(matches!(err, DbError::UnknownConnectionType(ref d) if d == "sqlite"));
    assert_eq!(err.to_string(), "Unknown connection type 'sqlite'");
}

#[tokio::test]
async fn mapping_check_off_skips_probes() {
    let conn = FakeConnection::sql_server("mapping_check_off_skips_probes")
        .result_schema(vec![ColumnDesc::new("PostId", SqlType::Int)])
        .returning(rows(&["PostId"], vec![vec![Value::Int(1)]]));
    let mut db = Db::new(conn).unwrap();

    let ids: Vec<PostId> = query("SELECT PostId FROM Posts").to_list(&mut db).await.unwrap();
    assert_eq!(ids[0].id, 1);
    assert!(db.connection().probes.is_empty());
}

#[tokio::test]
async fn zero_field_destination_reports_count() {
    let conn = FakeConnection::sql_server("zero_field_destination_reports_count").result_schema(
        vec![
            ColumnDesc::new("PostId", SqlType::Int),
            ColumnDesc::new("Text", SqlType::String).nullable(),
            ColumnDesc::new("CreationDate", SqlType::DateTime),
        ],
    );
    let mut db = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();

    let err = query("SELECT PostId, Text, CreationDate FROM Posts")
        .to_list::<Empty, _>(&mut db)
        .await
        .unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::FieldCount);
    let skeleton = err.as_mapping().unwrap().skeleton();
    assert_eq!(
        skeleton,
        "    pub PostId: i32,\n    pub Text: Option<String>,\n    pub CreationDate: NaiveDateTime,"
    );
    assert!(err.to_string().contains("Destination type has 0 fields and query has 3 fields"));
    // Validation runs before the statement.
    assert!(db.connection().statements.is_empty());
}

#[tokio::test]
async fn type_mismatch_names_both_types() {
    let conn = FakeConnection::sql_server("type_mismatch_names_both_types")
        .result_schema(vec![ColumnDesc::new("PostId", SqlType::Int)]);
    let mut db = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();

    let err = query("SELECT PostId FROM Posts")
        .to_list::<PostId, _>(&mut db)
        .await
        .unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::TypeMismatch);
    let message = err.to_string();
    assert!(message.contains("'i64'"), "{message}");
    assert!(message.contains("`i32`"), "{message}");
    assert!(message.contains("crud::PostId"), "{message}");
    assert!(message.contains("    pub PostId: i32,"), "{message}");
}

#[tokio::test]
async fn nullability_check_depends_on_dialect() {
    let schema = vec![
        ColumnDesc::new("PersonId", SqlType::Int).nullable(),
        ColumnDesc::new("FirstName", SqlType::String),
    ];
    let sql = "SELECT PersonId, FirstName FROM People";

    let conn = FakeConnection::postgres("nullability_check_depends_on_dialect")
        .result_schema(schema.clone());
    let mut pg = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();
    let people: Vec<Person> = query(sql).to_list(&mut pg).await.unwrap();
    assert!(people.is_empty());

    let conn = FakeConnection::sql_server("nullability_check_depends_on_dialect")
        .result_schema(schema);
    let mut mssql = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();
    let err = query(sql).to_list::<Person, _>(&mut mssql).await.unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::NullabilityMismatch);
}

#[tokio::test]
async fn underscore_matching_resolves_snake_case_columns() {
    #[derive(Debug, plainq::FromRow)]
    struct Author {
        #[orm(column = "FirstName")]
        first_name: String,
    }

    let schema = vec![ColumnDesc::new("first_name", SqlType::String)];
    let sql = "SELECT first_name FROM authors";

    let conn = FakeConnection::postgres("underscore_matching_on")
        .result_schema(schema.clone())
        .returning(rows(&["first_name"], vec![vec![Value::String("Ada".into())]]));
    let config = DbConfig::new()
        .mapping_check(true)
        .match_names_with_underscores(true);
    let mut db = Db::with_config(conn, config).unwrap();
    let authors: Vec<Author> = query(sql).to_list(&mut db).await.unwrap();
    assert_eq!(authors[0].first_name, "Ada");

    let conn = FakeConnection::postgres("underscore_matching_off").result_schema(schema);
    let mut db = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();
    let err = query(sql).to_list::<Author, _>(&mut db).await.unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::FieldNotFound);
    assert!(err.to_string().contains("Field 'first_name' not found in destination type."));
}

#[tokio::test]
async fn checked_queries_are_probed_once() {
    let conn = FakeConnection::sql_server("checked_queries_are_probed_once")
        .result_schema(vec![ColumnDesc::new("Name", SqlType::String)]);
    let mut db = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();

    let q = query_with("SELECT Name FROM Tags WHERE TagId = @id", params! { "id" => 1 });
    let _: Vec<String> = q.to_list(&mut db).await.unwrap();
    let _: Vec<String> = q.to_list(&mut db).await.unwrap();
    assert_eq!(db.connection().probes, vec!["SELECT Name FROM Tags WHERE TagId = @P1"]);
    assert_eq!(db.connection().statements.len(), 2);
}

#[tokio::test]
async fn scoped_override_enables_checks() {
    let conn = FakeConnection::sql_server("scoped_override_enables_checks")
        .result_schema(vec![ColumnDesc::new("PostId", SqlType::Int)]);
    let mut db = Db::new(conn).unwrap();
    let q = query("SELECT PostId FROM Posts");

    let err = with_mapping_check(true, q.to_list::<PostId, _>(&mut db))
        .await
        .unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::TypeMismatch);

    // Outside the scope the configured default (off) applies again.
    let ids: Vec<PostId> = q.to_list(&mut db).await.unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn model_columns_are_checked_when_enabled() {
    let conn = FakeConnection::sql_server("model_columns_are_checked_when_enabled").table(
        "Posts",
        vec![
            ColumnDesc::new("PostId", SqlType::Int).key().auto_increment(),
            ColumnDesc::new("Text", SqlType::Int),
            ColumnDesc::new("CreationDate", SqlType::DateTime),
        ],
    );
    let mut db = Db::with_config(conn, DbConfig::new().mapping_check(true)).unwrap();

    let err = db.insert(&sample_post()).await.unwrap_err();
    assert_eq!(mapping_kind(&err), MappingErrorKind::TypeMismatch);
    assert!(db.connection().statements.is_empty());
}

#[tokio::test]
async fn enum_parameters_round_trip() {
    #[derive(Debug, Clone, Copy, PartialEq, plainq::IntEnum)]
    #[repr(i32)]
    enum Visibility {
        Hidden = 0,
        Public = 2,
    }

    let conn = FakeConnection::sql_server("enum_parameters_round_trip").returning(rows(
        &["Visibility"],
        vec![vec![Value::Int(2)], vec![Value::Null(SqlType::Int)]],
    ));
    let mut db = Db::new(conn).unwrap();

    let q = query_with(
        "SELECT Visibility FROM Posts WHERE Visibility IN (@a, @b)",
        params! { "a" => Visibility::Public, "b" => Option::<Visibility>::None },
    );
    let read: Vec<Option<Visibility>> = q.to_list(&mut db).await.unwrap();
    assert_eq!(read, vec![Some(Visibility::Public), None]);
    assert_eq!(
        db.connection().statements[0].1,
        vec![Value::Int(2), Value::Null(SqlType::Int)]
    );
    assert_eq!(Visibility::Hidden.to_value(), Value::Int(0));
}
