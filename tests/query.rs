//! End-to-end scenarios against a live server.
//!
//! These require a reachable postgres; point `DATABASE_URL` (or the `PG*`
//! variables) at one and run `cargo test -- --ignored`.
use postwire::{Connection, Value};

async fn connect() -> Connection {
    Connection::connect_env().await.expect("postgres not reachable")
}

async fn fresh_mytest(conn: &mut Connection) {
    postwire::execute("DROP TABLE IF EXISTS mytest", &mut *conn).await.unwrap();
    postwire::execute("CREATE TABLE mytest(name text, value int)", &mut *conn)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn create_insert_select() {
    let mut conn = connect().await;
    fresh_mytest(&mut conn).await;

    let done = postwire::execute("INSERT INTO mytest VALUES ('foo', 1)", &mut conn)
        .await
        .unwrap();
    assert_eq!(done.rows_affected, 1);

    let row = postwire::query("SELECT name, value FROM mytest", &mut conn)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(row.try_get::<_, String>("name").unwrap(), "foo");
    assert_eq!(row.try_get::<_, i32>("value").unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn parameterized_insert_and_select() {
    let mut conn = connect().await;
    fresh_mytest(&mut conn).await;

    let done = postwire::execute("INSERT INTO mytest(name, value) VALUES ($1, $2)", &mut conn)
        .bind("foo")
        .bind(1_i32)
        .await
        .unwrap();
    assert_eq!(done.rows_affected, 1);

    let (name, value) =
        postwire::query_as::<_, _, (String, i32)>("SELECT name, value FROM mytest WHERE name = $1", &mut conn)
            .bind("foo")
            .fetch_one()
            .await
            .unwrap();
    assert_eq!(name, "foo");
    assert_eq!(value, 1);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn column_reorder_keeps_names_straight() {
    let mut conn = connect().await;
    fresh_mytest(&mut conn).await;
    postwire::execute("INSERT INTO mytest VALUES ('foo', 1)", &mut conn).await.unwrap();

    let row = postwire::query("SELECT value, name FROM mytest WHERE name = 'foo'", &mut conn)
        .fetch_one()
        .await
        .unwrap();

    // positional access follows the select list
    assert_eq!(row.try_get::<usize, i32>(0).unwrap(), 1);
    assert_eq!(row.try_get::<usize, String>(1).unwrap(), "foo");
    // named access does not care about positions
    assert_eq!(row.try_get::<_, String>("name").unwrap(), "foo");
    assert_eq!(row.try_get::<_, i32>("value").unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn composite_and_array_shapes() {
    let mut conn = connect().await;

    type Left = (String, Vec<i32>, i32);
    let (left, right, axis, trailing) = postwire::query_as::<_, _, (Left, Vec<(i32, String)>, String, String)>(
        "SELECT ROW('text', ARRAY[1,2,3], 100), ARRAY[ROW(1,'str'), ROW(2,'aab')], 'x', 'anotherText'",
        &mut conn,
    )
    .fetch_one()
    .await
    .unwrap();

    assert_eq!(left.0, "text");
    assert_eq!(left.1, [1, 2, 3]);
    assert_eq!(left.2, 100);
    assert_eq!(right, [(1, String::from("str")), (2, String::from("aab"))]);
    assert_eq!(axis, "x");
    assert_eq!(trailing, "anotherText");
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn multi_dimensional_array_keeps_shape() {
    let mut conn = connect().await;

    let value = postwire::query_scalar::<_, _, Value>(
        "SELECT ARRAY[[1,2],[3,4],[5,6]]",
        &mut conn,
    )
    .fetch_one()
    .await
    .unwrap();

    let outer = value.as_array().unwrap();
    assert_eq!(outer.len(), 3);
    assert_eq!(outer[2].as_array().unwrap()[1].as_i32().unwrap(), 6);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn failed_command_leaves_connection_usable() {
    let mut conn = connect().await;

    let err = postwire::execute("DROP TABLE does_not_exist", &mut conn)
        .await
        .unwrap_err();
    let db = err.as_database_error().expect("server error");
    assert_eq!(db.code, "42P01");

    // the connection resynchronized and keeps working
    let one = postwire::query_scalar::<_, _, i32>("SELECT 1", &mut conn)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(one, 1);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn prepared_statements_are_reused() {
    let mut conn = connect().await;

    for i in 0..3_i32 {
        let back = postwire::query_scalar::<_, _, i32>("SELECT $1::int4", &mut conn)
            .bind(i)
            .fetch_one()
            .await
            .unwrap();
        assert_eq!(back, i);
    }
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn abandoned_stream_drains_before_next_command() {
    use futures_core::Stream;
    use std::future::poll_fn;
    use std::pin::Pin;

    let mut conn = connect().await;

    let mut stream = postwire::query("SELECT generate_series(1, 100)", &mut conn).fetch();
    let first = poll_fn(|cx| Pin::new(&mut stream).poll_next(cx)).await;
    first.unwrap().unwrap();
    drop(stream);

    let n = postwire::query_scalar::<_, _, i32>("SELECT 42", &mut conn)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(n, 42);
}

#[tokio::test]
#[ignore = "requires a running postgres"]
async fn null_handling() {
    let mut conn = connect().await;

    let missing = postwire::query_scalar::<_, _, Option<i32>>("SELECT NULL::int4", &mut conn)
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(missing, None);

    postwire::query_scalar::<_, _, i32>("SELECT NULL::int4", &mut conn)
        .fetch_one()
        .await
        .unwrap_err();
}
