//! Integration tests for duckpend-core against an in-memory DuckDB database.

use chrono::{NaiveDate, TimeZone, Utc};
use duckdb::Connection;
use duckpend_core::config::{StagingBackend, StagingConfig};
use duckpend_core::{Appender, AppenderBuilder, Error, Value};
use tempfile::TempDir;
use uuid::Uuid;

fn create_users_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open DuckDB");
    conn.execute_batch("CREATE TABLE users (id INTEGER, name VARCHAR);")
        .expect("Failed to create table");
    conn
}

fn staging_in(temp_dir: &TempDir) -> StagingConfig {
    StagingConfig {
        dir: temp_dir.path().to_path_buf(),
        ..StagingConfig::default()
    }
}

fn builder<'c>(conn: &'c Connection, table: &str, temp_dir: &TempDir) -> AppenderBuilder<'c> {
    Appender::builder(conn, "main", table).staging(staging_in(temp_dir))
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("Failed to count rows")
}

mod session {
    use super::*;

    #[test]
    fn test_threshold_three_rows_one_to_five() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir)
            .threshold(3)
            .open()
            .unwrap();

        appender.append_row([Value::from(1), "John Doe".into()]).unwrap();
        appender.append_row([Value::from(2), "Maria".into()]).unwrap();
        assert_eq!(count(&conn, "users"), 0);

        appender.append_row([Value::from(3), "Ahmed".into()]).unwrap();
        assert_eq!(count(&conn, "users"), 3);

        appender.append_row([Value::from(4), "Lena".into()]).unwrap();
        appender.append_row([Value::from(5), "Kofi".into()]).unwrap();
        assert_eq!(count(&conn, "users"), 3);

        appender.close().unwrap();
        assert_eq!(count(&conn, "users"), 5);

        let ids: Vec<i32> = conn
            .prepare("SELECT id FROM users ORDER BY rowid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_default_threshold_ten_rows() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir).open().unwrap();

        for id in 0..10 {
            appender
                .append_row([Value::from(id), format!("User {}", id).into()])
                .unwrap();
        }
        assert_eq!(count(&conn, "users"), 0);

        appender.close().unwrap();
        assert_eq!(count(&conn, "users"), 10);
        assert_eq!(appender.stats().flushes, 1);
    }

    #[test]
    fn test_auto_flush_visible_before_close() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir)
            .threshold(2000)
            .open()
            .unwrap();

        for id in 0..4500 {
            appender
                .append_row([Value::from(id), Value::Null])
                .unwrap();
        }
        assert_eq!(count(&conn, "users"), 4000);
        assert_eq!(appender.pending_rows(), 500);

        appender.close().unwrap();
        assert_eq!(count(&conn, "users"), 4500);
    }

    #[test]
    fn test_arity_mismatch_leaves_table_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir)
            .threshold(1)
            .open()
            .unwrap();

        let err = appender.append_row([1]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid number of columns: expected 2, got 1");

        appender.close().unwrap();
        assert_eq!(count(&conn, "users"), 0);
    }

    #[test]
    fn test_rejected_batch_keeps_earlier_flushes() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir)
            .threshold(3)
            .open()
            .unwrap();

        for id in 1..=3 {
            appender.append_row([Value::from(id), "ok".into()]).unwrap();
        }
        assert_eq!(count(&conn, "users"), 3);

        appender.append_row([Value::from(4), "a".into()]).unwrap();
        appender
            .append_row([Value::from("notanint"), "b".into()])
            .unwrap();
        let err = appender
            .append_row([Value::from(6), "c".into()])
            .unwrap_err();
        assert!(matches!(err, Error::AppendRejected { index: 1, .. }));

        let committed: Vec<i32> = conn
            .prepare("SELECT id FROM users WHERE name = 'ok' ORDER BY rowid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(committed, vec![1, 2, 3]);

        for id in 7..=9 {
            appender.append_row([Value::from(id), "late".into()]).unwrap();
        }
        appender.close().unwrap();

        let late: i64 = conn
            .query_row("SELECT count(*) FROM users WHERE name = 'late'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(late, 3);
    }

    #[test]
    fn test_missing_table_is_invalid_target() {
        let conn = create_users_db();
        let result = Appender::open(&conn, "main", "wrong_table_name");
        assert!(matches!(result, Err(Error::InvalidTarget(_))));

        let result = Appender::open(&conn, "wrong_schema", "users");
        assert!(matches!(result, Err(Error::InvalidTarget(_))));
    }

    #[test]
    fn test_append_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let mut appender = builder(&conn, "users", &temp_dir).open().unwrap();
        appender.close().unwrap();

        let err = appender
            .append_row([Value::from(1), "late".into()])
            .unwrap_err();
        assert!(matches!(err, Error::ClosedSession));
    }

    #[test]
    fn test_scoped_session() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();

        let result: duckpend_core::Result<()> =
            Appender::scoped(builder(&conn, "users", &temp_dir), |appender| {
                appender.append_row([Value::from(1), "a".into()])?;
                appender.append_row([Value::from(2)])?;
                Ok(())
            });

        assert!(matches!(result, Err(Error::RowArity { .. })));
        // Rows staged before the failure are still flushed on close
        assert_eq!(count(&conn, "users"), 1);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_flushes_remaining_rows() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        {
            let mut appender = builder(&conn, "users", &temp_dir).open().unwrap();
            appender.append_row([Value::from(7), "dropped".into()]).unwrap();
        }
        assert_eq!(count(&conn, "users"), 1);
    }
}

mod column_types {
    use super::*;

    #[test]
    fn test_numeric_text_and_boolean_columns() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE measurements (
                small SMALLINT, big BIGINT, ratio DOUBLE, label VARCHAR, ok BOOLEAN
            );",
        )
        .unwrap();

        let mut appender = builder(&conn, "measurements", &temp_dir).open().unwrap();
        appender
            .append_row([
                Value::from(7i16),
                Value::from(9_000_000_000i64),
                Value::from(0.25),
                Value::from("first"),
                Value::from(true),
            ])
            .unwrap();
        appender
            .append_row([
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ])
            .unwrap();
        appender.close().unwrap();

        let (small, big, ratio, label, ok): (i16, i64, f64, String, bool) = conn
            .query_row(
                "SELECT small, big, ratio, label, ok FROM measurements WHERE small IS NOT NULL",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .unwrap();
        assert_eq!(small, 7);
        assert_eq!(big, 9_000_000_000);
        assert_eq!(ratio, 0.25);
        assert_eq!(label, "first");
        assert!(ok);

        let nulls: i64 = conn
            .query_row(
                "SELECT count(*) FROM measurements WHERE small IS NULL AND label IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn test_blob_date_timestamp_and_uuid_columns() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE events (payload BLOB, day DATE, ts TIMESTAMP, id UUID);",
        )
        .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();

        let mut appender = builder(&conn, "events", &temp_dir).open().unwrap();
        appender
            .append_row([
                Value::from(&b"\x00\x01binary"[..]),
                Value::from(day),
                Value::from(at),
                Value::from(id),
            ])
            .unwrap();
        appender.close().unwrap();

        let (payload, day_text, micros, id_text): (Vec<u8>, String, i64, String) = conn
            .query_row(
                "SELECT payload, CAST(day AS VARCHAR), epoch_us(ts), CAST(id AS VARCHAR) FROM events",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(payload, b"\x00\x01binary".to_vec());
        assert_eq!(day_text, "2024-03-15");
        assert_eq!(micros, at.timestamp_micros());
        assert_eq!(id_text, "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn test_small_integer_and_float_columns() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE numbers (
                i1 TINYINT, i2 SMALLINT, i3 INTEGER, i4 BIGINT, f FLOAT, d DOUBLE
            );",
        )
        .unwrap();

        let mut appender = builder(&conn, "numbers", &temp_dir).open().unwrap();
        for _ in 0..1000 {
            appender
                .append_row([
                    Value::from(1),
                    Value::from(1),
                    Value::from(1),
                    Value::from(1),
                    Value::from(1.0625),
                    Value::from(1.0625),
                ])
                .unwrap();
        }
        appender.close().unwrap();

        let all_match: bool = conn
            .query_row(
                "SELECT sum(i1) = 1000 AND sum(i2) = 1000 AND sum(i3) = 1000
                    AND sum(i4) = 1000 AND sum(f) = 1062.5 AND sum(d) = 1062.5
                 FROM numbers",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(all_match);
    }

    #[test]
    fn test_decimal_column() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE prices (d DECIMAL(4, 3));")
            .unwrap();

        let mut appender = builder(&conn, "prices", &temp_dir).open().unwrap();
        appender.append_row([1.11]).unwrap();
        appender.append_row([1.22]).unwrap();
        appender.close().unwrap();

        let total: String = conn
            .query_row("SELECT CAST(sum(d) AS VARCHAR) FROM prices", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(total, "2.330");
    }

    #[test]
    fn test_timestamptz_column() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE stamps (t1 TIMESTAMP, t2 TIMESTAMPTZ);")
            .unwrap();

        let t = Utc.with_ymd_and_hms(2024, 7, 4, 18, 15, 0).unwrap()
            + chrono::Duration::microseconds(250);
        let mut appender = builder(&conn, "stamps", &temp_dir).open().unwrap();
        appender.append_row([t, t]).unwrap();
        appender.close().unwrap();

        let (plain, zoned): (i64, bool) = conn
            .query_row(
                "SELECT epoch_us(t1), t2 = CAST(t1 AS TIMESTAMPTZ) FROM stamps",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(plain, t.timestamp_micros());
        assert!(zoned);
    }

    #[test]
    fn test_list_columns() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE tags (string_list VARCHAR[], int_list INTEGER[]);")
            .unwrap();

        let mut appender = builder(&conn, "tags", &temp_dir).open().unwrap();
        appender
            .append_row([Value::list(["a1", "b2", "ccc"]), Value::list([1, 2, 3])])
            .unwrap();
        appender
            .append_row([Value::list(Vec::<&str>::new()), Value::Null])
            .unwrap();
        appender.close().unwrap();

        let matches: Vec<bool> = conn
            .prepare(
                "SELECT string_list = ['a1', 'b2', 'ccc'] AND int_list = [1, 2, 3]
                 FROM tags ORDER BY rowid LIMIT 1",
            )
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(matches, vec![true]);

        let (empty_len, null_list): (i64, bool) = conn
            .query_row(
                "SELECT len(string_list), int_list IS NULL FROM tags ORDER BY rowid OFFSET 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(empty_len, 0);
        assert!(null_list);
    }

    #[test]
    fn test_fixed_size_array_column() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE vectors (string_array VARCHAR[3]);")
            .unwrap();

        let mut appender = builder(&conn, "vectors", &temp_dir).open().unwrap();
        appender
            .append_row([Value::list(["a1", "b2", "ccc"])])
            .unwrap();
        appender.close().unwrap();

        let matches: bool = conn
            .query_row(
                "SELECT string_array = ['a1', 'b2', 'ccc']::VARCHAR[3] FROM vectors",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(matches);
    }

    #[test]
    fn test_many_rows_keep_insertion_order() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE seq (n BIGINT);").unwrap();

        let mut appender = builder(&conn, "seq", &temp_dir)
            .threshold(100)
            .open()
            .unwrap();
        for n in 0..999i64 {
            appender.append_row([n]).unwrap();
        }
        appender.close().unwrap();
        assert_eq!(appender.stats().flushes, 10);

        let ns: Vec<i64> = conn
            .prepare("SELECT n FROM seq ORDER BY rowid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ns, (0..999).collect::<Vec<_>>());
    }
}

mod staging_backends {
    use super::*;

    #[test]
    fn test_spill_file_backend() {
        let temp_dir = TempDir::new().unwrap();
        let conn = create_users_db();
        let staging = StagingConfig {
            backend: StagingBackend::Spill,
            ..staging_in(&temp_dir)
        };

        let mut appender = Appender::builder(&conn, "main", "users")
            .staging(staging)
            .threshold(4)
            .open()
            .unwrap();
        for id in 0..10 {
            appender
                .append_row([Value::from(id), format!("User {}", id).into()])
                .unwrap();
        }
        assert_eq!(count(&conn, "users"), 8);
        assert_eq!(appender.staged_rows().unwrap(), 2);

        appender.close().unwrap();
        assert_eq!(count(&conn, "users"), 10);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
