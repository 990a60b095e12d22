use csv_clickhouse::{
    BatchLoader, ClickHouseConfig, ClickHouseSink, CsvSource, DuckDbSink, LoadError, Sink, SinkError,
};
use duckdb::Connection;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn source(data: &str) -> CsvSource<&[u8]> {
    CsvSource::from_reader(data.as_bytes(), b',')
}

fn people_sink() -> DuckDbSink {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE people (id UBIGINT, name VARCHAR);")
        .unwrap();
    DuckDbSink::from_connection(conn)
}

fn people(sink: &DuckDbSink) -> Vec<(u64, String)> {
    let mut stmt = sink
        .conn()
        .prepare("SELECT id, name FROM people ORDER BY id")
        .unwrap();
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// Minimal HTTP endpoint answering each connection with the next canned response,
// returning the raw requests it received
fn serve(responses: Vec<(u16, &'static str)>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            requests.push(read_request(&mut stream));
            let reply = format!(
                "HTTP/1.1 {} Test\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
            stream.flush().unwrap();
        }
        requests
    });
    (port, handle)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .map(|(_, value)| value.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if data.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn config(port: u16) -> ClickHouseConfig {
    ClickHouseConfig {
        port,
        database: "analytics".to_string(),
        user: "loader".to_string(),
        password: "secret".to_string(),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

#[cfg(test)]
mod duckdb_sink_tests {
    use super::*;

    #[test]
    fn test_loads_all_batches() {
        let mut sink = people_sink();
        let loader = BatchLoader::new("people", 2).unwrap();

        let summary = loader
            .ingest(&mut source("id,name\n1,alice\n2,bob\n3,carol\n4,dave\n5,erin\n"), &mut sink)
            .unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(
            people(&sink),
            vec![
                (1, "alice".to_string()),
                (2, "bob".to_string()),
                (3, "carol".to_string()),
                (4, "dave".to_string()),
                (5, "erin".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_columns_can_be_reordered() {
        let mut sink = people_sink();
        let loader = BatchLoader::new("people", 10).unwrap();

        loader
            .ingest(&mut source("name,id\nzed,26\n"), &mut sink)
            .unwrap();

        assert_eq!(people(&sink), vec![(26, "zed".to_string())]);
    }

    #[test]
    fn test_failed_batch_is_rolled_back_and_earlier_batches_kept() {
        let mut sink = people_sink();
        let loader = BatchLoader::new("people", 2).unwrap();

        let err = loader
            .ingest(&mut source("id,name\n1,alice\n2,bob\n3,carol\nx,dave\n5,erin\n"), &mut sink)
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::Append {
                row: 1,
                source: SinkError::DuckDb(_)
            }
        ));
        assert_eq!(
            people(&sink),
            vec![(1, "alice".to_string()), (2, "bob".to_string())]
        );
    }

    #[test]
    fn test_unknown_table_fails() {
        let mut sink = people_sink();
        let loader = BatchLoader::new("nobody", 2).unwrap();

        let err = loader
            .ingest(&mut source("id,name\n1,alice\n"), &mut sink)
            .unwrap_err();

        assert!(matches!(err, LoadError::Append { row: 0, .. }));
    }

    #[test]
    fn test_open_in_memory() {
        let sink = DuckDbSink::open(":memory:").unwrap();
        let one: i32 = sink.conn().query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}

#[cfg(test)]
mod clickhouse_sink_tests {
    use super::*;

    #[test]
    fn test_posts_one_request_per_batch() {
        let (port, server) = serve(vec![(200, "Ok.\n"), (200, ""), (200, "")]);
        let mut sink = ClickHouseSink::connect(config(port)).unwrap();
        let loader = BatchLoader::new("events", 2).unwrap();

        let summary = loader
            .ingest(&mut source("id,name\n1,alice\n2,o'brien\nnotanum,carol\n"), &mut sink)
            .unwrap();
        drop(sink);
        let requests = server.join().unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("GET /ping "));
        assert!(requests[1].starts_with("POST / "));
        let first = requests[1].to_lowercase();
        assert!(first.contains("x-clickhouse-user: loader"));
        assert!(first.contains("x-clickhouse-key: secret"));
        assert!(first.contains("x-clickhouse-database: analytics"));
        assert!(requests[1].ends_with(
            "INSERT INTO events (`id`, `name`) FORMAT JSONCompactEachRow\n[1,\"alice\"]\n[2,\"o'brien\"]\n"
        ));
        assert!(requests[2].ends_with(
            "INSERT INTO events (`id`, `name`) FORMAT JSONCompactEachRow\n[\"notanum\",\"carol\"]\n"
        ));
    }

    #[test]
    fn test_rejected_insert_is_reported() {
        let (port, server) = serve(vec![
            (200, "Ok.\n"),
            (500, "Code: 60. DB::Exception: Table analytics.missing does not exist.\n"),
        ]);
        let mut sink = ClickHouseSink::connect(config(port)).unwrap();
        let loader = BatchLoader::new("missing", 10).unwrap();

        let err = loader
            .ingest(&mut source("id\n1\n2\n"), &mut sink)
            .unwrap_err();
        server.join().unwrap();

        match err {
            LoadError::Send(SinkError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "Code: 60. DB::Exception: Table analytics.missing does not exist.");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_truncated_error_body_still_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            // Promise more bytes than are sent, then hang up
            stream
                .write_all(b"HTTP/1.1 500 Test\r\nContent-Length: 100\r\nConnection: close\r\n\r\nCode:")
                .unwrap();
        });

        let err = ClickHouseSink::connect(config(port)).err().unwrap();
        server.join().unwrap();

        match err {
            SinkError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert!(body.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_connect_fails_when_ping_is_refused() {
        let (port, server) = serve(vec![(503, "unavailable")]);

        let err = ClickHouseSink::connect(config(port)).err().unwrap();
        server.join().unwrap();

        assert!(matches!(err, SinkError::Rejected { status: 503, .. }));
    }

    #[test]
    fn test_sink_reports_clickhouse_dialect() {
        let (port, server) = serve(vec![(200, "Ok.\n")]);
        let sink = ClickHouseSink::connect(config(port)).unwrap();
        server.join().unwrap();

        assert_eq!(sink.dialect(), csv_clickhouse::Dialect::ClickHouse);
        assert_eq!(sink.config().database, "analytics");
    }

    #[test]
    #[ignore = "needs a running ClickHouse server on localhost:8123"]
    fn test_live_clickhouse_round_trip() {
        let mut sink = ClickHouseSink::connect(ClickHouseConfig::default()).unwrap();
        let loader = BatchLoader::new("default.csv_clickhouse_smoke", 2).unwrap();
        loader
            .ingest(&mut source("id,name\n1,alice\n2,bob\n3,carol\n"), &mut sink)
            .unwrap();
    }
}
