use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::csv::{ParsedTable, Row, escape_field, parse_delimited_text};

/// Where the text payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Source::Url(s.to_string())
        } else {
            Source::File(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(p) => write!(f, "{}", p.display()),
            Source::Url(u) => f.write_str(u),
        }
    }
}

/// The source could not be read. Reported once; loads are never retried.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("cannot fetch {url}: {message}")]
    Transport { url: String, message: String },
}

#[derive(Debug)]
pub enum LoadRequest {
    /// Read and parse the configured source.
    Load,
    /// Write rows (normally the current filtered result) as CSV.
    Export {
        path: String,
        headers: Vec<String>,
        rows: Vec<Row>,
    },
}

#[derive(Debug)]
pub enum LoadResponse {
    Loaded {
        table: ParsedTable,
        elapsed: Duration,
    },
    Exported {
        path: String,
        rows: usize,
    },
    /// Export failure; the loaded table stays as it is.
    ExportFailed(String),
    Error(String),
}

/// Read the whole source into memory.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, and a
/// leading byte-order mark is dropped.
pub fn read_source(source: &Source) -> Result<String, LoadError> {
    let bytes = match source {
        Source::File(path) => std::fs::read(path).map_err(|e| LoadError::ReadFile {
            path: path.clone(),
            source: e,
        })?,
        Source::Url(url) => match ureq::get(url).call() {
            Ok(resp) => {
                let mut buf = Vec::new();
                resp.into_reader()
                    .read_to_end(&mut buf)
                    .map_err(|e| LoadError::Transport {
                        url: url.clone(),
                        message: e.to_string(),
                    })?;
                buf
            }
            Err(ureq::Error::Status(status, _)) => {
                return Err(LoadError::HttpStatus {
                    url: url.clone(),
                    status,
                });
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(LoadError::Transport {
                    url: url.clone(),
                    message: t.to_string(),
                });
            }
        },
    };
    Ok(decode_text(&bytes))
}

fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text.into_owned(),
    }
}

pub fn load_table(source: &Source) -> Result<LoadResponse, LoadError> {
    let started = Instant::now();
    let text = read_source(source)?;
    let table = parse_delimited_text(&text);
    let elapsed = started.elapsed();
    info!(
        %source,
        bytes = text.len(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        ?elapsed,
        "loaded table"
    );
    Ok(LoadResponse::Loaded { table, elapsed })
}

pub fn start_loader_worker(
    source: Source,
    req_rx: Receiver<LoadRequest>,
    resp_tx: Sender<LoadResponse>,
) {
    while let Ok(req) = req_rx.recv() {
        let resp = match req {
            LoadRequest::Load => {
                debug!(%source, "load requested");
                match load_table(&source) {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!(error = %e, "load failed");
                        LoadResponse::Error(e.to_string())
                    }
                }
            }
            LoadRequest::Export {
                path,
                headers,
                rows,
            } => match export_csv(Path::new(&path), &headers, &rows) {
                Ok(()) => {
                    info!(%path, rows = rows.len(), "exported csv");
                    LoadResponse::Exported {
                        path,
                        rows: rows.len(),
                    }
                }
                Err(e) => {
                    warn!(%path, error = %e, "export failed");
                    LoadResponse::ExportFailed(e.to_string())
                }
            },
        };
        if resp_tx.send(resp).is_err() {
            break;
        }
    }
}

fn export_csv(path: &Path, headers: &[String], rows: &[Row]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    write_csv(&mut w, headers, rows)?;
    w.flush()
}

pub fn write_csv<W: Write>(w: &mut W, headers: &[String], rows: &[Row]) -> io::Result<()> {
    write_csv_row(w, headers.iter().map(|h| h.as_str()))?;
    for row in rows {
        write_csv_row(w, headers.iter().map(|h| row.get(h).unwrap_or_default()))?;
    }
    Ok(())
}

fn write_csv_row<'a, W: Write>(w: &mut W, cols: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let mut first = true;
    for col in cols {
        if !first {
            w.write_all(b",")?;
        }
        first = false;
        w.write_all(escape_field(col).as_bytes())?;
    }
    w.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterMap, filter_rows};

    #[test]
    fn source_detects_urls() {
        assert_eq!(
            Source::parse("https://example.com/data.csv"),
            Source::Url("https://example.com/data.csv".into())
        );
        assert_eq!(
            Source::parse("data/export.csv"),
            Source::File(PathBuf::from("data/export.csv"))
        );
    }

    #[test]
    fn load_reads_and_parses_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "name,age\nann,31\n\nbob,42\n").unwrap();
        let source = Source::File(f.path().to_path_buf());
        match load_table(&source).unwrap() {
            LoadResponse::Loaded { table, .. } => {
                assert_eq!(table.headers, vec!["name", "age"]);
                assert_eq!(table.rows.len(), 2);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn byte_order_mark_is_dropped() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all("\u{feff}name,age\nann,31\n".as_bytes()).unwrap();
        let text = read_source(&Source::File(f.path().to_path_buf())).unwrap();
        let table = parse_delimited_text(&text);
        assert_eq!(table.headers, vec!["name", "age"]);
        assert_eq!(table.rows[0].get("name"), Some("ann"));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"city,n\nTroms\xf8,1\n").unwrap();
        let text = read_source(&Source::File(f.path().to_path_buf())).unwrap();
        let table = parse_delimited_text(&text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("city"), Some("Troms\u{fffd}"));
        assert_eq!(table.rows[0].get("n"), Some("1"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::File(dir.path().join("absent.csv"));
        let err = read_source(&source).unwrap_err();
        assert!(matches!(err, LoadError::ReadFile { .. }));
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn unreachable_url_is_transport_error() {
        let source = Source::Url("http://127.0.0.1:9/data.csv".into());
        let err = read_source(&source).unwrap_err();
        assert!(matches!(err, LoadError::Transport { .. }));
    }

    #[test]
    fn write_csv_quotes_and_round_trips() {
        let table = parse_delimited_text("a,b\n\"x,y\",plain\n\"say \"\"hi\"\"\",z");
        let mut buf = Vec::new();
        write_csv(&mut buf, &table.headers, &table.rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "a,b\n\"x,y\",plain\n\"say \"\"hi\"\"\",z\n");
        assert_eq!(parse_delimited_text(&text), table);
    }

    #[test]
    fn worker_loads_and_exports_filtered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "city,n\nOslo,1\nBergen,2\noslo,3\n").unwrap();

        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded();
        let source = Source::File(input);
        let handle = std::thread::spawn(move || start_loader_worker(source, req_rx, resp_tx));

        req_tx.send(LoadRequest::Load).unwrap();
        let table = match resp_rx.recv().unwrap() {
            LoadResponse::Loaded { table, .. } => table,
            other => panic!("unexpected response: {other:?}"),
        };
        let filters: FilterMap = [("city", "OSLO")].into_iter().collect();
        let rows = filter_rows(&table.rows, &filters);

        req_tx
            .send(LoadRequest::Export {
                path: output.display().to_string(),
                headers: table.headers.clone(),
                rows,
            })
            .unwrap();
        match resp_rx.recv().unwrap() {
            LoadResponse::Exported { rows, .. } => assert_eq!(rows, 2),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "city,n\nOslo,1\noslo,3\n"
        );

        drop(req_tx);
        handle.join().unwrap();
    }
}
