use msgtrace::cli::run::{run_trace, TraceArgs};
use msgtrace::config::types::Config;
use msgtrace::trace::Tracer;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn subscriber(captured: &Captured) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish()
}

// blocking tasks run on pool threads, so the async run needs a process-wide subscriber
fn global_capture() -> &'static Captured {
    static CAPTURED: OnceLock<Captured> = OnceLock::new();
    CAPTURED.get_or_init(|| {
        let captured = Captured::default();
        tracing::subscriber::set_global_default(subscriber(&captured)).unwrap();
        captured
    })
}

fn corpus(root: &Path) -> Config {
    let mut config = Config {
        root: root.to_path_buf(),
        ..Config::default()
    };
    config.transfer.timestamp.year = Some(2021);
    config.output.dir = root.join("out");

    let scanner_dir = config.scanner_dir();
    fs::create_dir_all(&scanner_dir).unwrap();
    fs::write(
        scanner_dir.join("log.imss.20211028.0041"),
        "2021/10/28 14:13:50 GMT+00:00 [2714:3060] Info: Accept connection from client [127.0.0.1]\n",
    )
    .unwrap();
    fs::write(
        scanner_dir.join("log.imss.20211028.0042"),
        "2021/10/28 14:13:54 GMT+00:00 [2714:3060] Scan finished for 7A3C1F02-29B5-5805, action=deliver\n",
    )
    .unwrap();

    let transfer_dir = config.transfer_dir();
    fs::create_dir_all(&transfer_dir).unwrap();
    for name in ["maillog", "maillog.1", "maillog.2"] {
        fs::write(
            transfer_dir.join(name),
            "Oct 28 14:13:49 mx postfix/cleanup[4242]: 935162C03E: message-id=<other@host>\n",
        )
        .unwrap();
    }

    config
}

#[test]
fn test_absent_identifier_warns_once_per_family() {
    let temp_dir = TempDir::new().unwrap();
    let config = corpus(temp_dir.path());
    let tracer = Tracer::new(&config).unwrap();

    let captured = Captured::default();
    let report = tracing::subscriber::with_default(subscriber(&captured), || {
        tracer.trace("nobody@nowhere").unwrap()
    });

    assert_eq!(report.message_count(), 0);
    let output = captured.text();
    assert_eq!(output.matches(" WARN ").count(), 2, "{output}");
    assert_eq!(output.matches("family=scanner").count(), 1);
    assert_eq!(output.matches("family=transfer").count(), 1);
}

#[tokio::test]
async fn test_run_with_no_hits_adds_no_warning_of_its_own() {
    let captured = global_capture();
    let temp_dir = TempDir::new().unwrap();
    let config = corpus(temp_dir.path());
    let query = "ghost.7f3a@nowhere.example";

    let args = TraceArgs {
        id: query.to_string(),
        ..TraceArgs::default()
    };
    let report = run_trace(config, args).await.unwrap();
    assert_eq!(report.message_count(), 0);

    let warnings: Vec<String> = captured
        .text()
        .lines()
        .filter(|l| l.contains(" WARN ") && l.contains(query))
        .map(str::to_string)
        .collect();
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    assert!(warnings
        .iter()
        .all(|l| l.contains("Identifier not found in any file of family")));
}
