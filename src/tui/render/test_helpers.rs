use std::path::PathBuf;
use std::sync::Arc;

use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;

use crate::io::auth::ProfileIdentityProvider;
use crate::io::catalog::{Partition, PartitionKey};
use crate::io::ledger::TrackingMap;
use crate::io::local_store::MemoryLocalStore;
use crate::io::session::{Session, SessionParts};
use crate::io::source::MemorySource;
use crate::model::{AppConfig, Difficulty, ProblemRecord};
use crate::tui::app::App;

pub const TERM_W: u16 = 80;
pub const TERM_H: u16 = 24;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// `n` records titled "Problem 1".. with rotating difficulties and topics.
/// Every third record carries "Graph".
pub fn numbered_records(n: usize) -> Vec<ProblemRecord> {
    (1..=n)
        .map(|i| {
            let difficulty = Difficulty::ALL[i % 3];
            let topics: &[&str] = if i % 3 == 0 {
                &["Graph", "Array"]
            } else {
                &["Array"]
            };
            ProblemRecord::new("Acme", "Thirty Days", &format!("Problem {i}"), difficulty)
                .with_frequency((i % 100) as f64)
                .with_acceptance(50.0)
                .with_link(&format!("https://example.com/p/{i}"))
                .with_topics(topics)
        })
        .collect()
}

/// Like `numbered_records`, but titled "Problem 01".. so title order is
/// numeric order, with frequency equal to the number.
pub fn padded_records(n: usize) -> Vec<ProblemRecord> {
    (1..=n)
        .map(|i| {
            let topics: &[&str] = if i % 3 == 0 {
                &["Graph", "Array"]
            } else {
                &["Array"]
            };
            ProblemRecord::new("Acme", "Thirty Days", &format!("Problem {i:02}"), Difficulty::ALL[i % 3])
                .with_frequency(i as f64)
                .with_acceptance(50.0)
                .with_link(&format!("https://example.com/p/{i}"))
                .with_topics(topics)
        })
        .collect()
}

/// A session over an empty in-memory source with no remote and no identity.
pub fn test_session() -> Session {
    Session::from_parts(SessionParts {
        config: AppConfig::default(),
        config_path: PathBuf::from("prepdeck.toml"),
        state_dir: PathBuf::from("/tmp/prepdeck-test-state"),
        source: Arc::new(MemorySource::new()),
        local: Arc::new(MemoryLocalStore::new(TrackingMap::new())),
        remote: None,
        identity: Arc::new(ProfileIdentityProvider::new(None, None)),
    })
}

/// An App showing `records` as the active partition with the given page size.
pub fn app_with_records(records: Vec<ProblemRecord>, page_size: usize) -> App {
    let mut session = test_session();
    session.config.ui.page_size = page_size;
    session.config.ui.page_increment = page_size;
    let mut app = App::new(&session, None).without_state_dir();
    let key = PartitionKey::company("Acme", "Thirty Days");
    app.company = Some("Acme".into());
    app.timeframe = Some("Thirty Days".into());
    app.catalog.set_active(key.clone());
    let records = records.into_iter().map(Arc::new).collect();
    app.apply_partition(Arc::new(Partition::from_records(key, records)));
    app
}
