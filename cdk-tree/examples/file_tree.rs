use std::error::Error;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use cdk_tree::prelude::*;
use cdk_tree::ExpansionModel;
use cdk_a11y::convert_key_event;
use crossterm::cursor::MoveTo;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use futures::StreamExt;
use simplelog::{Config, LevelFilter, WriteLogger};
use tokio::time::Instant;

/// A file or directory on disk.
#[derive(Debug, Clone, PartialEq)]
struct Entry {
    path: PathBuf,
    is_dir: bool,
}

impl Entry {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Directories first, then by path.
async fn read_entries(dir: PathBuf) -> Vec<Entry> {
    let Ok(mut reader) = tokio::fs::read_dir(&dir).await else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    while let Ok(Some(entry)) = reader.next_entry().await {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        entries.push(Entry {
            path: entry.path(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.path.cmp(&b.path)));
    entries
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Set up file logging
    let log_file = File::create("file_tree.log")?;
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)?;

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    // The tree walks every reachable node, so the accessor checks expansion
    // itself: only expanded directories are read from disk.
    let expansion: Arc<OnceLock<ExpansionModel<PathBuf>>> = Arc::new(OnceLock::new());
    let expanded = Arc::clone(&expansion);
    let mut tree = TreeBuilder::with_expansion_key(|e: &Entry| e.path.clone())
        .children_accessor(move |e: &Entry| {
            let listed = e.is_dir && expanded.get().is_some_and(|m| m.is_selected(&e.path));
            if listed {
                Children::from_future(read_entries(e.path.clone()))
            } else {
                Children::empty()
            }
        })
        .is_expandable(|e: &Entry| e.is_dir)
        .typeahead_label(|e: &Entry| e.name())
        .node_def(NodeDef::new("dir").when(|_, e: &Entry| e.is_dir))
        .node_def(NodeDef::new("file"))
        .data_source(vec![Entry {
            path: root,
            is_dir: true,
        }])
        .build()?;
    expansion.set(tree.expansion_model().clone()).ok();
    tree.render_next().await?;

    terminal::enable_raw_mode()?;
    let result = run(&mut tree).await;
    terminal::disable_raw_mode()?;
    result
}

async fn run(tree: &mut Tree<Entry, PathBuf>) -> Result<(), Box<dyn Error>> {
    let mut events = EventStream::new();
    let mut stdout = io::stdout();

    loop {
        draw(&mut stdout, tree)?;

        let typeahead = tree.typeahead_deadline();
        let event = tokio::select! {
            event = events.next() => event,
            _ = async {
                match typeahead {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                tree.poll_typeahead(Instant::now());
                continue;
            }
        };
        let Some(event) = event else {
            return Ok(());
        };

        if let Event::Key(key) = event? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            if key.code == KeyCode::Esc || ctrl_c {
                return Ok(());
            }
            if let Some(combo) = convert_key_event(key) {
                tree.send_keydown(&combo);
            }
        }

        while tree.render_pending().await? {}
    }
}

fn draw(out: &mut impl Write, tree: &Tree<Entry, PathBuf>) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    for view in tree.views().iter() {
        let context = &view.context;
        let cursor = if context.node.is_active() { "> " } else { "  " };
        let marker = match context.node.aria_expanded() {
            Some(true) => "v ",
            Some(false) => "> ",
            None => "  ",
        };
        write!(
            out,
            "{}{}{}{}\r\n",
            cursor,
            "  ".repeat(context.level),
            marker,
            context.implicit.name()
        )?;
    }
    write!(
        out,
        "\r\nup/down move  left/right collapse/expand  * expand level  type to search  esc quit\r\n"
    )?;
    out.flush()
}
