use std::io::Write;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::platform::{self, CommentNode, Page};

/// Source of comment batches. `platform::Client` is the real one; tests
/// script their own.
pub trait CommentFeed: Send + Sync {
    fn latest_page(&self, project_id: &str, after: Option<&str>) -> Result<Page>;
    fn full_history(&self, project_id: &str) -> Result<Vec<CommentNode>>;
}

impl CommentFeed for platform::Client {
    fn latest_page(&self, project_id: &str, after: Option<&str>) -> Result<Page> {
        self.fetch_page(project_id, after)
            .context("fetch latest comment page")
    }

    fn full_history(&self, project_id: &str) -> Result<Vec<CommentNode>> {
        self.fetch_all_comments(project_id)
            .context("fetch full comment history")
    }
}

/// What the rendering collaborator gets for each newly seen commenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommenterCard {
    pub username: String,
    pub avatar_url: String,
    pub profile_url: String,
}

impl CommenterCard {
    pub fn new(username: &str, avatar_base: &str, profile_base: &str) -> Self {
        Self {
            username: username.to_string(),
            avatar_url: platform::avatar_url(avatar_base, username),
            profile_url: platform::profile_url(profile_base, username),
        }
    }
}

/// Append-only consumer of commenter cards. Placement and animation are the
/// implementor's business.
pub trait Renderer: Send + Sync {
    fn append(&self, cards: &[CommenterCard]) -> Result<()>;
}

/// Writes one line per commenter to a shared writer.
pub struct TextRenderer<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }
}

impl<W: Write + Send> Renderer for TextRenderer<W> {
    fn append(&self, cards: &[CommenterCard]) -> Result<()> {
        let mut out = self.out.lock();
        for card in cards {
            writeln!(out, "@{}  {}  {}", card.username, card.avatar_url, card.profile_url)
                .context("write commenter card")?;
        }
        out.flush().context("flush commenter cards")?;
        Ok(())
    }
}

/// Serves pre-scripted responses: a full history plus a queue of latest
/// pages, one per call.
#[derive(Default)]
pub struct ScriptedFeed {
    history: Vec<CommentNode>,
    latest: Mutex<Vec<Result<Page>>>,
    pub calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedFeed {
    pub fn new(history: Vec<CommentNode>, latest: Vec<Result<Page>>) -> Self {
        Self {
            history,
            latest: Mutex::new(latest),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl CommentFeed for ScriptedFeed {
    fn latest_page(&self, _project_id: &str, after: Option<&str>) -> Result<Page> {
        self.calls.lock().push(after.map(str::to_string));
        let mut latest = self.latest.lock();
        if latest.is_empty() {
            return Ok(Page {
                data: Vec::new(),
                meta: platform::PageMeta {
                    has_next_page: false,
                    end_cursor: String::new(),
                },
            });
        }
        latest.remove(0)
    }

    fn full_history(&self, _project_id: &str) -> Result<Vec<CommentNode>> {
        Ok(self.history.clone())
    }
}

/// Remembers every card it was handed, in order.
#[derive(Default)]
pub struct RecordingRenderer {
    pub cards: Mutex<Vec<CommenterCard>>,
}

impl RecordingRenderer {
    pub fn usernames(&self) -> Vec<String> {
        self.cards
            .lock()
            .iter()
            .map(|card| card.username.clone())
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn append(&self, cards: &[CommenterCard]) -> Result<()> {
        self.cards.lock().extend(cards.iter().cloned());
        Ok(())
    }
}
