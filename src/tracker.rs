use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::feed::{CommentFeed, CommenterCard, Renderer};
use crate::platform::{Author, CommentNode};

/// Reduce a comment batch to the distinct authors not yet rendered, oldest
/// contribution first. Ties on timestamp keep the batch's relative order;
/// comments without an author or username are skipped.
pub fn unique_new_commenters(batch: &[CommentNode], rendered: &HashSet<String>) -> Vec<Author> {
    let mut nodes: Vec<&CommentNode> = batch.iter().collect();
    nodes.sort_by_key(|node| node.comment.created_at);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for node in nodes {
        let Some(author) = node.comment.author.as_ref() else {
            continue;
        };
        if author.username.is_empty() || rendered.contains(&author.username) {
            continue;
        }
        if seen.insert(author.username.clone()) {
            out.push(author.clone());
        }
    }
    out
}

/// One watch of a project's comment feed. Owns the rendered-set and the
/// pagination cursor; the rendered-set only ever grows.
pub struct Session {
    project_id: String,
    feed: Arc<dyn CommentFeed>,
    renderer: Arc<dyn Renderer>,
    avatar_base: String,
    profile_base: String,
    rendered: HashSet<String>,
    cursor: Option<String>,
}

impl Session {
    pub fn new(
        project_id: String,
        feed: Arc<dyn CommentFeed>,
        renderer: Arc<dyn Renderer>,
        avatar_base: String,
        profile_base: String,
    ) -> Self {
        Self {
            project_id,
            feed,
            renderer,
            avatar_base,
            profile_base,
            rendered: HashSet::new(),
            cursor: None,
        }
    }

    /// Initial load: render every commenter in the full history, then park
    /// the cursor at the tip of the feed so ticks only see new comments.
    pub fn prime(&mut self) -> Result<usize> {
        let history = self
            .feed
            .full_history(&self.project_id)
            .context("prime commenter session")?;
        let count = self.render_new(&history)?;

        let tip = self
            .feed
            .latest_page(&self.project_id, None)
            .context("locate feed tip")?;
        if !tip.data.is_empty() {
            self.cursor = Some(tip.meta.end_cursor);
        }
        Ok(count)
    }

    /// One periodic update: fetch comments past the cursor, render the
    /// commenters not seen before. Empty pages leave the cursor alone; a
    /// failed fetch leaves the whole session untouched.
    pub fn tick(&mut self) -> Result<usize> {
        let page = self
            .feed
            .latest_page(&self.project_id, self.cursor.as_deref())?;
        if page.data.is_empty() {
            return Ok(0);
        }
        self.cursor = Some(page.meta.end_cursor.clone());
        self.render_new(&page.data)
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    fn render_new(&mut self, batch: &[CommentNode]) -> Result<usize> {
        let authors = unique_new_commenters(batch, &self.rendered);
        if authors.is_empty() {
            return Ok(0);
        }
        let cards: Vec<CommenterCard> = authors
            .iter()
            .map(|author| {
                CommenterCard::new(&author.username, &self.avatar_base, &self.profile_base)
            })
            .collect();
        self.renderer.append(&cards).context("render commenters")?;
        for author in authors {
            self.rendered.insert(author.username);
        }
        Ok(cards.len())
    }
}
