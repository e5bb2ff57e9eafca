use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;

use crate::config;
use crate::feed::TextRenderer;
use crate::platform;
use crate::poller::Poller;
use crate::tracker::Session;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides `platform.project_id` from the config.
    pub project: Option<String>,
    /// Render the current history once and exit instead of polling.
    pub once: bool,
}

pub fn run(options: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let project_id = options
        .project
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| cfg.platform.project_id.clone());
    if project_id.trim().is_empty() {
        bail!(
            "project id required: set platform.project_id in {} or pass --project <id>",
            config::default_path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        );
    }

    let client = platform::Client::new(platform::ClientConfig {
        user_agent: cfg.platform.user_agent.clone(),
        base_url: Some(cfg.platform.base_url.clone()),
        page_size: Some(cfg.platform.page_size),
        http_client: None,
    })
    .context("build platform client")?;

    let renderer = Arc::new(TextRenderer::new(io::stdout()));
    let mut session = Session::new(
        project_id.clone(),
        Arc::new(client),
        renderer,
        cfg.wall.avatar_base.clone(),
        cfg.wall.profile_base.clone(),
    );

    let rendered = session.prime().context("initial comment load")?;
    eprintln!(
        "commenter-wall: watching project {} ({} commenters so far)",
        project_id, rendered
    );

    if options.once {
        return Ok(());
    }

    let session = Arc::new(Mutex::new(session));
    let mut poller = Poller::start(
        session,
        cfg.wall.poll_interval,
        Box::new(|err| eprintln!("commenter-wall: update failed: {err:#}")),
    );

    eprintln!(
        "commenter-wall: polling every {}; press Enter to stop",
        humantime::format_duration(cfg.wall.poll_interval)
    );
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    poller.shutdown();

    Ok(())
}
