use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};

use crate::config;
use crate::error::UsageError;
use crate::navigator::Activation;
use crate::refresh::{self, Refresh};
use crate::state::{Record, Store};
use crate::ui;

pub fn run(username: &str) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;

    let store = Store::new(cfg.cache.dir());
    let mut record = store.load_or_create(username, &cfg.feed.url_template);

    let client = refresh::client(&cfg.feed)?;
    match refresh::refresh(&client, &mut record).context("Couldn't refresh the feed")? {
        Refresh::NotModified => tracing::info!(username, "feed unchanged, using cached copy"),
        Refresh::Updated => tracing::info!(username, "feed downloaded"),
    }

    let saver = persist_in_background(store, record.clone());

    let activation = if cfg.ui.activate_on_move {
        Activation::OnMove
    } else {
        Activation::Explicit
    };
    let model = ui::Model::new(ui::Options {
        username: username.to_string(),
        feed: record.into_feed().unwrap_or_default(),
        labels: cfg.ui.labels,
        activation,
        browser: ui::SystemBrowser,
    });
    let result = model.run();

    // Give an unfinished save the chance to land before the process exits.
    if saver.join().is_err() {
        tracing::warn!(username, "feed cache writer panicked");
    }

    result
}

fn persist_in_background(store: Store, record: Record) -> JoinHandle<()> {
    thread::spawn(move || match store.save(&record) {
        Ok(path) => tracing::debug!(path = %path.display(), "saved feed cache"),
        Err(err) => tracing::warn!(error = ?err, "Couldn't save the feed cache to disk"),
    })
}

pub fn parse_username<I>(args: I) -> Result<String, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let raw = args.next().ok_or(UsageError::MissingUsername)?;
    if let Some(extra) = args.next() {
        return Err(UsageError::UnexpectedArgument(extra));
    }

    let username = raw.strip_prefix('@').unwrap_or(&raw);
    if username.is_empty() {
        return Err(UsageError::EmptyUsername);
    }
    // The username becomes part of a file name in a shared directory.
    let invalid = username.starts_with('-')
        || username == "."
        || username == ".."
        || username
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
    if invalid {
        return Err(UsageError::InvalidUsername(raw));
    }

    Ok(username.to_string())
}
