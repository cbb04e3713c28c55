//! HTML rendering for the board page.
//!
//! The template is compiled into the binary. minijinja auto-escapes
//! templates ending in `.html`, so message content is always rendered as text.

use chrono::SecondsFormat;
use minijinja::Environment;
use serde::Serialize;

use crate::db::{Message, MAX_CONTENT_CHARS};

const INDEX: &str = "index.html";

/// Compiled page templates.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

/// Everything the board page shows.
#[derive(Debug, Serialize)]
pub struct BoardPage<'a> {
    pub app_name: &'a str,
    pub hostname: &'a str,
    pub messages: Vec<MessageView>,
    /// Inline notice shown when messages could not be loaded.
    pub notice: Option<&'a str>,
    pub max_chars: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub display_time: String,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            created_at: m.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            display_time: m.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            content: m.content,
        }
    }
}

impl Views {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(INDEX, include_str!("../templates/index.html"))?;
        Ok(Self { env })
    }

    pub fn board(&self, page: &BoardPage<'_>) -> Result<String, minijinja::Error> {
        self.env.get_template(INDEX)?.render(page)
    }
}

impl<'a> BoardPage<'a> {
    pub fn new(app_name: &'a str, hostname: &'a str, messages: Vec<Message>) -> Self {
        Self {
            app_name,
            hostname,
            messages: messages.into_iter().map(MessageView::from).collect(),
            notice: None,
            max_chars: MAX_CONTENT_CHARS,
        }
    }

    pub fn with_notice(mut self, notice: &'a str) -> Self {
        self.notice = Some(notice);
        self
    }
}
