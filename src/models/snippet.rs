use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Name given to snippets saved without one
pub const UNTITLED: &str = "Untitled";

const ID_PREFIX: &str = "snippet";
const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static GENERATED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^snippet-\d+-[0-9a-z]+$").expect("valid id pattern"));

/// A stored snippet: a named bundle of markup, style and script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub name: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial snippet accepted by `save` and `import_all`.
///
/// Missing or empty `id` and `name` are filled in when the draft is stamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnippetDraft {
    pub id: Option<String>,
    pub name: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields an update may overwrite. There is no `id` field, so an update can
/// never re-key a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnippetPatch {
    pub name: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Snippet {
    /// Byte length of all three text blobs
    pub fn content_len(&self) -> usize {
        self.html.len() + self.css.len() + self.js.len()
    }

    pub fn get_line_count(&self) -> usize {
        self.html.lines().count() + self.css.lines().count() + self.js.lines().count()
    }

    /// Shallow merge of `patch` over this record, returned as a draft that
    /// keeps the current id.
    pub fn merged_with(&self, patch: SnippetPatch) -> SnippetDraft {
        SnippetDraft {
            id: Some(self.id.clone()),
            name: Some(patch.name.unwrap_or_else(|| self.name.clone())),
            html: Some(patch.html.unwrap_or_else(|| self.html.clone())),
            css: Some(patch.css.unwrap_or_else(|| self.css.clone())),
            js: Some(patch.js.unwrap_or_else(|| self.js.clone())),
            created_at: Some(patch.created_at.unwrap_or(self.created_at)),
            updated_at: None,
        }
    }
}

impl SnippetDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    /// Fill in every missing field and produce the record to persist.
    ///
    /// `updated_at` is always `now`, except that it never falls behind
    /// `created_at`.
    pub fn stamp(self, now: DateTime<Utc>) -> Snippet {
        let id = non_empty(self.id).unwrap_or_else(|| generate_id(now));
        let name = non_empty(self.name).unwrap_or_else(|| UNTITLED.to_string());
        let created_at = self.created_at.unwrap_or(now);

        Snippet {
            id,
            name,
            html: self.html.unwrap_or_default(),
            css: self.css.unwrap_or_default(),
            js: self.js.unwrap_or_default(),
            created_at,
            updated_at: now.max(created_at),
        }
    }
}

impl From<Snippet> for SnippetDraft {
    fn from(snippet: Snippet) -> Self {
        Self {
            id: Some(snippet.id),
            name: Some(snippet.name),
            html: Some(snippet.html),
            css: Some(snippet.css),
            js: Some(snippet.js),
            created_at: Some(snippet.created_at),
            updated_at: Some(snippet.updated_at),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Generate a new id of the form `snippet-<millis>-<base36 suffix>`
pub fn generate_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{}-{}-{}", ID_PREFIX, now.timestamp_millis(), suffix)
}

/// Whether `id` has the shape produced by [`generate_id`]
pub fn is_generated_id(id: &str) -> bool {
    GENERATED_ID.is_match(id)
}

/// Current time, nudged forward so it is strictly after `previous`
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
