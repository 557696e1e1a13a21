use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const JSON_FEED_VERSION_PREFIX: &str = "https://jsonfeed.org/version/";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed feed document")]
    Json(#[from] serde_json::Error),
    #[error("unsupported feed version {0:?}")]
    UnsupportedVersion(String),
    #[error("got an XML document; only JSON Feed is supported, not RSS or Atom")]
    Xml,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_parsed: Option<DateTime<Utc>>,
}

impl Item {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|person| person.name.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: String,
}

impl Feed {
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let start = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
        if start.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'<') {
            return Err(ParseError::Xml);
        }
        let wire: JsonFeed = serde_json::from_slice(body)?;
        if !wire.version.starts_with(JSON_FEED_VERSION_PREFIX) {
            return Err(ParseError::UnsupportedVersion(wire.version));
        }

        let feed_author = first_author(wire.author, wire.authors);
        let items = wire
            .items
            .into_iter()
            .map(|item| item.into_item(feed_author.as_ref()))
            .collect();

        Ok(Feed {
            title: wire.title.trim().to_string(),
            link: wire.home_page_url.filter(|url| !url.trim().is_empty()),
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Deserialize)]
struct JsonFeed {
    #[serde(default)]
    version: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    home_page_url: Option<String>,
    #[serde(default)]
    author: Option<JsonAuthor>,
    #[serde(default)]
    authors: Vec<JsonAuthor>,
    #[serde(default)]
    items: Vec<JsonItem>,
}

#[derive(Deserialize)]
struct JsonItem {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date_published: Option<String>,
    #[serde(default)]
    author: Option<JsonAuthor>,
    #[serde(default)]
    authors: Vec<JsonAuthor>,
}

#[derive(Clone, Deserialize)]
struct JsonAuthor {
    #[serde(default)]
    name: Option<String>,
}

impl JsonItem {
    fn into_item(self, feed_author: Option<&Person>) -> Item {
        let link = self
            .url
            .or(self.external_url)
            .or_else(|| match self.id {
                Some(serde_json::Value::String(id)) if id.starts_with("http") => Some(id),
                _ => None,
            })
            .unwrap_or_default();

        let published = self
            .date_published
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        let published_parsed = published.as_deref().and_then(parse_timestamp);

        Item {
            title: self.title.unwrap_or_default().trim().to_string(),
            author: first_author(self.author, self.authors).or_else(|| feed_author.cloned()),
            link,
            published,
            published_parsed,
        }
    }
}

// JSON Feed 1.1 replaced `author` with `authors`; prefer the newer field.
fn first_author(author: Option<JsonAuthor>, authors: Vec<JsonAuthor>) -> Option<Person> {
    authors
        .into_iter()
        .chain(author)
        .filter_map(|author| author.name)
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .map(|name| Person { name })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}
