use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Method, StatusCode};

use crate::config::FeedConfig;
use crate::error::RefreshError;
use crate::feed::Feed;
use crate::state::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    NotModified,
    Updated,
}

pub fn client(cfg: &FeedConfig) -> Result<Client> {
    Client::builder()
        .timeout(cfg.timeout)
        .user_agent(cfg.user_agent.clone())
        .build()
        .context("build feed HTTP client")
}

// The record is only touched once the response has been read and parsed.
pub fn refresh(client: &Client, record: &mut Record) -> Result<Refresh, RefreshError> {
    let url = record.url().to_string();
    let mut request = client.request(Method::GET, &url);

    // Without a snapshot a 304 would leave nothing to show.
    if record.feed().is_some() {
        if let Some(etag) = record.etag() {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = record.last_modified() {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }
    } else if record.etag().is_some() || record.last_modified().is_some() {
        tracing::debug!(url = %url, "cached validators without a feed, fetching unconditionally");
    }

    let response = request.send().map_err(|source| RefreshError::Network {
        url: url.clone(),
        source,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        tracing::debug!(url = %url, "feed not modified");
        return Ok(Refresh::NotModified);
    }
    if status != StatusCode::OK {
        return Err(RefreshError::HttpStatus {
            method: Method::GET.to_string(),
            url,
            status,
        });
    }

    let etag = header_value(response.headers(), &ETAG);
    let last_modified = header_value(response.headers(), &LAST_MODIFIED);
    let body = response.bytes().map_err(|source| RefreshError::Network {
        url: url.clone(),
        source,
    })?;
    let feed = Feed::parse(&body).map_err(|source| RefreshError::Parse {
        url: url.clone(),
        source,
    })?;

    tracing::debug!(
        url = %url,
        items = feed.len(),
        etag = etag.as_deref().unwrap_or_default(),
        "feed updated"
    );

    if let Some(etag) = etag {
        record.etag = Some(etag);
    }
    if let Some(last_modified) = last_modified {
        record.last_modified = Some(last_modified);
    }
    record.feed = Some(feed);

    Ok(Refresh::Updated)
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Item;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tiny_http::{Header, Response, Server};

    const THREE_ITEMS: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "title": "alice",
        "items": [
            { "id": "1", "url": "https://example.com/1", "title": "one" },
            { "id": "2", "url": "https://example.com/2", "title": "two" },
            { "id": "3", "url": "https://example.com/3", "title": "three" }
        ]
    }"#;

    const ONE_ITEM: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "items": [{ "id": "9", "url": "https://example.com/9", "title": "nine" }]
    }"#;

    struct Reply {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: &'static str,
    }

    impl Reply {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body,
            }
        }

        fn header(mut self, name: &'static str, value: &'static str) -> Self {
            self.headers.push((name, value));
            self
        }
    }

    #[derive(Debug)]
    struct Seen {
        path: String,
        headers: Vec<(String, String)>,
    }

    impl Seen {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value.as_str())
        }
    }

    fn serve(reply: Reply) -> (String, mpsc::Receiver<Seen>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let seen = Seen {
                    path: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string().to_ascii_lowercase(), h.value.to_string()))
                        .collect(),
                };
                let mut response = Response::from_string(reply.body).with_status_code(reply.status);
                for (name, value) in reply.headers {
                    response.add_header(Header::from_bytes(name, value).unwrap());
                }
                let _ = request.respond(response);
                let _ = tx.send(seen);
            }
        });
        (format!("http://{addr}/@{{username}}.json"), rx)
    }

    fn test_client() -> Client {
        client(&FeedConfig {
            timeout: Duration::from_secs(5),
            ..FeedConfig::default()
        })
        .unwrap()
    }

    fn cached_record(template: &str) -> Record {
        let mut record = Record::new("alice", template);
        record.etag = Some("\"v1\"".into());
        record.last_modified = Some("Wed, 21 Oct 2015 07:28:00 GMT".into());
        record.feed = Some(Feed {
            title: "alice".into(),
            link: None,
            items: (1..=3)
                .map(|n| Item {
                    title: format!("cached {n}"),
                    link: format!("https://example.com/{n}"),
                    ..Item::default()
                })
                .collect(),
        });
        record
    }

    #[test]
    fn fresh_record_is_filled_from_ok_response() {
        let (template, seen) = serve(Reply::new(200, THREE_ITEMS).header("ETag", "\"v1\""));
        let mut record = Record::new("alice", &template);

        let outcome = refresh(&test_client(), &mut record).unwrap();

        assert_eq!(outcome, Refresh::Updated);
        assert_eq!(record.etag(), Some("\"v1\""));
        assert!(record.last_modified().is_none());
        let titles: Vec<_> = record
            .feed()
            .unwrap()
            .items
            .iter()
            .map(|item| item.title.clone())
            .collect();
        assert_eq!(titles, ["one", "two", "three"]);

        let seen = seen.recv().unwrap();
        assert_eq!(seen.path, "/@alice.json");
        assert!(seen.header("if-none-match").is_none());
        assert!(seen.header("if-modified-since").is_none());
    }

    #[test]
    fn not_modified_leaves_record_untouched() {
        let (template, seen) = serve(Reply::new(304, "").header("ETag", "\"v2\""));
        let mut record = cached_record(&template);
        let before = record.clone();

        let outcome = refresh(&test_client(), &mut record).unwrap();

        assert_eq!(outcome, Refresh::NotModified);
        assert_eq!(record, before);
        let seen = seen.recv().unwrap();
        assert_eq!(seen.header("if-none-match"), Some("\"v1\""));
        assert_eq!(
            seen.header("if-modified-since"),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn ok_response_replaces_validators_and_snapshot() {
        let (template, _seen) = serve(
            Reply::new(200, ONE_ITEM)
                .header("ETag", "  \"v2\"  ")
                .header("Last-Modified", "Thu, 22 Oct 2015 07:28:00 GMT"),
        );
        let mut record = cached_record(&template);

        refresh(&test_client(), &mut record).unwrap();

        assert_eq!(record.etag(), Some("\"v2\""));
        assert_eq!(record.last_modified(), Some("Thu, 22 Oct 2015 07:28:00 GMT"));
        assert_eq!(record.feed().unwrap().items.len(), 1);
        assert_eq!(record.feed().unwrap().items[0].title, "nine");
        assert_eq!(record.username(), "alice");
    }

    #[test]
    fn missing_validators_do_not_clear_known_ones() {
        let (template, _seen) = serve(Reply::new(200, ONE_ITEM));
        let mut record = cached_record(&template);

        refresh(&test_client(), &mut record).unwrap();

        assert_eq!(record.etag(), Some("\"v1\""));
        assert_eq!(record.last_modified(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(record.feed().unwrap().items[0].title, "nine");
    }

    #[test]
    fn unexpected_status_is_reported_and_record_kept() {
        for status in [404u16, 500, 201] {
            let (template, _seen) = serve(Reply::new(status, ONE_ITEM).header("ETag", "\"v9\""));
            let mut record = cached_record(&template);
            let before = record.clone();

            let err = refresh(&test_client(), &mut record).unwrap_err();

            assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
            assert!(err.to_string().contains(&status.to_string()));
            assert!(err.to_string().contains("GET"));
            assert_eq!(record, before);
        }
    }

    #[test]
    fn parse_failure_keeps_old_snapshot() {
        let (template, _seen) = serve(Reply::new(200, "<html>oops</html>").header("ETag", "\"v9\""));
        let mut record = cached_record(&template);
        let before = record.clone();

        let err = refresh(&test_client(), &mut record).unwrap_err();

        assert!(matches!(err, RefreshError::Parse { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn connection_failure_is_network_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut record = cached_record(&format!("http://127.0.0.1:{port}/@{{username}}.json"));
        let before = record.clone();

        let err = refresh(&test_client(), &mut record).unwrap_err();

        assert!(matches!(err, RefreshError::Network { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn deadline_expiry_is_network_error() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        thread::spawn(move || {
            if let Ok(request) = server.recv() {
                thread::sleep(Duration::from_secs(2));
                drop(request);
            }
        });
        let http = client(&FeedConfig {
            timeout: Duration::from_millis(200),
            ..FeedConfig::default()
        })
        .unwrap();
        let mut record = Record::new("alice", &format!("http://{addr}/@{{username}}.json"));

        let err = refresh(&http, &mut record).unwrap_err();

        assert!(matches!(err, RefreshError::Network { .. }));
        assert!(record.feed().is_none());
    }

    #[test]
    fn validators_skipped_without_snapshot() {
        let (template, seen) = serve(Reply::new(200, ONE_ITEM));
        let mut record = Record::new("alice", &template);
        record.etag = Some("\"stale\"".into());

        refresh(&test_client(), &mut record).unwrap();

        let seen = seen.recv().unwrap();
        assert!(seen.header("if-none-match").is_none());
        assert_eq!(record.etag(), Some("\"stale\""));
        assert!(record.feed().is_some());
    }
}
