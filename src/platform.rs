use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://websim.ai/";
pub const DEFAULT_AVATAR_BASE: &str = "https://images.websim.ai/avatar";
pub const DEFAULT_PROFILE_BASE: &str = "https://websim.ai";

/// The API rejects `first` values above this.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never completed or the server refused it.
    #[error("comment feed request failed: {0}")]
    Network(String),
    /// A body arrived but did not match the expected shape.
    #[error("comment feed response malformed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub page_size: Option<u32>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    page_size: u32,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("platform client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };
        let page_size = config
            .page_size
            .unwrap_or(MAX_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            page_size,
        })
    }

    /// Fetch one page of comments, starting after `cursor` when given.
    pub fn fetch_page(&self, project_id: &str, cursor: Option<&str>) -> Result<Page, FetchError> {
        let path = format!("api/v1/projects/{}/comments", project_id);
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|err| FetchError::Network(err.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(cursor) = cursor {
                pairs.append_pair("after", cursor);
            }
            pairs.append_pair("first", &self.page_size.to_string());
        }

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FetchError::Network(format!("{}: {}", status, body)));
        }

        let envelope: CommentsEnvelope = resp
            .json()
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(envelope.comments)
    }

    /// Lazy walk of the full cursor chain, one request per yielded page.
    /// Each call starts over from the beginning of the feed.
    pub fn pages<'a>(&'a self, project_id: &'a str) -> Pages<'a> {
        Pages {
            client: self,
            project_id,
            cursor: None,
            done: false,
        }
    }

    /// Full history: every page's `data`, concatenated in fetch order.
    pub fn fetch_all_comments(&self, project_id: &str) -> Result<Vec<CommentNode>, FetchError> {
        let mut all = Vec::new();
        for page in self.pages(project_id) {
            all.extend(page?.data);
        }
        Ok(all)
    }
}

pub struct Pages<'a> {
    client: &'a Client,
    project_id: &'a str,
    cursor: Option<String>,
    done: bool,
}

impl Iterator for Pages<'_> {
    type Item = Result<Page, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = match self.client.fetch_page(self.project_id, self.cursor.as_deref()) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if page.meta.has_next_page {
            self.cursor = Some(page.meta.end_cursor.clone());
        } else {
            self.done = true;
        }
        Some(Ok(page))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommentsEnvelope {
    comments: Page,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub data: Vec<CommentNode>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: String,
}

/// Feed items wrap each comment in a one-field node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    pub comment: Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub parent_comment_id: Option<String>,
    /// Rich-text tree; carried opaquely, the tracker never looks inside.
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub reply_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub fn avatar_url(avatar_base: &str, username: &str) -> String {
    format!("{}/{}", avatar_base.trim_end_matches('/'), username)
}

pub fn profile_url(profile_base: &str, username: &str) -> String {
    format!("{}/@{}", profile_base.trim_end_matches('/'), username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn page_body(usernames: &[(&str, &str)], has_next: bool, cursor: &str) -> String {
        let data: Vec<serde_json::Value> = usernames
            .iter()
            .enumerate()
            .map(|(i, (user, at))| {
                serde_json::json!({
                    "comment": {
                        "id": format!("c{}", i),
                        "created_at": at,
                        "author": { "username": user },
                        "content": { "type": "doc" },
                        "reply_count": 0,
                    }
                })
            })
            .collect();
        serde_json::json!({
            "comments": {
                "data": data,
                "meta": { "has_next_page": has_next, "end_cursor": cursor }
            }
        })
        .to_string()
    }

    fn spawn_feed(bodies: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind fixture server");
        let addr = server.server_addr();
        let handle = thread::spawn(move || {
            let mut urls = Vec::new();
            for (status, body) in bodies {
                let request = server.recv().expect("fixture recv");
                urls.push(request.url().to_string());
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"application/json"[..],
                        )
                        .unwrap(),
                    );
                let _ = request.respond(response);
            }
            urls
        });
        (format!("http://{}/", addr), handle)
    }

    fn client_for(base: String) -> Client {
        Client::new(ClientConfig {
            user_agent: "commenter-wall-test/0".into(),
            base_url: Some(base),
            page_size: Some(2),
            http_client: None,
        })
        .unwrap()
    }

    #[test]
    fn fetch_page_threads_cursor_and_page_size() {
        let (base, handle) = spawn_feed(vec![(
            200,
            page_body(&[("ada", "2024-01-01T00:00:00Z")], false, "end"),
        )]);
        let client = client_for(base);
        let page = client.fetch_page("proj", Some("abc")).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(!page.meta.has_next_page);

        let urls = handle.join().unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("/api/v1/projects/proj/comments"));
        assert!(urls[0].contains("after=abc"));
        assert!(urls[0].contains("first=2"));
    }

    #[test]
    fn fetch_all_walks_every_page_once() {
        let (base, handle) = spawn_feed(vec![
            (200, page_body(&[("ada", "2024-01-01T00:00:00Z")], true, "p1")),
            (200, page_body(&[("brin", "2024-01-02T00:00:00Z")], true, "p2")),
            (200, page_body(&[("cori", "2024-01-03T00:00:00Z")], false, "p3")),
        ]);
        let client = client_for(base);
        let nodes = client.fetch_all_comments("proj").unwrap();
        let authors: Vec<String> = nodes
            .iter()
            .filter_map(|node| node.comment.author.as_ref())
            .map(|author| author.username.clone())
            .collect();
        assert_eq!(authors, vec!["ada", "brin", "cori"]);

        let urls = handle.join().unwrap();
        assert_eq!(urls.len(), 3, "one request per page");
        assert!(!urls[0].contains("after="));
        assert!(urls[1].contains("after=p1"));
        assert!(urls[2].contains("after=p2"));
    }

    #[test]
    fn server_error_is_a_network_error() {
        let (base, handle) = spawn_feed(vec![(503, "unavailable".into())]);
        let client = client_for(base);
        let err = client.fetch_page("proj", None).unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
        handle.join().unwrap();
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let (base, handle) = spawn_feed(vec![(200, "{\"not\": \"comments\"}".into())]);
        let client = client_for(base);
        let err = client.fetch_page("proj", None).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
        handle.join().unwrap();
    }

    #[test]
    fn missing_author_decodes_as_none() {
        let body = serde_json::json!({
            "comments": {
                "data": [ { "comment": {
                    "id": "c0",
                    "created_at": "2024-01-01T00:00:00Z",
                    "reply_count": 3,
                } } ],
                "meta": { "has_next_page": false, "end_cursor": "" }
            }
        })
        .to_string();
        let (base, handle) = spawn_feed(vec![(200, body)]);
        let client = client_for(base);
        let page = client.fetch_page("proj", None).unwrap();
        assert!(page.data[0].comment.author.is_none());
        assert_eq!(page.data[0].comment.reply_count, 3);
        handle.join().unwrap();
    }

    #[test]
    fn url_helpers_join_cleanly() {
        assert_eq!(
            avatar_url("https://images.websim.ai/avatar/", "ada"),
            "https://images.websim.ai/avatar/ada"
        );
        assert_eq!(profile_url(DEFAULT_PROFILE_BASE, "ada"), "https://websim.ai/@ada");
    }

    #[test]
    fn page_size_is_clamped() {
        let client = Client::new(ClientConfig {
            user_agent: "test/0".into(),
            base_url: None,
            page_size: Some(500),
            http_client: None,
        })
        .unwrap();
        assert_eq!(client.page_size, MAX_PAGE_SIZE);
    }
}
