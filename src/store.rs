use crate::document::{Document, DocumentId};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// Where the documents end up.
///
/// `write` must have upsert semantics: writing a document under an existing
/// id replaces it.
pub trait DocumentStore: Send + Sync {
    /// Creates the index with its mapping unless it exists already.
    fn ensure_schema(&self) -> Result<(), StoreError>;
    fn write(&self, id: &DocumentId, doc: &Document) -> Result<(), StoreError>;
}

fn mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "message_id": {"type": "keyword"},
                "user": {"type": "keyword"},
                "subject": {"type": "text"},
                "from": {"type": "keyword"},
                "to": {"type": "keyword"},
                "date": {"type": "date"},
                "body": {"type": "text"},
                "attachments": {
                    "type": "nested",
                    "properties": {
                        "filename": {"type": "text"},
                        "content_type": {"type": "keyword"},
                        "size": {"type": "integer"}
                    }
                }
            }
        }
    })
}

pub struct ElasticStore {
    client: Client,
    host: String,
    index: String,
}

impl ElasticStore {
    /// Builds a client and checks that the cluster answers.
    pub fn connect(host: &str, index: &str) -> Result<Self, StoreError> {
        let host = host.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|source| StoreError::Http {
                url: host.clone(),
                source,
            })?;
        let store = ElasticStore {
            client,
            host,
            index: index.to_string(),
        };
        let url = format!("{}/", store.host);
        let resp = store.client.get(&url).send();
        check(&url, resp)?;
        Ok(store)
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.host, self.index)
    }
}

fn check(url: &str, resp: reqwest::Result<Response>) -> Result<Response, StoreError> {
    let resp = resp.map_err(|source| StoreError::Http {
        url: url.to_string(),
        source,
    })?;
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(StoreError::Status {
            url: url.to_string(),
            status,
            body: resp.text().unwrap_or_default(),
        })
    }
}

impl DocumentStore for ElasticStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        let url = self.index_url();
        let exists = self
            .client
            .head(&url)
            .send()
            .map_err(|source| StoreError::Http {
                url: url.clone(),
                source,
            })?;
        if exists.status() == StatusCode::OK {
            tracing::debug!("index {} already exists", self.index);
            return Ok(());
        }
        tracing::info!("creating index {}", self.index);
        check(&url, self.client.put(&url).json(&mapping()).send())?;
        Ok(())
    }

    fn write(&self, id: &DocumentId, doc: &Document) -> Result<(), StoreError> {
        let url = format!("{}/_doc/{}", self.index_url(), id);
        check(&url, self.client.put(&url).json(doc).send())?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use crate::classify::email_at;
    use crate::document::to_document;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// A request as seen by `serve`: request line and body.
    type Recorded = (String, String);

    /// Answers one connection per entry of `responses`, in order, and
    /// returns the requests it got.
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut requests = vec![];
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut request_body = vec![0; content_length];
                reader.read_exact(&mut request_body).unwrap();
                requests.push((
                    request_line.trim_end().to_string(),
                    String::from_utf8(request_body).unwrap(),
                ));
                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {} Stub\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();
            }
            requests
        });
        (url, handle)
    }

    fn document() -> (Document, DocumentId) {
        let mut email = email_at("2020-01-01T00:00:00+00:00");
        email.message_id = "abc".to_string();
        to_document(&email)
    }

    #[test]
    fn test_mapping_fields() {
        let mapping = mapping();
        let props = &mapping["mappings"]["properties"];
        for (field, ty) in &[
            ("message_id", "keyword"),
            ("user", "keyword"),
            ("subject", "text"),
            ("from", "keyword"),
            ("to", "keyword"),
            ("date", "date"),
            ("body", "text"),
        ] {
            assert_eq!(props[field]["type"], *ty, "{}", field);
        }
        let attachments = &props["attachments"]["properties"];
        assert_eq!(attachments["filename"]["type"], "text");
        assert_eq!(attachments["content_type"]["type"], "keyword");
        assert_eq!(attachments["size"]["type"], "integer");
    }

    #[test]
    fn test_same_message_id_overwrites() {
        let store = MemoryStore::default();
        let mut email = email_at("2020-01-01T00:00:00+00:00");
        email.message_id = "abc".to_string();
        for subject in &["first", "second"] {
            email.subject = subject.to_string();
            let (doc, id) = to_document(&email);
            store.write(&id, &doc).unwrap();
        }
        let docs = store.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[&DocumentId::for_message_id("abc")];
        assert_eq!(doc.subject, "second");
    }

    #[test]
    fn test_existing_index_is_kept() {
        let (url, server) = serve(vec![(200, "{}"), (200, "")]);
        let store = ElasticStore::connect(&url, "mail-archive").unwrap();
        store.ensure_schema().unwrap();
        let requests = server.join().unwrap();
        let lines: Vec<_> = requests.iter().map(|(line, _)| line.as_str()).collect();
        assert_eq!(lines, vec!["GET / HTTP/1.1", "HEAD /mail-archive HTTP/1.1"]);
    }

    #[test]
    fn test_missing_index_is_created() {
        let (url, server) = serve(vec![(200, "{}"), (404, ""), (200, "{}")]);
        let store = ElasticStore::connect(&url, "mail-archive").unwrap();
        store.ensure_schema().unwrap();
        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].0, "HEAD /mail-archive HTTP/1.1");
        let (line, body) = &requests[2];
        assert_eq!(line, "PUT /mail-archive HTTP/1.1");
        assert_eq!(serde_json::from_str::<Value>(body).unwrap(), mapping());
    }

    #[test]
    fn test_write_puts_by_id() {
        let (url, server) = serve(vec![(200, "{}"), (201, "{}")]);
        let store = ElasticStore::connect(&url, "mail-archive").unwrap();
        let (doc, id) = document();
        store.write(&id, &doc).unwrap();
        let requests = server.join().unwrap();
        let (line, body) = &requests[1];
        assert_eq!(
            line,
            "PUT /mail-archive/_doc/\
             ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad HTTP/1.1"
        );
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, serde_json::to_value(&doc).unwrap());
    }

    #[test]
    fn test_error_status() {
        let (url, server) = serve(vec![
            (200, "{}"),
            (500, "boom"),
            (404, ""),
            (400, "bad mapping"),
        ]);
        let store = ElasticStore::connect(&url, "mail-archive").unwrap();
        let (doc, id) = document();
        match store.write(&id, &doc) {
            Err(StoreError::Status { status, body, .. }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result {:?}", other),
        }
        match store.ensure_schema() {
            Err(StoreError::Status { status, body, .. }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "bad mapping");
            }
            other => panic!("unexpected result {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_connect_rejected() {
        let (url, server) = serve(vec![(503, "starting")]);
        assert!(matches!(
            ElasticStore::connect(&url, "mail-archive"),
            Err(StoreError::Status { .. })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_connect_unreachable() {
        // Nothing listens on the discard port.
        assert!(ElasticStore::connect("http://127.0.0.1:9/", "mail-archive").is_err());
    }
}
