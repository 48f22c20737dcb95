// SPDX-License-Identifier: MPL-2.0

//! In-process stand-in for the blogging API.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tiny_http::{Header, Response, Server};

/// A request as the fake server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

type Handler = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

pub struct FakeApi {
    server: Arc<Server>,
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    worker: Option<JoinHandle<()>>,
}

impl FakeApi {
    /// Serve `handler(method, path)` on an ephemeral local port
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake api"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("fake api listens on tcp");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let worker = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let (path, query) = match request.url().split_once('?') {
                        Some((path, query)) => (path.to_string(), Some(query.to_string())),
                        None => (request.url().to_string(), None),
                    };
                    let authorization = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string());
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let method = request.method().to_string();

                    let (status, reply) = handler(&method, &path);
                    requests.lock().unwrap().push(Recorded {
                        method,
                        path,
                        query,
                        authorization,
                        body,
                    });

                    let content_type =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .unwrap();
                    let response = Response::from_string(reply)
                        .with_status_code(status)
                        .with_header(content_type);
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            url: format!("http://{addr}/"),
            requests,
            worker: Some(worker),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests matching `method` and `path`
    pub fn hits(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn ok(value: Value) -> (u16, String) {
    (200, value.to_string())
}

pub fn no_content() -> (u16, String) {
    (204, String::new())
}

pub fn not_found() -> (u16, String) {
    (404, json!({ "message": "no such route" }).to_string())
}

pub fn user_json(id: &str, username: &str) -> Value {
    json!({
        "_id": id,
        "name": format!("{username} name"),
        "username": username,
        "email": format!("{username}@example.com"),
    })
}

pub fn post_json(id: &str, title: &str, likes: &[&str]) -> Value {
    json!({
        "_id": id,
        "title": title,
        "body": format!("{title} body"),
        "author": "u-author",
        "image": null,
        "postedAt": "09:30",
        "postedOn": "2024-05-01",
        "comments": [{
            "_id": format!("{id}-c1"),
            "text": "first",
            "author": "u-other",
            "postedAt": "09:31",
            "likes": likes,
        }],
        "views": ["u-other"],
        "likes": likes,
    })
}

pub fn auth_json(token: &str, user: Value) -> Value {
    json!({ "token": token, "user": user })
}
