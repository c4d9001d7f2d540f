// src/service.rs
use crate::error::{ImgfsError, Result};
use crate::format::Resolution;
use crate::http_message::{build_reply, HttpMessage, HTTP_FOUND, HTTP_INTERNAL_ERROR, HTTP_OK};
use crate::http_server::RequestHandler;
use crate::imgfs::ImgFs;
use crate::list::ListMode;
use crate::web_assets;
use log::{debug, warn};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

pub const URI_ROOT: &str = "/imgfs";
pub const BASE_FILE: &str = "index.html";
pub const DEFAULT_LISTENING_PORT: u16 = 8000;

const LIST_URI: &str = "/imgfs/list";
const INSERT_URI: &str = "/imgfs/insert";
const READ_URI: &str = "/imgfs/read";
const DELETE_URI: &str = "/imgfs/delete";

const HTML_TYPE: &str = "Content-Type: text/html; charset=utf-8\r\n";
const JSON_TYPE: &str = "Content-Type: application/json\r\n";
const JPEG_TYPE: &str = "Content-Type: image/jpeg\r\n";

/// Routes HTTP requests onto a shared store.
///
/// Every route holds the store lock for exactly one storage call.
pub struct ImgfsService {
    store: Arc<Mutex<ImgFs>>,
    port: AtomicU16,
}

impl ImgfsService {
    pub fn new(store: Arc<Mutex<ImgFs>>, port: u16) -> Self {
        Self { store, port: AtomicU16::new(port) }
    }

    /// Port advertised in redirects; set once the listener is bound.
    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::Relaxed);
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Relaxed)
    }

    /// Full reply for `msg`. Failures become a 500 reply, never an `Err`.
    pub fn dispatch(&self, msg: &HttpMessage) -> Vec<u8> {
        match self.route(msg) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{} {}: {}", msg.method, msg.uri, e);
                reply_error(&e)
            }
        }
    }

    fn route(&self, msg: &HttpMessage) -> Result<Vec<u8>> {
        if msg.uri == "/" || msg.match_uri("/index.html") {
            return Ok(build_reply(HTTP_OK, HTML_TYPE, web_assets::INDEX_HTML.as_bytes()));
        }
        if msg.match_uri(LIST_URI) {
            return self.handle_list();
        }
        if msg.match_uri(INSERT_URI) && msg.match_verb("POST") {
            return self.handle_insert(msg);
        }
        if msg.match_uri(READ_URI) {
            return self.handle_read(msg);
        }
        if msg.match_uri(DELETE_URI) {
            return self.handle_delete(msg);
        }
        Err(ImgfsError::InvalidCommand)
    }

    fn with_store<T>(&self, op: impl FnOnce(&mut ImgFs) -> Result<T>) -> Result<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| ImgfsError::Threading(e.to_string()))?;
        op(&mut *store)
    }

    fn handle_list(&self) -> Result<Vec<u8>> {
        let json = self.with_store(|fs| fs.list(ListMode::Json))?;
        Ok(build_reply(HTTP_OK, JSON_TYPE, json.as_bytes()))
    }

    fn handle_read(&self, msg: &HttpMessage) -> Result<Vec<u8>> {
        let res = msg.get_var("res").ok_or(ImgfsError::NotEnoughArguments)?;
        let img_id = msg.get_var("img_id").ok_or(ImgfsError::NotEnoughArguments)?;
        let resolution: Resolution = res.parse()?;

        let image = self.with_store(|fs| fs.read(img_id, resolution))?;
        debug!("read '{}' ({}): {} bytes", img_id, resolution.suffix(), image.len());
        Ok(build_reply(HTTP_OK, JPEG_TYPE, &image))
    }

    fn handle_insert(&self, msg: &HttpMessage) -> Result<Vec<u8>> {
        let name = msg.get_var("name").ok_or(ImgfsError::NotEnoughArguments)?;
        self.with_store(|fs| fs.insert(&msg.body, name))?;
        debug!("insert '{}': {} bytes", name, msg.body.len());
        Ok(self.reply_302())
    }

    fn handle_delete(&self, msg: &HttpMessage) -> Result<Vec<u8>> {
        let img_id = msg.get_var("img_id").ok_or(ImgfsError::NotEnoughArguments)?;
        self.with_store(|fs| fs.delete(img_id))?;
        debug!("delete '{}'", img_id);
        Ok(self.reply_302())
    }

    fn reply_302(&self) -> Vec<u8> {
        let location = format!("Location: http://localhost:{}/{}\r\n", self.port(), BASE_FILE);
        build_reply(HTTP_FOUND, &location, b"")
    }
}

impl RequestHandler for ImgfsService {
    fn handle(&self, msg: &HttpMessage, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.dispatch(msg));
        Ok(())
    }
}

fn reply_error(err: &ImgfsError) -> Vec<u8> {
    let body = format!("Error: {}\n", err);
    build_reply(HTTP_INTERNAL_ERROR, "", body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Dimensions, ImgfsHeader};
    use crate::testutil::FakeCodec;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ImgfsService {
        let fs = ImgFs::create(
            dir.path().join("svc.imgfs"),
            ImgfsHeader::new(3, Dimensions::new(8, 8), Dimensions::new(16, 16)),
        )
        .unwrap()
        .with_codec(Box::new(FakeCodec));
        ImgfsService::new(Arc::new(Mutex::new(fs)), 8123)
    }

    fn request(method: &str, uri: &str, body: &[u8]) -> HttpMessage {
        HttpMessage {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
            body: Bytes::copy_from_slice(body),
        }
    }

    fn text(reply: &[u8]) -> String {
        String::from_utf8_lossy(reply).into_owned()
    }

    #[test]
    fn serves_index_page() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        for uri in ["/", "/index.html"] {
            let reply = text(&svc.dispatch(&request("GET", uri, b"")));
            assert!(reply.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n"));
            assert!(reply.contains("<html"));
        }
    }

    #[test]
    fn insert_list_read_delete() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let reply = svc.dispatch(&request("POST", "/imgfs/insert?name=cat", b"meow"));
        assert_eq!(
            reply,
            b"HTTP/1.1 302 Found\r\nLocation: http://localhost:8123/index.html\r\nContent-Length: 0\r\n\r\n"
        );

        let reply = svc.dispatch(&request("GET", "/imgfs/list", b""));
        assert_eq!(
            reply,
            build_reply(HTTP_OK, "Content-Type: application/json\r\n", br#"{"Images":["cat"]}"#)
        );

        let reply = svc.dispatch(&request("GET", "/imgfs/read?res=orig&img_id=cat", b""));
        assert_eq!(reply, build_reply(HTTP_OK, "Content-Type: image/jpeg\r\n", b"meow"));

        let reply = svc.dispatch(&request("GET", "/imgfs/read?img_id=cat&res=thumbnail", b""));
        assert_eq!(
            reply,
            build_reply(HTTP_OK, "Content-Type: image/jpeg\r\n", &FakeCodec::resized(b"meow", 8, 8))
        );

        let reply = text(&svc.dispatch(&request("GET", "/imgfs/delete?img_id=cat", b"")));
        assert!(reply.starts_with("HTTP/1.1 302 Found\r\n"));

        let reply = text(&svc.dispatch(&request("GET", "/imgfs/read?res=orig&img_id=cat", b"")));
        assert_eq!(
            reply,
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 23\r\n\r\nError: Image not found\n"
        );
    }

    #[test]
    fn insert_requires_post() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let reply = text(&svc.dispatch(&request("GET", "/imgfs/insert?name=cat", b"meow")));
        assert!(reply.ends_with("Error: Invalid command\n"));
    }

    #[test]
    fn missing_and_bad_parameters() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        for uri in ["/imgfs/read?img_id=x", "/imgfs/read?res=orig", "/imgfs/delete", "/imgfs/delete?img_id="] {
            let reply = text(&svc.dispatch(&request("GET", uri, b"")));
            assert!(reply.ends_with("Error: Not enough arguments\n"), "{}: {}", uri, reply);
        }
        let reply = text(&svc.dispatch(&request("POST", "/imgfs/insert", b"x")));
        assert!(reply.ends_with("Error: Not enough arguments\n"));

        let reply = text(&svc.dispatch(&request("GET", "/imgfs/read?res=huge&img_id=x", b"")));
        assert!(reply.ends_with("Error: Invalid resolution(s)\n"));
    }

    #[test]
    fn storage_errors_become_500() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.dispatch(&request("POST", "/imgfs/insert?name=a", b"1"));
        let reply = text(&svc.dispatch(&request("POST", "/imgfs/insert?name=a", b"2")));
        assert!(reply.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(reply.ends_with("Error: Existing image ID\n"));

        let reply = text(&svc.dispatch(&request("GET", "/imgfs/delete?img_id=zzz", b"")));
        assert!(reply.ends_with("Error: Image not found\n"));
    }

    #[test]
    fn unknown_route() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let reply = text(&svc.dispatch(&request("GET", "/favicon.ico", b"")));
        assert!(reply.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(reply.ends_with("Error: Invalid command\n"));
    }

    #[test]
    fn poisoned_lock_is_a_threading_error() {
        let dir = TempDir::new().unwrap();
        let svc = Arc::new(service(&dir));
        let poison = Arc::clone(&svc);
        let _ = std::thread::spawn(move || {
            let _guard = poison.store.lock().unwrap();
            panic!("poison the store lock");
        })
        .join();

        let reply = text(&svc.dispatch(&request("GET", "/imgfs/list", b"")));
        assert!(reply.contains("Error: Threading error"));
    }

    #[test]
    fn redirect_follows_bound_port() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.set_port(9001);
        let reply = text(&svc.dispatch(&request("POST", "/imgfs/insert?name=p", b"x")));
        assert!(reply.contains("Location: http://localhost:9001/index.html\r\n"));
    }
}
