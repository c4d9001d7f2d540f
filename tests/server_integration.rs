// tests/server_integration.rs
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imgfs::http_server::HttpServer;
use imgfs::service::ImgfsService;
use imgfs::{Dimensions, ImgFs, ImgfsHeader};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<imgfs::Result<()>>,
    _dir: TempDir,
}

struct Reply {
    status: String,
    head: String,
    body: Vec<u8>,
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

async fn start() -> Running {
    let dir = TempDir::new().unwrap();
    let fs = ImgFs::create(
        dir.path().join("server.imgfs"),
        ImgfsHeader::new(8, Dimensions::new(32, 32), Dimensions::new(96, 96)),
    )
    .unwrap();

    let service = Arc::new(ImgfsService::new(Arc::new(Mutex::new(fs)), 0));
    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), service.clone()).unwrap();
    let addr = server.local_addr().unwrap();
    service.set_port(addr.port());

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve_until(async move {
        let _ = stopped.await;
    }));
    Running { addr, stop, task, _dir: dir }
}

async fn send(addr: SocketAddr, raw: &[u8]) -> Reply {
    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(raw).await.unwrap();
    let mut reply = Vec::new();
    conn.read_to_end(&mut reply).await.unwrap();

    let split = reply
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("reply has a header terminator");
    let head = String::from_utf8(reply[..split].to_vec()).unwrap();
    let body = reply[split + 4..].to_vec();
    let status = head.lines().next().unwrap_or_default().to_string();
    Reply { status, head, body }
}

async fn get(addr: SocketAddr, uri: &str) -> Reply {
    send(addr, format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", uri).as_bytes()).await
}

async fn post(addr: SocketAddr, uri: &str, body: &[u8]) -> Reply {
    let mut raw = format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        uri,
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(body);
    send(addr, &raw).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_image_lifecycle_over_http() {
    let server = start().await;
    let addr = server.addr;
    let original = jpeg(300, 150);

    let reply = get(addr, "/imgfs/list").await;
    assert_eq!(reply.status, "HTTP/1.1 200 OK");
    assert!(reply.head.contains("Content-Type: application/json"));
    assert_eq!(reply.body, br#"{"Images":[]}"#);

    let reply = post(addr, "/imgfs/insert?name=landscape", &original).await;
    assert_eq!(reply.status, "HTTP/1.1 302 Found");
    assert!(reply
        .head
        .contains(&format!("Location: http://localhost:{}/index.html", addr.port())));

    let reply = get(addr, "/imgfs/list").await;
    assert_eq!(reply.body, br#"{"Images":["landscape"]}"#);

    let reply = get(addr, "/imgfs/read?res=original&img_id=landscape").await;
    assert_eq!(reply.status, "HTTP/1.1 200 OK");
    assert!(reply.head.contains("Content-Type: image/jpeg"));
    assert_eq!(reply.body, original);

    let reply = get(addr, "/imgfs/read?res=small&img_id=landscape").await;
    let small = image::load_from_memory(&reply.body).unwrap();
    assert_eq!((small.width(), small.height()), (96, 48));

    // Second read is served from the cache and is byte-identical.
    let again = get(addr, "/imgfs/read?res=small&img_id=landscape").await;
    assert_eq!(again.body, reply.body);

    let reply = get(addr, "/imgfs/delete?img_id=landscape").await;
    assert_eq!(reply.status, "HTTP/1.1 302 Found");

    let reply = get(addr, "/imgfs/read?res=orig&img_id=landscape").await;
    assert_eq!(reply.status, "HTTP/1.1 500 Internal Server Error");
    assert_eq!(reply.body, b"Error: Image not found\n");

    server.stop.send(()).unwrap();
    server.task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn errors_and_static_page() {
    let server = start().await;
    let addr = server.addr;

    let reply = get(addr, "/").await;
    assert_eq!(reply.status, "HTTP/1.1 200 OK");
    assert!(reply.head.contains("Content-Type: text/html; charset=utf-8"));

    let reply = get(addr, "/nowhere").await;
    assert_eq!(reply.body, b"Error: Invalid command\n");

    let reply = post(addr, "/imgfs/insert?name=broken", b"not a jpeg").await;
    assert_eq!(reply.status, "HTTP/1.1 500 Internal Server Error");
    assert!(reply.body.starts_with(b"Error: Image library error"));

    let reply = get(addr, "/imgfs/list").await;
    assert_eq!(reply.body, br#"{"Images":[]}"#);

    // A malformed request only costs its own connection.
    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"GET / HTTP/0.9\r\n\r\n").await.unwrap();
    let mut nothing = Vec::new();
    conn.read_to_end(&mut nothing).await.unwrap();
    assert!(nothing.is_empty());

    let reply = get(addr, "/imgfs/list").await;
    assert_eq!(reply.status, "HTTP/1.1 200 OK");

    server.stop.send(()).unwrap();
    server.task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_are_serialized() {
    let server = start().await;
    let addr = server.addr;

    let mut clients = Vec::new();
    for i in 0..6u32 {
        clients.push(tokio::spawn(async move {
            let body = jpeg(40 + i, 20);
            post(addr, &format!("/imgfs/insert?name=img{}", i), &body).await.status
        }));
    }
    for client in clients {
        assert_eq!(client.await.unwrap(), "HTTP/1.1 302 Found");
    }

    let reply = get(addr, "/imgfs/list").await;
    let listed: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(listed["Images"].as_array().unwrap().len(), 6);

    server.stop.send(()).unwrap();
    server.task.await.unwrap().unwrap();
}
