use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::io::Cursor;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9500);

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct CycleStarted {
    cycle: u64,
    source: String,
}

#[derive(Debug, Deserialize)]
struct Prompt {
    id: u64,
    kind: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct CycleRecord {
    id: u64,
    source: String,
    status: String,
}

struct TestServer {
    child: Child,
    port: u16,
    // Keeps the gallery alive for the lifetime of the server
    _gallery: TempDir,
}

impl TestServer {
    fn start(extra_args: &[&str]) -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let gallery = tempfile::tempdir().expect("Failed to create gallery dir");

        let child = Command::new(env!("CARGO_BIN_EXE_grayscale-shell"))
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .args(["--gallery-dir", gallery.path().to_str().unwrap()])
            .args(extra_args)
            .spawn()
            .expect("Failed to start server");

        let server = Self {
            child,
            port,
            _gallery: gallery,
        };
        server.wait_until_ready();
        server
    }

    fn wait_until_ready(&self) {
        let addr = format!("127.0.0.1:{}", self.port);
        for _ in 0..100 {
            if std::net::TcpStream::connect(&addr).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("Server on port {} never came up", self.port);
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn primaries_png() -> Vec<u8> {
    let mut img = RgbImage::new(2, 2);
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    img.put_pixel(1, 0, Rgb([0, 255, 0]));
    img.put_pixel(0, 1, Rgb([0, 0, 255]));
    img.put_pixel(1, 1, Rgb([255, 255, 255]));

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

async fn trigger(client: &reqwest::Client, base_url: &str, source: &str) -> CycleStarted {
    let response = client
        .post(format!("{}/{}", base_url, source))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    response.json().await.expect("Failed to parse response")
}

async fn wait_for_prompt(client: &reqwest::Client, base_url: &str, kind: &str) -> Prompt {
    for _ in 0..200 {
        let prompts: Vec<Prompt> = client
            .get(format!("{}/prompts", base_url))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response");
        if let Some(prompt) = prompts.into_iter().find(|p| p.kind == kind) {
            return prompt;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("No {} prompt appeared", kind);
}

async fn wait_for_cycle(client: &reqwest::Client, base_url: &str, cycle: u64) -> CycleRecord {
    for _ in 0..200 {
        let record: CycleRecord = client
            .get(format!("{}/cycles/{}", base_url, cycle))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response");
        if record.status != "pending" {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Cycle {} never finished", cycle);
}

async fn display_status(client: &reqwest::Client, base_url: &str) -> StatusCode {
    client
        .get(format!("{}/display", base_url))
        .send()
        .await
        .expect("Failed to send request")
        .status()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(&["--skip-startup-check"]);
    let client = reqwest::Client::new();

    let response: HealthResponse = client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
}

#[tokio::test]
async fn test_camera_capture_is_displayed_in_grayscale() {
    let server = TestServer::start(&["--pre-grant", "camera,storage-read"]);
    let client = reqwest::Client::new();
    let base_url = server.base_url();

    assert_eq!(display_status(&client, &base_url).await, StatusCode::NO_CONTENT);

    let started = trigger(&client, &base_url, "camera").await;
    assert_eq!(started.source, "camera");

    let prompt = wait_for_prompt(&client, &base_url, "camera").await;
    let part = Part::bytes(primaries_png())
        .file_name("frame.png")
        .mime_str("image/png")
        .unwrap();
    let response = client
        .post(format!("{}/prompts/{}", base_url, prompt.id))
        .multipart(Form::new().part("file", part))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let record = wait_for_cycle(&client, &base_url, started.cycle).await;
    assert_eq!(record.status, "displayed");

    let response = client
        .get(format!("{}/display", base_url))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let bytes = response.bytes().await.unwrap();
    let shown = image::load_from_memory(&bytes).unwrap();
    assert_eq!((shown.width(), shown.height()), (2, 2));
    assert_eq!(shown.color().channel_count(), 1);
    assert_eq!(shown.to_luma8().as_raw(), &vec![76, 150, 29, 255]);
}

#[tokio::test]
async fn test_cancelled_camera_leaves_display_blank() {
    let server = TestServer::start(&["--pre-grant", "camera"]);
    let client = reqwest::Client::new();
    let base_url = server.base_url();

    let started = trigger(&client, &base_url, "camera").await;
    let prompt = wait_for_prompt(&client, &base_url, "camera").await;

    let response = client
        .delete(format!("{}/prompts/{}", base_url, prompt.id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let record = wait_for_cycle(&client, &base_url, started.cycle).await;
    assert_eq!(record.status, "cancelled");
    assert_eq!(display_status(&client, &base_url).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_startup_denial_then_camera_denial() {
    let server = TestServer::start(&[]);
    let client = reqwest::Client::new();
    let base_url = server.base_url();

    // Startup asks for everything at once
    let startup = wait_for_prompt(&client, &base_url, "permissions").await;
    assert_eq!(startup.capabilities, vec!["camera", "storage-read"]);
    let response = client
        .post(format!("{}/prompts/{}", base_url, startup.id))
        .multipart(Form::new().text("granted", ""))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The camera path asks again, lazily
    let started = trigger(&client, &base_url, "camera").await;
    let prompt = wait_for_prompt(&client, &base_url, "permissions").await;
    assert_eq!(prompt.capabilities, vec!["camera"]);
    client
        .delete(format!("{}/prompts/{}", base_url, prompt.id))
        .send()
        .await
        .expect("Failed to send request");

    let record = wait_for_cycle(&client, &base_url, started.cycle).await;
    assert_eq!(record.status, "denied");
    assert_eq!(display_status(&client, &base_url).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_answering_with_wrong_field_is_rejected() {
    let server = TestServer::start(&["--pre-grant", "camera", "--skip-startup-check"]);
    let client = reqwest::Client::new();
    let base_url = server.base_url();

    trigger(&client, &base_url, "camera").await;
    let prompt = wait_for_prompt(&client, &base_url, "camera").await;

    let response = client
        .post(format!("{}/prompts/{}", base_url, prompt.id))
        .multipart(Form::new().text("handle", "cat.png"))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Still waiting for a frame
    let again = wait_for_prompt(&client, &base_url, "camera").await;
    assert_eq!(again.id, prompt.id);
}
