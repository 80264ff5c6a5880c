//! PDF ingestion end to end: CLI ingest, page joining, corrupt-file
//! handling, and the upload endpoint.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn medrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("medrag");
    path
}

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Builds a valid single-font PDF with one page per entry in `pages`.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn setup_test_env() -> (TempDir, PathBuf, u16) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let server_port = find_free_port();

    let config_content = format!(
        r#"[db]
path = "{root}/data/medrag.sqlite"

[corpus]
dir = "{root}/files"
include_globs = ["**/*.md"]

[embedding]
provider = "hash"

[server]
bind = "127.0.0.1:{server_port}"
"#,
        root = root.display(),
        server_port = server_port,
    );

    let config_path = root.join("config").join("medrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, server_port)
}

fn run_medrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = medrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run medrag: {}", e));
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

struct ServerGuard {
    child: std::process::Child,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server(config_path: &Path) -> ServerGuard {
    let child = Command::new(medrag_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start medrag serve");
    ServerGuard { child }
}

fn wait_for_server(port: u16) {
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = reqwest::blocking::get(&url) {
            if resp.status().is_success() {
                return;
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    panic!("server did not come up on port {}", port);
}

#[test]
fn pdf_extraction_joins_pages_in_order() {
    let bytes = pdf_with_pages(&["alpha page one", "beta page two"]);

    let text = medrag::extract::extract_text(&bytes, medrag::extract::MIME_PDF).unwrap();
    let first = text.find("alpha page one").expect("first page text missing");
    let second = text.find("beta page two").expect("second page text missing");
    assert!(first < second, "pages out of order: {}", text);
}

#[test]
fn pdf_ingest_and_query() {
    let (tmp, config_path, _) = setup_test_env();
    let pdf_path = tmp.path().join("files").join("guidelines.pdf");
    fs::write(
        &pdf_path,
        pdf_with_pages(&["Metformin lowers blood glucose in type 2 diabetes"]),
    )
    .unwrap();

    run_medrag(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_medrag(&config_path, &["ingest", pdf_path.to_str().unwrap()]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("files: 1"), "{}", stdout);
    assert!(stdout.contains("passages written: 1"), "{}", stdout);

    let (query_out, _, success) =
        run_medrag(&config_path, &["query", "metformin blood glucose"]);
    assert!(success, "query failed");
    assert!(
        query_out.contains("guidelines.pdf#0"),
        "expected the PDF passage in results, got: {}",
        query_out
    );
}

#[test]
fn corrupt_pdf_is_skipped_in_a_batch() {
    let (tmp, config_path, _) = setup_test_env();
    let files_dir = tmp.path().join("files");
    fs::write(files_dir.join("bad.pdf"), b"not a valid pdf").unwrap();
    fs::write(
        files_dir.join("good.md"),
        "Ibuprofen is a nonsteroidal anti-inflammatory drug.",
    )
    .unwrap();

    run_medrag(&config_path, &["init"]);
    let bad = files_dir.join("bad.pdf");
    let good = files_dir.join("good.md");
    let (stdout, _, success) = run_medrag(
        &config_path,
        &["ingest", bad.to_str().unwrap(), good.to_str().unwrap()],
    );
    assert!(success, "batch must survive a corrupt file: {}", stdout);
    assert!(stdout.contains("skipped: 1"), "{}", stdout);
    assert!(stdout.contains("files: 1"), "{}", stdout);
    assert!(stdout.contains("passages written: 1"), "{}", stdout);
}

#[test]
fn upload_endpoint_ingests_pdf() {
    let (_tmp, config_path, port) = setup_test_env();

    run_medrag(&config_path, &["init"]);
    let _server = start_server(&config_path);
    wait_for_server(port);

    let form = reqwest::blocking::multipart::Form::new().part(
        "file",
        reqwest::blocking::multipart::Part::bytes(pdf_with_pages(&[
            "Amoxicillin treats bacterial infections of the ear and throat",
        ]))
        .file_name("amoxicillin.pdf"),
    );
    let resp = reqwest::blocking::Client::new()
        .post(format!("http://127.0.0.1:{}/upload", port))
        .multipart(form)
        .send()
        .unwrap();
    assert!(resp.status().is_success(), "upload failed: {:?}", resp);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["filename"], "amoxicillin.pdf");
    assert_eq!(body["passages_added"], 1);

    let resp = reqwest::blocking::Client::new()
        .post(format!("http://127.0.0.1:{}/query", port))
        .json(&serde_json::json!({"query": "amoxicillin bacterial infections"}))
        .send()
        .unwrap();
    let body: serde_json::Value = resp.json().unwrap();
    let results = body["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0]["source"], "amoxicillin.pdf");
}

#[test]
fn upload_endpoint_rejects_corrupt_pdf() {
    let (_tmp, config_path, port) = setup_test_env();

    run_medrag(&config_path, &["init"]);
    let _server = start_server(&config_path);
    wait_for_server(port);

    let form = reqwest::blocking::multipart::Form::new().part(
        "file",
        reqwest::blocking::multipart::Part::bytes(b"junk bytes".to_vec())
            .file_name("broken.pdf"),
    );
    let resp = reqwest::blocking::Client::new()
        .post(format!("http://127.0.0.1:{}/upload", port))
        .multipart(form)
        .send()
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().unwrap();
    assert_eq!(body["error"]["code"], "ingest_error");
}
