use dockyard::browse;
use dockyard::cache::CacheStore;
use dockyard::commands::Context;
use dockyard::config::Config;
use dockyard::template::Document;
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/templates.json");

fn context(cache_dir: &TempDir) -> Context {
  let config = Config {
    source: FIXTURE.to_string(),
    cache_dir: Some(cache_dir.path().to_path_buf()),
    debounce_ms: 20,
    ..Config::default()
  };
  Context::new(config, false)
}

async fn session(ctx: &Context, link: Option<&str>, script: &str) -> String {
  let out = browse::run(ctx, link, script.as_bytes(), Vec::new()).await.unwrap();
  String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_commands_update_location_and_render() {
  let dir = TempDir::new().unwrap();
  let out = session(&context(&dir), None, ":view compact\nredis\n:link\n:run redis\n:quit\n").await;

  assert!(out.contains("5 templates"));
  assert!(out.contains("1 of 5 templates"));
  assert!(out.contains("?q=redis&view=compact\n"));
  assert!(out.contains("docker run -d \\\n  --name redis"));
  assert!(out.contains("runs privileged"));
}

#[tokio::test]
async fn test_debounced_text_applies_only_the_last_line() {
  let dir = TempDir::new().unwrap();
  let out = session(&context(&dir), Some("view=compact"), "postgres\nnginx\n").await;

  assert_eq!(out.matches("of 5 templates").count(), 1, "{out}");
  let last = out.rsplit("5 templates").nth(1).unwrap_or_default();
  assert!(last.contains("nginx"));
}

#[tokio::test]
async fn test_link_seeds_initial_state() {
  let dir = TempDir::new().unwrap();
  let out = session(&context(&dir), Some("?cat=Database&view=compact"), ":link\n:dismiss\n:reset\n:link\n").await;

  assert!(out.contains("2 of 5 templates"));
  assert!(out.contains("?category=Database&view=compact\n"));
  assert!(out.contains("(default view)"));
}

#[tokio::test]
async fn test_missing_source_is_not_fatal() {
  let dir = TempDir::new().unwrap();
  let mut ctx = context(&dir);
  ctx.config.source = dir.path().join("missing.json").display().to_string();

  let out = session(&ctx, None, ":show nginx\n:quit\n").await;
  assert!(out.contains("Type :retry to try again"));
  assert!(out.contains("No templates match"));
}

#[tokio::test]
async fn test_revalidated_document_is_rendered() {
  let dir = TempDir::new().unwrap();
  CacheStore::new(dir.path()).write(&Document::from_value(json!({"templates": [{"title": "Stale", "image": "stale"}]})));

  let ctx = context(&dir);
  let (mut writer, reader) = tokio::io::duplex(64);
  let input = tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(300)).await;
    writer.write_all(b":quit\n").await.unwrap();
  });

  let out = browse::run(&ctx, Some("view=compact"), BufReader::new(reader), Vec::new()).await.unwrap();
  input.await.unwrap();
  let out = String::from_utf8(out).unwrap();

  let stale = out.find("Stale").unwrap();
  let fresh = out.find("Wiki.js").unwrap();
  assert!(stale < fresh, "{out}");
  assert!(out.contains("1 template\n"));
  assert!(out.contains("5 templates\n"));
}
