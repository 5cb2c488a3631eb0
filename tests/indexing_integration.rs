/// End-to-end indexing through the public API, with a mock Ollama server
/// and the in-memory vector store
use anyhow::Result;
use axum::extract::Json;
use axum::routing::post;
use axum::Router;
use code_sage::config::VectorBackend;
use code_sage::{Config, FileOutcome, IndexClient, IndexOptions, IndexStatus};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct MockOllama {
    url: String,
    calls: Arc<AtomicUsize>,
}

async fn spawn_mock_ollama() -> MockOllama {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/api/embeddings",
        post(move |Json(body): Json<Value>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let prompt = body["prompt"].as_str().unwrap_or_default();
                let count = |c: char| prompt.matches(c).count() as f32 + 1.0;
                Json(json!({ "embedding": [count('f'), count('s'), count('x'), count('y')] }))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockOllama { url, calls }
}

fn test_config(workspace: &Path, state_dir: &Path, ollama_url: &str) -> Config {
    let mut config = Config::default();
    config.workspace.root = Some(workspace.to_path_buf());
    config.cache.state_path = state_dir.join("index_state.json");
    config.vector_db.backend = VectorBackend::Memory;
    config.embedding.provider = code_sage::config::ProviderConfig::Ollama {
        base_url: ollama_url.to_string(),
        model: "test-embed".to_string(),
    };
    config
}

fn create_workspace(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir.join("src"))?;
    std::fs::write(
        dir.join("src/lib.rs"),
        "pub fn first() -> u32 {\n    1\n}\n\npub fn second() -> u32 {\n    2\n}\n",
    )?;
    std::fs::write(
        dir.join("src/util.py"),
        "def xyz():\n    return 'yyy'\n",
    )?;
    std::fs::create_dir_all(dir.join("target/debug"))?;
    std::fs::write(dir.join("target/debug/build.rs"), "fn ignored() {}\n")?;
    Ok(())
}

#[tokio::test]
async fn test_full_indexing_workflow() -> Result<()> {
    let ollama = spawn_mock_ollama().await;
    let workspace = TempDir::new()?;
    let state_dir = TempDir::new()?;
    create_workspace(workspace.path())?;

    let client = IndexClient::with_config(test_config(
        workspace.path(),
        state_dir.path(),
        &ollama.url,
    ))?;
    assert_eq!(client.status().await.status, IndexStatus::NotIndexed);

    let report = client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await?;
    assert_eq!(report.files_discovered, 2, "target/ must be excluded");
    assert_eq!(report.files_indexed, 2);
    assert!(report.points_upserted >= 3);

    // Not a git repository: no revision on either side
    let status = client.status().await;
    assert_eq!(status.status, IndexStatus::Ready);
    let stats = status.stats.unwrap();
    assert_eq!(stats.vector_count, report.points_upserted);
    assert_eq!(stats.last_commit, None);

    let hits = client
        .search("def xyz yyy", 1, &CancellationToken::new())
        .await?;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].file_path.ends_with("util.py"));

    // Second sweep embeds nothing
    let calls = ollama.calls.load(Ordering::SeqCst);
    let report = client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await?;
    assert_eq!(report.files_unchanged, 2);
    assert_eq!(ollama.calls.load(Ordering::SeqCst), calls);

    Ok(())
}

#[tokio::test]
async fn test_single_file_updates() -> Result<()> {
    let ollama = spawn_mock_ollama().await;
    let workspace = TempDir::new()?;
    let state_dir = TempDir::new()?;
    create_workspace(workspace.path())?;

    let client = IndexClient::with_config(test_config(
        workspace.path(),
        state_dir.path(),
        &ollama.url,
    ))?;
    client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await?;
    let before = client.status().await.stats.unwrap().vector_count;

    let cancel = CancellationToken::new();
    std::fs::write(
        workspace.path().join("src/util.py"),
        "def xyz():\n    return 'yyy'\n\ndef fff():\n    return 'sss'\n",
    )?;
    let outcome = client.index_file(Path::new("src/util.py"), &cancel).await?;
    assert_eq!(outcome, FileOutcome::Indexed { chunks: 2, points: 2 });
    assert_eq!(client.status().await.stats.unwrap().vector_count, before + 1);

    assert_eq!(
        client.index_file(Path::new("target/debug/build.rs"), &cancel).await?,
        FileOutcome::Excluded
    );

    assert!(client.remove_file(Path::new("src/util.py")).await?);
    assert_eq!(client.status().await.stats.unwrap().vector_count, before - 1);
    assert!(!client.remove_file(Path::new("src/util.py")).await?);

    Ok(())
}

#[tokio::test]
async fn test_git_revision_tracks_staleness() -> Result<()> {
    let ollama = spawn_mock_ollama().await;
    let workspace = TempDir::new()?;
    let state_dir = TempDir::new()?;
    create_workspace(workspace.path())?;

    let repo = git2::Repository::init(workspace.path())?;
    let commit = |message: &str| -> Result<git2::Oid> {
        let mut index = repo.index()?;
        index.add_all(["src"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let sig = git2::Signature::now("Test", "test@example.com")?;
        let parents = match repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
            Some(parent) => vec![parent],
            None => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?)
    };
    let first = commit("initial")?;

    let client = IndexClient::with_config(test_config(
        workspace.path(),
        state_dir.path(),
        &ollama.url,
    ))?;
    client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await?;

    let status = client.status().await;
    assert_eq!(status.status, IndexStatus::Ready);
    assert_eq!(status.stats.unwrap().last_commit, Some(first.to_string()));

    std::fs::write(workspace.path().join("src/extra.rs"), "pub fn extra() {}\n")?;
    let second = commit("add extra")?;
    assert_eq!(client.status().await.status, IndexStatus::Stale);

    client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await?;
    let status = client.status().await;
    assert_eq!(status.status, IndexStatus::Ready);
    assert_eq!(status.stats.unwrap().last_commit, Some(second.to_string()));

    Ok(())
}

#[tokio::test]
async fn test_unreachable_provider_fails_run() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let dead_url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let workspace = TempDir::new()?;
    let state_dir = TempDir::new()?;
    create_workspace(workspace.path())?;

    let client = IndexClient::with_config(test_config(
        workspace.path(),
        state_dir.path(),
        &dead_url,
    ))?;
    let result = client
        .index_workspace(IndexOptions::default(), CancellationToken::new())
        .await;
    assert!(result.is_err());

    let status = client.status().await;
    assert_eq!(status.status, IndexStatus::Error);
    assert!(status.message.is_some());

    Ok(())
}

#[tokio::test]
async fn test_missing_api_key_is_rejected() {
    let mut config = Config::default();
    config.vector_db.backend = VectorBackend::Memory;
    config.embedding.provider = code_sage::config::ProviderConfig::OpenAi {
        api_key: None,
        model: "text-embedding-3-small".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
    };
    assert!(IndexClient::with_config(config).is_err());
}
