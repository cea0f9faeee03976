//! Shared fixtures for the HTTP integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use epicforge_core::{db, FeatureStore, GenerationBackend, GenerationError};
use epicforge_server::http::HttpState;
use epicforge_server::pages::StaticSite;
use tempfile::TempDir;

pub const INDEX_HTML: &str =
    "<!DOCTYPE html>\n<html><head><title>Epicforge</title></head>\n<body><div id=\"result\"></div></body>\n</html>\n";
pub const GENERATED_HTML: &str = "<html><body><ul id=\"history\"></ul></body></html>";

/// Stand-in for the Gemini adapter: records messages, answers from a script.
pub struct FakeGenerator {
    reply: Result<String, (u16, String)>,
    calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(code: u16, message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err((code, message.to_string())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for FakeGenerator {
    async fn generate(&self, message: &str) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(message.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((code, message)) => Err(GenerationError::Api {
                code: *code,
                message: message.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct TestApp {
    pub state: Arc<HttpState>,
    pub feature: Arc<FakeGenerator>,
    pub ideas: Arc<FakeGenerator>,
    // Keeps the static directory alive for the test's duration.
    pub static_dir: TempDir,
}

/// In-memory store plus a temp static directory holding both templates.
pub async fn test_app(feature: Arc<FakeGenerator>, ideas: Arc<FakeGenerator>) -> TestApp {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), INDEX_HTML).unwrap();
    std::fs::write(static_dir.path().join("generated.html"), GENERATED_HTML).unwrap();
    std::fs::write(static_dir.path().join("script.js"), "console.log('epicforge');").unwrap();

    build(feature, ideas, static_dir).await
}

/// Like [`test_app`] but the static directory is empty.
pub async fn test_app_without_templates(feature: Arc<FakeGenerator>) -> TestApp {
    let static_dir = tempfile::tempdir().unwrap();
    build(feature, FakeGenerator::replying("[]"), static_dir).await
}

async fn build(
    feature: Arc<FakeGenerator>,
    ideas: Arc<FakeGenerator>,
    static_dir: TempDir,
) -> TestApp {
    let pool = db::memory_pool().await.unwrap();
    db::create_schema(&pool).await.unwrap();

    let state = Arc::new(HttpState {
        store: FeatureStore::new(pool),
        feature_generator: feature.clone(),
        ideas_generator: ideas.clone(),
        site: StaticSite::new(static_dir.path()),
    });

    TestApp {
        state,
        feature,
        ideas,
        static_dir,
    }
}
