//! Static single-page app and server-side data injection.

use serde_json::Value;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.html";
const GENERATED_FILE: &str = "generated.html";
const BODY_CLOSE: &str = "</body>";

/// The directory the front-end is served from.
#[derive(Debug, Clone)]
pub struct StaticSite {
    root: PathBuf,
}

impl StaticSite {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn generated_path(&self) -> PathBuf {
        self.root.join(GENERATED_FILE)
    }

    /// Create the directory if missing so `/static` always has a mount point.
    pub fn ensure_exists(&self) -> std::io::Result<()> {
        if !self.root.is_dir() {
            tracing::warn!(dir = %self.root.display(), "Static directory missing, creating it");
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    pub async fn read_index(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.index_path()).await
    }

    pub async fn read_generated(&self) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.generated_path()).await
    }
}

/// `<script>` tag assigning `data` to `window.preloadedFeatureData`.
///
/// `</` is written as `<\/` so stored text can never terminate the element.
pub fn preload_script(data: &Value) -> String {
    let json = data.to_string().replace("</", "<\\/");
    format!("<script>window.preloadedFeatureData = {};</script>", json)
}

/// Insert the preload script right before the last `</body>`, or append it
/// when the template has none.
pub fn inject_preloaded_data(html: &str, data: &Value) -> String {
    let script = preload_script(data);
    match html.rfind(BODY_CLOSE) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len() + 1);
            out.push_str(&html[..pos]);
            out.push_str(&script);
            out.push('\n');
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}\n", html, script),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_script_is_compact_json() {
        let script = preload_script(&json!({ "epic_title": "Dark Mode", "stories": [] }));
        assert_eq!(
            script,
            r#"<script>window.preloadedFeatureData = {"epic_title":"Dark Mode","stories":[]};</script>"#
        );
    }

    #[test]
    fn test_inject_before_closing_body() {
        let html = "<html><body><div id=\"result\"></div></body></html>";
        let out = inject_preloaded_data(html, &json!({ "epic_title": "X" }));

        assert_eq!(
            out,
            "<html><body><div id=\"result\"></div><script>window.preloadedFeatureData = {\"epic_title\":\"X\"};</script>\n</body></html>"
        );
    }

    #[test]
    fn test_inject_uses_last_body_marker() {
        let html = "<body><pre>&lt;/body&gt; </body></pre></body>";
        let out = inject_preloaded_data(html, &json!({}));
        assert!(out.ends_with("{};</script>\n</body>"));
        assert!(out.starts_with("<body><pre>&lt;/body&gt; </body></pre>"));
    }

    #[test]
    fn test_inject_without_body_appends() {
        let out = inject_preloaded_data("<p>fragment</p>", &json!({ "a": 1 }));
        assert_eq!(
            out,
            "<p>fragment</p><script>window.preloadedFeatureData = {\"a\":1};</script>\n"
        );
    }

    #[test]
    fn test_script_close_sequence_is_escaped() {
        let script = preload_script(&json!({ "epic_title": "</script><script>alert(1)</script>" }));
        assert!(!script[..script.len() - "</script>".len()].contains("</script>"));
        assert!(script.contains(r#"<\/script><script>alert(1)<\/script>"#));
    }

    #[test]
    fn test_ensure_exists_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let site = StaticSite::new(dir.path().join("nested").join("static"));
        site.ensure_exists().unwrap();
        assert!(site.root().is_dir());
        assert_eq!(site.index_path(), site.root().join("index.html"));
    }
}
