// src/fetch/types.rs
use anyhow::Result;

/// Anything that can turn a URL into a page body: live HTTP, fixtures, or an
/// alternate renderer for dynamic pages.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}
