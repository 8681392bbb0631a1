// src/resolve.rs
use std::collections::HashMap;

use tracing::debug;
use url::form_urlencoded;

/// Maps a team identifier to the URL of its statistics page.
/// Implementations must be deterministic.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, team: &str) -> String;
}

impl<F> UrlResolver for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn resolve(&self, team: &str) -> String {
        self(team)
    }
}

/// Canonical key for a team name: trimmed and lowercased.
pub fn team_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `base_url + slug + suffix`, where the slug comes from the configured
/// name mapping or, failing that, the name with spaces turned into dashes.
#[derive(Debug, Clone)]
pub struct TeamUrlResolver {
    base_url: String,
    suffix: String,
    slugs: HashMap<String, String>,
}

impl TeamUrlResolver {
    pub fn new<I, K, V>(base_url: &str, suffix: &str, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            base_url: base_url.to_string(),
            suffix: suffix.to_string(),
            slugs: mapping
                .into_iter()
                .map(|(k, v)| (team_key(k.as_ref()), team_key(v.as_ref())))
                .collect(),
        }
    }

    pub fn slug(&self, team: &str) -> String {
        let key = team_key(team);
        match self.slugs.get(&key) {
            Some(slug) => slug.clone(),
            None => key.replace(' ', "-"),
        }
    }
}

impl UrlResolver for TeamUrlResolver {
    fn resolve(&self, team: &str) -> String {
        let url = format!("{}{}{}", self.base_url, quote_plus(&self.slug(team)), self.suffix);
        debug!(%team, %url, "resolved team url");
        url
    }
}

/// Form-style percent encoding: space becomes `+`.
fn quote_plus(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
