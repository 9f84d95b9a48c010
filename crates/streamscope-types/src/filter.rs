//! URL-based noise filtering.
//!
//! Policy, in order:
//! 1. URLs matching the AI-chat allow-list are never suppressed.
//! 2. URLs matching the deny-list (analytics, ads, CDNs, static assets, ...) are suppressed,
//!    except `warn` events which must always surface.
//! 3. Everything else is kept.
//!
//! Matching is plain substring search over the lowercased URL.

use serde::{Deserialize, Serialize};

use crate::events::EventKind;

/// A single substring heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum UrlPattern {
    Contains { needle: String },
    /// Every needle must be present
    AllOf { needles: Vec<String> },
    /// `needle` present and none of `unless`
    ContainsUnless { needle: String, unless: Vec<String> },
}

impl UrlPattern {
    pub fn contains(needle: &str) -> Self {
        UrlPattern::Contains {
            needle: needle.to_lowercase(),
        }
    }

    pub fn all_of(needles: &[&str]) -> Self {
        UrlPattern::AllOf {
            needles: needles.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    pub fn contains_unless(needle: &str, unless: &[&str]) -> Self {
        UrlPattern::ContainsUnless {
            needle: needle.to_lowercase(),
            unless: unless.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    /// `url` must already be lowercased.
    fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Contains { needle } => url.contains(needle.as_str()),
            UrlPattern::AllOf { needles } => needles.iter().all(|n| url.contains(n.as_str())),
            UrlPattern::ContainsUnless { needle, unless } => {
                url.contains(needle.as_str()) && !unless.iter().any(|u| url.contains(u.as_str()))
            }
        }
    }
}

fn ai_chat_patterns() -> Vec<UrlPattern> {
    vec![
        // Claude
        UrlPattern::contains("chat_conversations"),
        UrlPattern::contains("/chat/"),
        // Grok
        UrlPattern::all_of(&["/conversations/", "/responses"]),
        UrlPattern::contains("/app-chat/conversations"),
        // ChatGPT / OpenAI
        UrlPattern::all_of(&["conversations", "openai"]),
        UrlPattern::contains("/v1/chat"),
        // Other inference providers
        UrlPattern::contains("anthropic"),
        UrlPattern::contains("huggingface"),
        UrlPattern::contains("together"),
        UrlPattern::contains("bedrock"),
        UrlPattern::contains("azure"),
    ]
}

fn page_deny_patterns() -> Vec<UrlPattern> {
    let mut patterns: Vec<UrlPattern> = [
        // analytics and tracing
        "mixpanel",
        "segment",
        "google-analytics",
        "analytics",
        "facebook.com",
        "sentry",
        "amplitude",
        "intercom",
        "datadog",
        "newrelic",
        "bugsnag",
        "rollbar",
        "raygun",
        "loggly",
        "splunk",
        // ads and marketing
        "ads",
        "advert",
        "doubleclick",
        "tracking",
        "pixel",
        // CDNs and static assets
        "cdn",
        "static",
        ".png",
        ".jpg",
        ".gif",
        ".webp",
        ".css",
        // unrelated services
        "stripe.com",
        "slack",
        "github.com/",
        "gravatar",
        "cloudflare",
    ]
    .iter()
    .map(|n| UrlPattern::contains(n))
    .collect();

    patterns.push(UrlPattern::all_of(&["logs", "elastic"]));
    patterns.push(UrlPattern::contains_unless(
        ".js",
        &["grok", "claude", "openai"],
    ));
    patterns
}

fn panel_deny_patterns() -> Vec<UrlPattern> {
    [
        "mixpanel",
        "segment",
        "google-analytics",
        "analytics",
        "facebook.com",
        "sentry",
        "amplitude",
        "intercom",
        "datadog",
        "newrelic",
        "stripe.com",
        "ads",
        "tracking",
        "pixel",
        "gravatar",
    ]
    .iter()
    .map(|n| UrlPattern::contains(n))
    .collect()
}

/// Stateless allow/deny classifier.
///
/// Matching is case-insensitive: patterns and URLs are both lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFilter {
    allow: Vec<UrlPattern>,
    deny: Vec<UrlPattern>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::page_default()
    }
}

impl NoiseFilter {
    pub fn new(allow: Vec<UrlPattern>, deny: Vec<UrlPattern>) -> Self {
        Self { allow, deny }
    }

    /// Filter applied by the page-side emitter before anything leaves the page.
    pub fn page_default() -> Self {
        Self::new(ai_chat_patterns(), page_deny_patterns())
    }

    /// Narrower deny-list the panel applies again at render time.
    pub fn panel_default() -> Self {
        Self::new(ai_chat_patterns(), panel_deny_patterns())
    }

    pub fn with_allow(mut self, pattern: UrlPattern) -> Self {
        self.allow.push(pattern);
        self
    }

    pub fn with_deny(mut self, pattern: UrlPattern) -> Self {
        self.deny.push(pattern);
        self
    }

    /// Does the URL look like an inference-provider chat request?
    pub fn is_ai_chat(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.allow.iter().any(|p| p.matches(&url))
    }

    /// Deny-listed and not rescued by the allow-list.
    pub fn is_noise(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        if self.allow.iter().any(|p| p.matches(&url)) {
            return false;
        }
        self.deny.iter().any(|p| p.matches(&url))
    }

    /// Diagnostic kinds (`init`, `warn`) are never suppressed.
    pub fn should_suppress(&self, url: &str, kind: EventKind) -> bool {
        if kind.is_diagnostic() {
            return false;
        }
        self.is_noise(url)
    }
}
