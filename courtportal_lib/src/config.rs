//! Portal endpoints, credentials, and retry policy for one lookup.

use url::Url;

/// Portal login credentials. Loaded from the environment by the CLI.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything about the portal that is configuration rather than logic.
///
/// The defaults are the observed portal constants: the Drupal-style query
/// paths, the result-link node pattern, the last-resort case-field name,
/// and the role keywords the party fallback anchors on. They live here so
/// tests and other county deployments can override them.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    /// Query path of the login page, joined onto `base_url`.
    pub login_path: String,
    /// Query path of the case search page.
    pub search_path: String,
    /// Substring identifying the case-detail link on the results page.
    pub result_link_pattern: String,
    /// Last-resort name of the case-number input when both locator tiers fail.
    pub case_field_fallback: String,
    /// Role keywords anchoring the fallback party locator.
    pub party_role_keywords: Vec<String>,
    /// Attempts allowed per CAPTCHA stage before the run halts.
    /// Applied symmetrically to the login and search stages.
    pub captcha_retry_limit: u32,
}

impl PortalConfig {
    pub fn new(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
            login_path: "?q=user/login".to_string(),
            search_path: "?q=node/379".to_string(),
            result_link_pattern: "node/385".to_string(),
            case_field_fallback: "data(147057)".to_string(),
            party_role_keywords: ["Decedent", "Administrator", "Petitioner", "Executor", "JUDGE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            captcha_retry_limit: 3,
        }
    }

    pub fn login_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.login_path)
    }

    pub fn search_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.search_path)
    }
}
