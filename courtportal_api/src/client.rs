//! HTTP client for the court records portal.

use std::time::Duration;

use url::Url;

use crate::{document::Document, user_agent::get_user_agent, Error};

/// Cookie-holding HTTP client for one portal session.
///
/// Unlike a stateless API client, the portal threads its session through
/// cookies set at login, so a single `reqwest::Client` with a cookie store
/// is built once and reused for every request. A politeness delay is slept
/// before each request; the portal is a public service and one lookup has
/// no reason to hurry.
pub struct PortalClient {
    http: reqwest::Client,
    delay: Duration,
}

impl PortalClient {
    /// Creates a client with the default 1-second politeness delay.
    pub fn new() -> Result<Self, Error> {
        Self::with_delay(Duration::from_secs(1))
    }

    /// Creates a client with a custom politeness delay. Tests pass
    /// `Duration::ZERO`.
    pub fn with_delay(delay: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, delay })
    }

    /// Fetches `url` and parses the response as a document. The document's
    /// base URL is the final URL after redirects.
    pub async fn get_document(&self, url: &Url) -> Result<Document, Error> {
        tokio::time::sleep(self.delay).await;
        let resp = self
            .http
            .get(url.clone())
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .send()
            .await?;
        Self::into_document(resp).await
    }

    /// POSTs `fields` as a URL-encoded form to `url` and parses the
    /// response as a document.
    pub async fn submit_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<Document, Error> {
        tokio::time::sleep(self.delay).await;
        let resp = self
            .http
            .post(url.clone())
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .form(fields)
            .send()
            .await?;
        Self::into_document(resp).await
    }

    /// Fetches `url` as raw bytes. Used for CAPTCHA images.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, Error> {
        tokio::time::sleep(self.delay).await;
        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::error!("byte fetch of {} failed with status {}", url, status);
            return Err(Error::HttpStatus { status });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn into_document(resp: reqwest::Response) -> Result<Document, Error> {
        let status = resp.status();
        let base = resp.url().clone();
        let body = resp.text().await?;
        if !status.is_success() {
            tracing::error!(
                "request to {} failed with status {}: {}",
                base,
                status,
                truncate_body(&body)
            );
            return Err(Error::HttpStatus { status });
        }
        Ok(Document::parse(&body, base))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Back off to a char boundary so slicing cannot panic on multibyte text.
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::truncate_body;

    #[test]
    fn truncate_body_short_input_unchanged() {
        assert_eq!(truncate_body("<html>short error page</html>"), "<html>short error page</html>");
    }

    #[test]
    fn truncate_body_backs_off_to_char_boundary() {
        // 'é' is two bytes and sits at 1999..2001, across the cut point.
        let mut body = "a".repeat(1999);
        body.push('é');
        body.push_str(&"b".repeat(500));
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("...[truncated]"));
        assert_eq!(&truncated[..1999], "a".repeat(1999).as_str());
        assert!(!truncated.contains('é'));
    }

    #[test]
    fn truncate_body_cuts_ascii_at_limit() {
        let body = "x".repeat(3000);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.len(), 2000 + "...[truncated]".len());
    }
}
