//! The session state machine: login, search, result navigation, and
//! detail extraction for one case lookup.
//!
//! The workflow is strictly sequential; each step's fetched page is the
//! next step's input. Both CAPTCHA stages retry inside a shared budget
//! (`PortalConfig::captcha_retry_limit`) and every halt hands the last
//! fetched page to the diagnostics sink first.

use courtportal_api::{element_text, Document, PortalClient};
use scraper::ElementRef;
use url::Url;

use crate::arithmetic::{self, ArithmeticChallenge};
use crate::config::PortalConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{CaptchaStage, SessionError};
use crate::extract;
use crate::locate::{first_non_empty, Locator};
use crate::normalize;
use crate::ocr::CaptchaOcr;
use crate::prompt::CaptchaPrompt;
use crate::record::CaseRecord;

/// Authentication progress of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    Failed,
}

/// Run-scoped session state: created at run start, discarded at run end,
/// mutated only by the state machine.
#[derive(Debug)]
pub struct Session {
    pub case_number: String,
    pub auth: AuthState,
    pub login_attempts: u32,
    pub search_attempts: u32,
    /// The most recent CAPTCHA encountered, kept for halt diagnostics.
    pub last_challenge: Option<CaptchaChallenge>,
}

impl Session {
    fn new(case_number: &str) -> Self {
        Self {
            case_number: case_number.trim().to_string(),
            auth: AuthState::Unauthenticated,
            login_attempts: 0,
            search_attempts: 0,
            last_challenge: None,
        }
    }

    /// Alphabetic prefix of the case number ("PRMC2400654" -> "PRMC").
    /// Used to recognize the case both in result links and on the detail
    /// page.
    pub fn case_prefix(&self) -> &str {
        let end = self
            .case_number
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(self.case_number.len());
        &self.case_number[..end]
    }
}

/// A CAPTCHA encountered during the run: created when a challenge-bearing
/// page is seen, consumed immediately by the matching solver.
#[derive(Debug, Clone)]
pub enum CaptchaChallenge {
    /// Image-text puzzle on the login page.
    Image(ImageChallenge),
    /// Arithmetic word problem on the search page.
    Arithmetic(ArithmeticChallenge),
}

impl CaptchaChallenge {
    pub fn stage(&self) -> CaptchaStage {
        match self {
            Self::Image(_) => CaptchaStage::Login,
            Self::Arithmetic(_) => CaptchaStage::Search,
        }
    }
}

/// An image CAPTCHA: where to fetch the puzzle and which form field
/// receives the solved text.
#[derive(Debug, Clone)]
pub struct ImageChallenge {
    pub image_url: Url,
    pub response_field: String,
}

/// One search submission: the case number, the solved CAPTCHA answer, and
/// the tokens and dynamic field name scraped from the search page. Lives
/// only long enough to be turned into form fields.
pub struct SearchRequest {
    pub case_number: String,
    pub answer: i64,
    pub case_field: String,
    pub tokens: Vec<(String, String)>,
}

impl SearchRequest {
    /// Builds the submission from a search page. The case-number input's
    /// name is dynamic; it is resolved by cascade (known maxlength
    /// constraint, then the input after the "Case Number" label) with
    /// `fallback_field` as the last resort.
    pub fn from_page(
        page: &Document,
        case_number: &str,
        answer: i64,
        fallback_field: &str,
    ) -> Self {
        let tiers: Vec<Locator<'_, String>> = vec![
            Box::new(|| page.first_attr("input[type='text'][maxlength='50']", "name")),
            Box::new(|| labeled_input_name(page, "Case Number")),
        ];
        let case_field = first_non_empty(&tiers).unwrap_or_else(|| {
            tracing::warn!("falling back to hardcoded case field name");
            fallback_field.to_string()
        });
        tracing::info!("case field name: {}", case_field);
        Self {
            case_number: case_number.to_string(),
            answer,
            case_field,
            tokens: scrape_tokens(page, &["form_build_id", "form_token", "form_id"]),
        }
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        let mut fields = vec![
            (self.case_field, self.case_number),
            ("captcha_response".to_string(), self.answer.to_string()),
            ("op".to_string(), "Search".to_string()),
        ];
        fields.extend(self.tokens);
        fields
    }
}

/// Orchestrates the full workflow for one case lookup.
///
/// Collaborators are injected: the transport client, the OCR engine
/// (absent means every image CAPTCHA goes straight to the prompt), the
/// blocking operator prompt, and the diagnostics sink.
pub struct CaseLookup<'a> {
    client: &'a PortalClient,
    config: &'a PortalConfig,
    ocr: Option<&'a dyn CaptchaOcr>,
    prompt: &'a dyn CaptchaPrompt,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> CaseLookup<'a> {
    pub fn new(
        client: &'a PortalClient,
        config: &'a PortalConfig,
        ocr: Option<&'a dyn CaptchaOcr>,
        prompt: &'a dyn CaptchaPrompt,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            client,
            config,
            ocr,
            prompt,
            diagnostics,
        }
    }

    /// Runs one lookup end to end and returns the cleaned record.
    pub async fn run(&self, case_number: &str) -> Result<CaseRecord, SessionError> {
        let mut session = Session::new(case_number);
        self.login(&mut session).await?;
        let results = self.search(&mut session).await?;
        let detail_url = self.resolve_result_link(&session, &results)?;
        tracing::info!("found case details link: {}", detail_url);

        let detail = self.client.get_document(&detail_url).await?;
        self.diagnostics.preserve_page("case_details", detail.raw());
        let mut record = extract::extract_case(
            &detail,
            session.case_prefix(),
            &self.config.party_role_keywords,
        );
        normalize::clean_record(&mut record);
        tracing::info!("extracted case: {}", record.case_number);
        Ok(record)
    }

    async fn login(&self, session: &mut Session) -> Result<(), SessionError> {
        let login_url = self
            .config
            .login_url()
            .map_err(courtportal_api::Error::from)?;
        loop {
            session.login_attempts += 1;
            tracing::info!("loading login page (attempt {})", session.login_attempts);
            let page = self.client.get_document(&login_url).await?;

            let challenge = find_image_challenge(&page);
            let captcha_response = match &challenge {
                Some(image) => {
                    session.last_challenge = Some(CaptchaChallenge::Image(image.clone()));
                    self.solve_image_challenge(image).await
                }
                None => String::new(),
            };
            let fields = self.login_fields(&page, challenge.as_ref(), &captcha_response);
            let after = self.client.submit_form(&login_url, &fields).await?;

            if after.contains("Logout") || after.contains("Log out") {
                session.auth = AuthState::Authenticated;
                tracing::info!("logged in successfully");
                return Ok(());
            }

            // The portal re-renders the login form with a fresh CAPTCHA
            // when the answer was wrong.
            let challenged_again = !after.select("img[src*='image_captcha']").is_empty();
            if challenged_again && session.login_attempts < self.config.captcha_retry_limit {
                tracing::warn!(
                    "login CAPTCHA rejected, retrying ({}/{})",
                    session.login_attempts,
                    self.config.captcha_retry_limit
                );
                continue;
            }

            session.auth = AuthState::Failed;
            self.diagnostics.preserve_page("login_failed", after.raw());
            return Err(if challenged_again {
                tracing::error!("login CAPTCHA failed too many times, aborting");
                SessionError::RetriesExhausted {
                    stage: CaptchaStage::Login,
                    attempts: session.login_attempts,
                }
            } else {
                SessionError::LoginFailed {
                    reason: "no logout affordance after submit; check credentials or CAPTCHA"
                        .to_string(),
                }
            });
        }
    }

    /// Solves an image CAPTCHA: OCR first, the operator prompt when OCR
    /// is unavailable or came up empty. An empty string means no solution
    /// was obtained; the portal will re-challenge and the retry budget
    /// applies.
    async fn solve_image_challenge(&self, challenge: &ImageChallenge) -> String {
        tracing::info!("CAPTCHA URL: {}", challenge.image_url);
        if let Some(ocr) = self.ocr {
            match self.client.fetch_bytes(&challenge.image_url).await {
                Ok(bytes) => {
                    if let Some(text) = ocr.recognize(&bytes) {
                        return text;
                    }
                }
                // A failed image download is a solver failure, not a run
                // failure.
                Err(e) => tracing::warn!("could not download CAPTCHA image: {}", e),
            }
        }
        self.prompt
            .request_manual_captcha(challenge.image_url.as_str())
            .unwrap_or_default()
    }

    fn login_fields(
        &self,
        page: &Document,
        challenge: Option<&ImageChallenge>,
        captcha_response: &str,
    ) -> Vec<(String, String)> {
        let creds = &self.config.credentials;
        let response_field = challenge
            .map(|c| c.response_field.as_str())
            .unwrap_or("captcha_response");
        let mut fields = vec![
            ("name".to_string(), creds.username.clone()),
            ("pass".to_string(), creds.password.clone()),
            ("form_id".to_string(), "user_login".to_string()),
            (response_field.to_string(), captcha_response.to_string()),
            ("op".to_string(), "Log in".to_string()),
        ];
        fields.extend(scrape_tokens(
            page,
            &["form_build_id", "captcha_sid", "captcha_token"],
        ));
        fields
    }

    async fn search(&self, session: &mut Session) -> Result<Document, SessionError> {
        let search_url = self
            .config
            .search_url()
            .map_err(courtportal_api::Error::from)?;
        loop {
            session.search_attempts += 1;
            tracing::info!(
                "searching for case {} (attempt {})",
                session.case_number,
                session.search_attempts
            );
            let page = self.client.get_document(&search_url).await?;
            self.diagnostics.preserve_page("search_page", page.raw());

            let Some(challenge) = arithmetic::find_challenge(&page) else {
                self.diagnostics.preserve_page("captcha_debug", page.raw());
                return Err(SessionError::Structural {
                    reason: "could not extract math question from search page".to_string(),
                });
            };
            session.last_challenge = Some(CaptchaChallenge::Arithmetic(challenge.clone()));
            let answer = challenge.evaluate();
            tracing::info!(
                "solved CAPTCHA: {} {} {} = {}",
                challenge.a,
                challenge.op,
                challenge.b,
                answer
            );

            let request = SearchRequest::from_page(
                &page,
                &session.case_number,
                answer,
                &self.config.case_field_fallback,
            );
            let results = self.client.submit_form(&search_url, &request.into_fields()).await?;

            if answer_rejected(&results) {
                if session.search_attempts >= self.config.captcha_retry_limit {
                    tracing::error!("search CAPTCHA failed too many times, aborting");
                    tracing::debug!("last challenge: {:?}", session.last_challenge);
                    self.diagnostics.preserve_page("retry_failed", results.raw());
                    return Err(SessionError::RetriesExhausted {
                        stage: CaptchaStage::Search,
                        attempts: session.search_attempts,
                    });
                }
                tracing::warn!(
                    "CAPTCHA incorrect, retrying ({}/{})",
                    session.search_attempts,
                    self.config.captcha_retry_limit
                );
                continue;
            }
            return Ok(results);
        }
    }

    /// Locates the case-detail link on the results page: known link-target
    /// pattern, then link text carrying the case-number prefix, then the
    /// result-table column class. No hit halts the run, surfacing the
    /// first links on the page for diagnosis.
    fn resolve_result_link(
        &self,
        session: &Session,
        results: &Document,
    ) -> Result<Url, SessionError> {
        let pattern_selector = format!("a[href*='{}']", self.config.result_link_pattern);
        let prefix = session.case_prefix();
        let tiers: Vec<Locator<'_, String>> = vec![
            Box::new(|| results.first_attr(&pattern_selector, "href")),
            Box::new(|| link_href_with_text(results, prefix)),
            Box::new(|| results.first_attr("td.views-field.views-field-php-2 a", "href")),
        ];
        if let Some(url) = first_non_empty(&tiers).and_then(|href| results.resolve(&href)) {
            return Ok(url);
        }

        self.diagnostics.preserve_page("search_results", results.raw());
        tracing::info!("available links on page:");
        for link in results.all_attrs("a", "href").iter().take(10) {
            tracing::info!("  - {}", link);
        }
        Err(SessionError::Structural {
            reason: format!("no result link found for case {}", session.case_number),
        })
    }
}

/// "Wrong answer" detection on the post-search page. The portal repeats
/// the form with a full sentence; some variants only say "incorrect".
fn answer_rejected(results: &Document) -> bool {
    results.contains("The answer you entered for the CAPTCHA")
        || results.raw().to_lowercase().contains("incorrect")
}

fn find_image_challenge(page: &Document) -> Option<ImageChallenge> {
    let src = page.first_attr("img[src*='image_captcha']", "src")?;
    let image_url = page.resolve(&src)?;
    Some(ImageChallenge {
        image_url,
        response_field: "captcha_response".to_string(),
    })
}

fn link_href_with_text(results: &Document, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }
    results
        .select("a")
        .into_iter()
        .find(|el| element_text(*el).contains(prefix))
        .and_then(|el| el.value().attr("href").map(str::to_string))
}

fn labeled_input_name(page: &Document, label: &str) -> Option<String> {
    let label_el = page
        .select("label")
        .into_iter()
        .find(|el| element_text(*el).contains(label))?;
    label_el
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "input")
        .and_then(|el| el.value().attr("name").map(str::to_string))
}

fn scrape_tokens(page: &Document, names: &[&str]) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    for name in names {
        let selector = format!("input[name='{}']", name);
        if let Some(value) = page.first_attr(&selector, "value") {
            tokens.push((name.to_string(), value));
        }
    }
    tokens
}
