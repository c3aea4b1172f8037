//! Human fallback for CAPTCHAs the solver cannot read.

/// A blocking prompt to a human operator. The session suspends on this
/// call and resumes once the operator answers; `None` means no answer was
/// available (unattended run, closed stdin) and the CAPTCHA response is
/// submitted empty, which the portal treats as a wrong answer.
pub trait CaptchaPrompt {
    fn request_manual_captcha(&self, image_url: &str) -> Option<String>;
}

/// A prompt that always declines. Used for unattended runs and tests.
pub struct NoPrompt;

impl CaptchaPrompt for NoPrompt {
    fn request_manual_captcha(&self, image_url: &str) -> Option<String> {
        tracing::warn!("no operator available for CAPTCHA at {}", image_url);
        None
    }
}
