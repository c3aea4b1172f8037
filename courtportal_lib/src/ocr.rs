//! Image CAPTCHA recognition.
//!
//! The engine sits behind [`CaptchaOcr`] so the state machine can be
//! tested with a stub and the Tesseract dependency stays swappable. The
//! real engine is gated behind the `ocr` cargo feature; without it every
//! image CAPTCHA goes to the operator prompt.

/// Best-effort text recognition for a CAPTCHA image.
///
/// Implementations never fail past this boundary: any internal error
/// (decode, engine init, recognition) is logged and reported as `None`,
/// and the caller falls back to manual entry.
pub trait CaptchaOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Option<String>;
}

#[cfg(feature = "ocr")]
pub use tesseract::TesseractOcr;

#[cfg(feature = "ocr")]
mod tesseract {
    use super::CaptchaOcr;

    /// Only alphanumeric answers are ever correct, so everything else is
    /// excluded up front instead of cleaned up afterwards.
    const WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    /// Tesseract-backed CAPTCHA recognition with a preprocessing retry.
    pub struct TesseractOcr {
        language: String,
    }

    impl Default for TesseractOcr {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TesseractOcr {
        pub fn new() -> Self {
            Self {
                language: "eng".to_string(),
            }
        }

        fn attempt(&self, image_bytes: &[u8]) -> Option<String> {
            let mut engine = match leptess::LepTess::new(None, &self.language) {
                Ok(engine) => engine,
                Err(e) => {
                    tracing::warn!("tesseract init failed: {}", e);
                    return None;
                }
            };
            if let Err(e) =
                engine.set_variable(leptess::Variable::TesseractCharWhitelist, WHITELIST)
            {
                tracing::warn!("tesseract whitelist rejected: {}", e);
                return None;
            }
            if let Err(e) = engine.set_image_from_mem(image_bytes) {
                tracing::debug!("tesseract could not load image: {}", e);
                return None;
            }
            let text = match engine.get_utf8_text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("tesseract recognition failed: {}", e);
                    return None;
                }
            };
            let cleaned: String = text.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        }
    }

    impl CaptchaOcr for TesseractOcr {
        fn recognize(&self, image_bytes: &[u8]) -> Option<String> {
            if let Some(text) = self.attempt(image_bytes) {
                tracing::info!("CAPTCHA recognized on raw image: {}", text);
                return Some(text);
            }
            let processed = preprocess(image_bytes)?;
            match self.attempt(&processed) {
                Some(text) => {
                    tracing::info!("CAPTCHA recognized after preprocessing: {}", text);
                    Some(text)
                }
                None => {
                    tracing::warn!("CAPTCHA not recognized on raw or preprocessed image");
                    None
                }
            }
        }
    }

    /// Cleans a CAPTCHA image for a second recognition attempt: grayscale,
    /// Otsu global threshold, median-filter denoise, 2x smooth upscale.
    pub fn preprocess(image_bytes: &[u8]) -> Option<Vec<u8>> {
        let img = match image::load_from_memory(image_bytes) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("could not decode CAPTCHA image: {}", e);
                return None;
            }
        };
        let gray = img.to_luma8();
        let level = imageproc::contrast::otsu_level(&gray);
        let binary =
            imageproc::contrast::threshold(&gray, level, imageproc::contrast::ThresholdType::Binary);
        let denoised = imageproc::filter::median_filter(&binary, 1, 1);
        let (width, height) = denoised.dimensions();
        let scaled = image::imageops::resize(
            &denoised,
            width * 2,
            height * 2,
            image::imageops::FilterType::CatmullRom,
        );

        let mut out = Vec::new();
        let encode = image::DynamicImage::ImageLuma8(scaled)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png);
        if let Err(e) = encode {
            tracing::warn!("could not encode preprocessed image: {}", e);
            return None;
        }
        Some(out)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr(&'static str);

    impl CaptchaOcr for FixedOcr {
        fn recognize(&self, _image_bytes: &[u8]) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn trait_is_object_safe() {
        let ocr: &dyn CaptchaOcr = &FixedOcr("XK4F2");
        assert_eq!(ocr.recognize(&[]), Some("XK4F2".to_string()));
    }
}
