use crate::error::QrFormError;

/// A URL accepted by the form input.
///
/// Mirrors the `type="url" required` constraint of the input control: the
/// value must be non-empty and parse as an absolute URL. The text is kept as
/// typed so the backend receives exactly what the user entered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetUrl(String);

impl TargetUrl {
    pub fn parse(raw: &str) -> Result<Self, QrFormError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QrFormError::MissingUrl);
        }

        url::Url::parse(trimmed).map_err(|_| QrFormError::InvalidUrl(trimmed.to_string()))?;

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
