use crate::error::FetchError;

/// Placeholder replaced by the percent-encoded document id.
pub const PLACEHOLDER: &str = "{}";

/// Default template, pointing at the public manual repository.
pub const DEFAULT_URL_TEMPLATE: &str = "https://ktane.timwi.de/PDF/{}.pdf";

/// A fetch URL template with exactly one `{}` placeholder.
///
/// ```
/// use manual_renderer::fetch::UrlTemplate;
///
/// let template = UrlTemplate::parse("https://example.com/PDF/{}.pdf").unwrap();
/// assert_eq!(
///     template.render("Who's on First"),
///     "https://example.com/PDF/Who%27s%20on%20First.pdf"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    prefix: String,
    suffix: String,
}

impl UrlTemplate {
    /// Parse and validate a template.
    ///
    /// The template must contain exactly one placeholder and, once filled
    /// in, form an absolute `http` or `https` URL.
    pub fn parse(template: &str) -> Result<Self, FetchError> {
        let invalid = |reason: &str| FetchError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, suffix) = template
            .split_once(PLACEHOLDER)
            .ok_or_else(|| invalid("missing {} placeholder"))?;
        if suffix.contains(PLACEHOLDER) {
            return Err(invalid("more than one {} placeholder"));
        }

        let parsed = Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        };

        let sample = url::Url::parse(&parsed.render("sample"))
            .map_err(|e| invalid(&format!("not a valid URL: {}", e)))?;
        if sample.scheme() != "http" && sample.scheme() != "https" {
            return Err(invalid("scheme must be http or https"));
        }

        Ok(parsed)
    }

    /// Build the fetch URL for `id`.
    pub fn render(&self, id: &str) -> String {
        format!("{}{}{}", self.prefix, urlencoding::encode(id), self.suffix)
    }
}

impl std::fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.prefix, PLACEHOLDER, self.suffix)
    }
}
