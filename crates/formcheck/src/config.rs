//! Pipeline configuration, per-form options and the surrounding page

use indexmap::IndexMap;

use crate::dom::Config as ParserConfig;

/// User-visible strings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Messages {
    /// Banner for exactly one invalid control
    pub single_error: String,
    /// Banner for two or more invalid controls
    pub multiple_errors: String,
    pub send_failure: String,
    /// Shown in place of an empty field in the stripped rendering
    pub empty_placeholder: String,
    pub parse_error_heading: String,
    pub root_error_heading: String,
    pub configuration_error_heading: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            single_error: "There was an error with your form submission.".to_string(),
            multiple_errors: "There were errors with your form submission.".to_string(),
            send_failure: "We were unable to accept your request at this time (unable to send email). Please try again.".to_string(),
            empty_placeholder: crate::strip::EMPTY_PLACEHOLDER.to_string(),
            parse_error_heading: "XML Parse Error".to_string(),
            root_error_heading: "XML Wellformedness Error".to_string(),
            configuration_error_heading: "Error".to_string(),
        }
    }
}

impl Messages {
    /// Banner text for `count` invalid controls
    pub fn validation_banner(&self, count: usize) -> &str {
        if count == 1 {
            &self.single_error
        } else {
            &self.multiple_errors
        }
    }
}

/// Knobs for one pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Strip backslash escaping from request values before populating
    pub unescape_request: bool,
    pub parser: ParserConfig,
    pub messages: Messages,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unescape_request(mut self, enabled: bool) -> Self {
        self.unescape_request = enabled;
        self
    }

    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }
}

/// Per-embedding options; empty strings and zero ids mean "not given"
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FormOptions {
    pub name: String,
    pub recipient: String,
    pub subject: String,
    pub success_url: String,
    pub success_page_id: u64,
    /// Copy the submitter on the notification email
    pub cc_sender: bool,
    pub html_email: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            recipient: String::new(),
            subject: String::new(),
            success_url: String::new(),
            success_page_id: 0,
            cc_sender: false,
            html_email: true,
        }
    }
}

impl FormOptions {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Page the form is embedded in
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Page {
    pub permalink: String,
    pub title: String,
    /// Fallback recipient
    pub admin_email: String,
    /// Page metadata such as `form_name` or `form_recipient`
    pub meta: IndexMap<String, String>,
    /// Permalinks of other pages, for `success_page_id`
    pub permalinks: IndexMap<u64, String>,
}

impl Page {
    /// Non-empty metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn permalink_of(&self, page_id: u64) -> Option<&str> {
        self.permalinks.get(&page_id).map(String::as_str)
    }
}

/// Options after applying page metadata and fallbacks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub name: String,
    pub recipient: String,
    pub subject: String,
    pub success_url: String,
    pub cc_sender: bool,
    pub html_email: bool,
}

/// Fill unset options from page metadata; `None` when no form name is known
pub fn resolve(options: &FormOptions, page: &Page) -> Option<ResolvedOptions> {
    let name = non_empty(&options.name).or_else(|| page.meta("form_name"))?;

    let recipient = non_empty(&options.recipient)
        .or_else(|| page.meta("form_recipient"))
        .unwrap_or(page.admin_email.as_str())
        .to_string();

    let subject = non_empty(&options.subject)
        .or_else(|| page.meta("form_subject"))
        .map_or_else(|| format!("Form submission: {}", page.title), str::to_string);

    let success_page_id = match options.success_page_id {
        0 => page
            .meta("form_success_page_id")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0),
        id => id,
    };
    let mut success_url = options.success_url.clone();
    if success_page_id != 0 {
        success_url = page.permalink_of(success_page_id).unwrap_or_default().to_string();
    }
    if success_url.is_empty() {
        success_url = page.meta("form_success_url").unwrap_or_default().to_string();
    }

    let html_email = match page.meta.get("form_html_email") {
        Some(raw) => raw.trim().parse::<i64>().is_ok_and(|flag| flag != 0),
        None => options.html_email,
    };

    Some(ResolvedOptions {
        name: name.to_string(),
        recipient,
        subject,
        success_url,
        cc_sender: options.cc_sender,
        html_email,
    })
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page {
            permalink: "/contact/".to_string(),
            title: "Contact".to_string(),
            admin_email: "admin@example.org".to_string(),
            ..Page::default()
        }
    }

    #[test]
    fn test_missing_name() {
        assert_eq!(resolve(&FormOptions::default(), &page()), None);
    }

    #[test]
    fn test_fallbacks() {
        let resolved = resolve(&FormOptions::named("contact"), &page());
        let resolved = resolved.as_ref();
        assert_eq!(resolved.map(|r| r.recipient.as_str()), Some("admin@example.org"));
        assert_eq!(resolved.map(|r| r.subject.as_str()), Some("Form submission: Contact"));
        assert_eq!(resolved.map(|r| r.success_url.as_str()), Some(""));
        assert_eq!(resolved.map(|r| r.html_email), Some(true));
    }

    #[test]
    fn test_meta_overrides() {
        let mut page = page();
        for (key, value) in [
            ("form_name", "signup"),
            ("form_recipient", "team@example.org"),
            ("form_subject", "New signup"),
            ("form_success_page_id", "7"),
            ("form_success_url", "/ignored/"),
            ("form_html_email", "0"),
        ] {
            page.meta.insert(key.to_string(), value.to_string());
        }
        page.permalinks.insert(7, "/thanks/".to_string());

        let resolved = resolve(&FormOptions::default(), &page);
        assert_eq!(
            resolved,
            Some(ResolvedOptions {
                name: "signup".to_string(),
                recipient: "team@example.org".to_string(),
                subject: "New signup".to_string(),
                success_url: "/thanks/".to_string(),
                cc_sender: false,
                html_email: false,
            })
        );
    }

    #[test]
    fn test_explicit_options_win() {
        let mut page = page();
        page.meta.insert("form_recipient".to_string(), "meta@example.org".to_string());
        page.meta.insert("form_success_url".to_string(), "/meta/".to_string());
        let options = FormOptions {
            recipient: "opt@example.org".to_string(),
            success_url: "/opt/".to_string(),
            ..FormOptions::named("contact")
        };
        let resolved = resolve(&options, &page);
        assert_eq!(resolved.as_ref().map(|r| r.recipient.as_str()), Some("opt@example.org"));
        assert_eq!(resolved.as_ref().map(|r| r.success_url.as_str()), Some("/opt/"));
    }

    #[test]
    fn test_banner_wording() {
        let messages = Messages::default();
        assert_eq!(messages.validation_banner(1), messages.single_error);
        assert_eq!(messages.validation_banner(3), messages.multiple_errors);
    }
}
