//! Submission orchestration: ties parsing, population, validation, error
//! presentation and the email rendering together for one request

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::config::{resolve, FormOptions, Page, PipelineConfig, ResolvedOptions};
use crate::dom::serialize::escape_text;
use crate::dom::{self, Document, FilterChain, NodeId};
use crate::email::{compose_headers, plain_text_body, EmailMessage, HeaderOptions, Mailer, Sender};
use crate::error::{Error, ErrorKind};
use crate::populate::{populate, Submission};
use crate::present::{diagnostic_panel, present_errors, set_autofocus, submit_control};
use crate::request::Request;
use crate::strip::strip;
use crate::validate::{should_validate, validate, CustomValidity};

/// Class token added to the form when validation fails
pub const BAD_REQUEST_CLASS: &str = "form_error_400";

type MarkupSource = Box<dyn Fn(&FormOptions) -> String>;

/// Form markup producers keyed by form name
#[derive(Default)]
pub struct FormRegistry {
    forms: IndexMap<String, MarkupSource>,
}

impl fmt::Debug for FormRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRegistry")
            .field("forms", &self.forms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, source: F) -> &mut Self
    where
        F: Fn(&FormOptions) -> String + 'static,
    {
        self.forms.insert(name.to_string(), Box::new(source));
        self
    }

    /// Register fixed markup
    pub fn register_markup(&mut self, name: &str, markup: impl Into<String>) -> &mut Self {
        let markup = markup.into();
        self.register(name, move |_| markup.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forms.contains_key(name)
    }

    pub fn markup(&self, name: &str, options: &FormOptions) -> Option<String> {
        self.forms.get(name).map(|source| source(options))
    }
}

/// Error raised by the processing step; its message is shown to the user
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProcessingFailure {
    pub message: String,
}

impl ProcessingFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a form was not rendered normally
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Failure {
    #[error("form markup is malformed: {0}")]
    Parse(#[from] Error),
    #[error("form configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Processing(#[from] ProcessingFailure),
}

/// Extension points around the pipeline. Every method has a no-op default.
pub trait FormHooks {
    fn before_validation(&self, _form: &str, _doc: &mut Document) {}

    /// Non-empty message marks `control` as invalid
    fn custom_validity(&self, _doc: &Document, _control: NodeId, _form: &str) -> String {
        String::new()
    }

    /// Runs on a valid submission before any email is built
    fn process_submission(&self, _form: &str, _doc: &mut Document) -> Result<(), ProcessingFailure> {
        Ok(())
    }

    /// Runs on the copy that becomes the email body
    fn before_controls_removed(&self, _form: &str, _doc: &mut Document) {}

    fn recipient(&self, recipient: String, _form: &str, _doc: &Document) -> String {
        recipient
    }

    fn recipient_cc(&self, _form: &str, _doc: &Document) -> String {
        String::new()
    }

    fn recipient_bcc(&self, _form: &str, _doc: &Document) -> String {
        String::new()
    }

    fn subject(&self, subject: String, _form: &str, _doc: &Document) -> String {
        subject
    }

    fn success_url(&self, url: String, _form: &str, _doc: &Document) -> String {
        url
    }

    fn on_email(&self, _form: &str, _sent: bool, _message: &EmailMessage) {}

    fn on_success(&self, _submitter: &str, _success_url: &str) {}
}

/// Hooks that change nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl FormHooks for NoHooks {}

struct HookValidity<'a>(&'a dyn FormHooks);

impl CustomValidity for HookValidity<'_> {
    fn validity_message(&self, doc: &Document, control: NodeId, form_name: &str) -> String {
        self.0.custom_validity(doc, control, form_name)
    }
}

/// HTTP status the embedding should respond with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusIntent {
    #[default]
    Ok,
    BadRequest,
    InternalError,
}

impl StatusIntent {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::InternalError => 500,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The form was shown without validating
    Displayed,
    Invalid { count: usize },
    Submitted,
    Failed(Failure),
}

/// Redirect the embedding should issue after a successful submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    pub status: u16,
}

impl Redirect {
    pub fn see_other(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 303,
        }
    }
}

/// Everything one render produced
#[derive(Clone, Debug, PartialEq)]
pub struct Rendered {
    pub markup: String,
    pub status: StatusIntent,
    pub outcome: Outcome,
    pub redirect: Option<Redirect>,
    /// The submission email, built on successful submission
    pub email: Option<EmailMessage>,
}

impl Rendered {
    fn new(markup: String, status: StatusIntent, outcome: Outcome) -> Self {
        Self {
            markup,
            status,
            outcome,
            redirect: None,
            email: None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.outcome == Outcome::Submitted
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Renderings already produced during the current request, keyed by form
/// name. Create one per request.
#[derive(Clone, Debug, Default)]
pub struct RenderCache {
    entries: HashMap<String, Rendered>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, form: &str) -> Option<&Rendered> {
        self.entries.get(form)
    }

    pub fn insert(&mut self, form: &str, rendered: Rendered) {
        self.entries.insert(form.to_string(), rendered);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders registered forms against requests
pub struct FormHandler<'m> {
    registry: FormRegistry,
    mailer: &'m dyn Mailer,
    hooks: Box<dyn FormHooks>,
    config: PipelineConfig,
    filters: FilterChain,
}

impl fmt::Debug for FormHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormHandler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl<'m> FormHandler<'m> {
    pub fn new(registry: FormRegistry, mailer: &'m dyn Mailer) -> Self {
        Self {
            registry,
            mailer,
            hooks: Box::new(NoHooks),
            config: PipelineConfig::default(),
            filters: FilterChain::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl FormHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn registry(&self) -> &FormRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Render one embedded form for the current request. Diagnostics are
    /// returned as markup, never as errors.
    #[instrument(level = "debug", skip_all, fields(form = %options.name, method = %request.method))]
    pub fn render(
        &self,
        options: &FormOptions,
        page: &Page,
        request: &Request,
        cache: &mut RenderCache,
    ) -> Rendered {
        let Some(resolved) = resolve(options, page) else {
            return self.configuration_error(
                "Missing required <code>form_name</code> page meta or <code>name</code> option for the form.".to_string(),
            );
        };

        if let Some(cached) = cache.get(&resolved.name) {
            debug!(form = resolved.name.as_str(), "serving cached rendering");
            return cached.clone();
        }

        let rendered = self.render_uncached(&resolved, options, page, request);
        cache.insert(&resolved.name, rendered.clone());
        rendered
    }

    fn render_uncached(
        &self,
        resolved: &ResolvedOptions,
        options: &FormOptions,
        page: &Page,
        request: &Request,
    ) -> Rendered {
        let name = resolved.name.as_str();
        let Some(markup) = self.registry.markup(name, options) else {
            return self.configuration_error(format!(
                "No form named <code>{}</code> is registered.",
                escape_text(name)
            ));
        };
        if markup.is_empty() {
            debug!(form = name, "form source returned no markup");
            return Rendered::new(
                format!("<!-- form handler '{name}' returned nothing -->"),
                StatusIntent::Ok,
                Outcome::Displayed,
            );
        }

        let mut doc = match dom::parse_with_config(&markup, self.config.parser) {
            Ok(doc) => doc,
            Err(err) => return self.parse_error(name, &markup, err),
        };
        apply_form_defaults(&mut doc, name, page);

        let request = if self.config.unescape_request {
            Cow::Owned(request.unescaped())
        } else {
            Cow::Borrowed(request)
        };
        let submission = populate(&mut doc, &request);
        self.hooks.before_validation(name, &mut doc);

        if !should_validate(&doc, &request) {
            debug!(form = name, "request does not submit this form");
            return Rendered::new(self.serialize(&doc), StatusIntent::Ok, Outcome::Displayed);
        }

        let report = validate(&mut doc, name, &HookValidity(self.hooks.as_ref()));
        if let Some(first) = report.first() {
            info!(form = name, invalid = report.count(), "submission failed validation");
            let root = doc.root();
            doc.add_class(root, BAD_REQUEST_CLASS);
            set_autofocus(&mut doc, first);
            present_errors(&mut doc, self.config.messages.validation_banner(report.count()));
            return Rendered::new(
                self.serialize(&doc),
                StatusIntent::BadRequest,
                Outcome::Invalid {
                    count: report.count(),
                },
            );
        }

        match self.submit(resolved, &mut doc, &submission) {
            Ok(rendered) => rendered,
            Err(failure) => {
                warn!(form = name, %failure, "submission processing failed");
                present_errors(&mut doc, &failure.message);
                if let Some(submit) = submit_control(&doc) {
                    set_autofocus(&mut doc, submit);
                }
                Rendered::new(
                    self.serialize(&doc),
                    StatusIntent::InternalError,
                    Outcome::Failed(Failure::Processing(failure)),
                )
            }
        }
    }

    fn submit(
        &self,
        resolved: &ResolvedOptions,
        doc: &mut Document,
        submission: &Submission,
    ) -> Result<Rendered, ProcessingFailure> {
        let name = resolved.name.as_str();
        self.hooks.process_submission(name, doc)?;

        let mut email_doc = doc.clone();
        self.hooks.before_controls_removed(name, &mut email_doc);
        let body = if resolved.html_email {
            strip(email_doc, &self.filters, &self.config.messages.empty_placeholder)
        } else {
            plain_text_body(submission, doc)
        };

        let sender = Sender::detect(doc);
        let from = sender.mailbox();
        let cc = self.hooks.recipient_cc(name, doc);
        let bcc = self.hooks.recipient_bcc(name, doc);
        let headers = compose_headers(
            from.as_deref(),
            HeaderOptions {
                html: resolved.html_email,
                cc_sender: resolved.cc_sender,
                cc: &cc,
                bcc: &bcc,
            },
        );

        let message = EmailMessage {
            recipient: self.hooks.recipient(resolved.recipient.clone(), name, doc),
            subject: self.hooks.subject(resolved.subject.clone(), name, doc),
            body,
            headers,
        };

        if message.recipient.is_empty() {
            debug!(form = name, "no recipient; skipping email");
        } else {
            let sent = self.mailer.send(&message);
            info!(form = name, recipient = message.recipient.as_str(), sent, "submission email");
            self.hooks.on_email(name, sent, &message);
            if !sent {
                return Err(ProcessingFailure::new(self.config.messages.send_failure.as_str()));
            }
        }

        let success_url = self.hooks.success_url(resolved.success_url.clone(), name, doc);
        self.hooks.on_success(&sender.name, &success_url);

        let mut rendered = Rendered::new(message.body.clone(), StatusIntent::Ok, Outcome::Submitted);
        if !success_url.is_empty() {
            rendered.redirect = Some(Redirect::see_other(success_url));
        }
        rendered.email = Some(message);
        Ok(rendered)
    }

    fn serialize(&self, doc: &Document) -> String {
        doc.serialize(&self.filters)
    }

    fn configuration_error(&self, message: String) -> Rendered {
        warn!(%message, "form configuration error");
        let markup = diagnostic_panel(&self.config.messages.configuration_error_heading, &message, None);
        Rendered::new(markup, StatusIntent::Ok, Outcome::Failed(Failure::Configuration(message)))
    }

    fn parse_error(&self, name: &str, markup: &str, err: Error) -> Rendered {
        warn!(form = name, error = %err, excerpt = err.excerpt(markup).unwrap_or_default(), "form markup rejected");
        let name = escape_text(name);
        let (heading, message) = match err.kind() {
            ErrorKind::RootNotForm { .. } => (
                &self.config.messages.root_error_heading,
                format!("The form <code>{name}</code> did not return valid XML. Root element must be <code>form</code>:"),
            ),
            _ => (
                &self.config.messages.parse_error_heading,
                format!(
                    "The form <code>{name}</code> did not return wellformed XML ({}):",
                    escape_text(&err.to_string())
                ),
            ),
        };
        let markup = diagnostic_panel(heading, &message, Some(markup));
        Rendered::new(markup, StatusIntent::Ok, Outcome::Failed(Failure::Parse(err)))
    }
}

/// Fill in `action`, `method` and `id` when the author left them out
fn apply_form_defaults(doc: &mut Document, name: &str, page: &Page) {
    let root = doc.root();
    for (attr, value) in [("action", page.permalink.as_str()), ("method", "post"), ("id", name)] {
        if !doc.has_attr(root, attr) {
            doc.set_attr(root, attr, value);
        }
    }
}
