//! Hook definitions as they appear in `hooks.yaml`.

use serde::Deserialize;
use simgate_core::ParamSpec;

/// Body encoding of a webhook request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// `application/json`.
    #[default]
    Json,
    /// `application/xml`, with a `<data>` root element.
    Xml,
    /// `application/x-www-form-urlencoded`, as `body=<json>`.
    Form,
}

impl DataType {
    /// The `Content-Type` header value.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Xml => "application/xml; charset=utf-8",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// One extra header sent with every request of a hook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// A named filter and its configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterSpec {
    /// Name the filter is registered under.
    pub name: String,
    /// Filter-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// One webhook endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebHook {
    /// Target URL.
    pub address: String,
    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Body encoding.
    #[serde(default)]
    pub data_type: DataType,
    /// Disabled hooks are dropped when the table is built.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether the payload includes detail data.
    #[serde(default = "default_true")]
    pub details: bool,
    /// Top-level payload keys the hook may see. `*` allows everything.
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
    /// Optional filter deciding per event whether to deliver.
    #[serde(default)]
    pub filter: Option<FilterSpec>,
}

impl WebHook {
    /// An enabled JSON `POST` hook to `address` with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            method: default_method(),
            headers: Vec::new(),
            data_type: DataType::default(),
            enabled: true,
            details: true,
            permissions: default_permissions(),
            filter: None,
        }
    }

    /// Whether `key` may appear in this hook's payload.
    pub fn permits(&self, key: &str) -> bool {
        self.permissions
            .iter()
            .any(|allowed| allowed == "*" || allowed == key)
    }
}

/// A named command that fans out to webhooks when invoked.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandHook {
    /// Disabled commands are not registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra names the command answers to.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Declared command parameters, checked before dispatch.
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    /// Hooks notified when the command runs.
    #[serde(default)]
    pub hooks: Vec<WebHook>,
}

fn default_method() -> String {
    String::from("POST")
}

const fn default_true() -> bool {
    true
}

fn default_permissions() -> Vec<String> {
    vec![String::from("*")]
}
