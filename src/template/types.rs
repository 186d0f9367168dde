use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Email template metadata, keyed by (tenant, channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub tenant: String,
    pub channel: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    pub subject: String,
    /// Default recipient used when the triggering command names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_to: Option<String>,
    /// Blob path of the body, relative to the tenant's folder
    pub blob: String,
}

/// Lookup key for a template. Channel is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub tenant: String,
    pub channel: String,
}

impl TemplateKey {
    pub fn new(tenant: impl Into<String>, channel: &str) -> Self {
        Self {
            tenant: tenant.into(),
            channel: channel.trim().to_string(),
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tenant, self.channel)
    }
}

/// A parameter supplied with a notification command.
///
/// Decoded at the system boundary as an explicit variant: a plain string
/// substitutes a scalar placeholder, a list of flat string maps instantiates
/// a repeatable body section once per row, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    Rows(Vec<HashMap<String, String>>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

pub type Parameters = HashMap<String, ParamValue>;

/// A fully rendered, send-ready message.
#[derive(Debug, Clone, PartialEq)]
pub struct Deliverable {
    pub from: String,
    pub from_name: Option<String>,
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
}
