//! Template rendering: placeholder substitution, repeatable sections and
//! unsubscribe link construction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::error::{AppError, Result};

use super::store::{BlobStore, TemplateStore};
use super::types::{Deliverable, ParamValue, Parameters, TemplateKey};

/// Marker substituted with the unsubscribe link before any parameter
/// substitution runs.
const UNSUBSCRIBE_MARKER: &str = "{{UNSUBSCRIBE_LINK}}";

/// Resolves a template and renders it into a send-ready [`Deliverable`].
///
/// Pure given its inputs aside from one template read and one blob read.
/// A missing template is non-fatal and yields `Ok(None)`; every other
/// failure is a caller-visible error.
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
    blobs: Arc<dyn BlobStore>,
    config: NotificationConfig,
}

impl TemplateRenderer {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        blobs: Arc<dyn BlobStore>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            config,
        }
    }

    pub async fn render(
        &self,
        key: &TemplateKey,
        destination: Option<&str>,
        parameters: &Parameters,
    ) -> Result<Option<Deliverable>> {
        let Some(template) = self.store.get(key).await? else {
            tracing::warn!(template_key = %key, "Missing email template");
            return Ok(None);
        };

        let destination = match destination.or(template.fallback_to.as_deref()) {
            Some(d) => d.to_string(),
            None => {
                return Err(AppError::Validation(format!(
                    "Destination is required for email notification {}",
                    key
                )))
            }
        };

        if template.subject.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "Subject is required for email notification {}",
                key
            )));
        }

        let blob_path = format!("{}/{}", template.tenant, template.blob);
        let bytes = self
            .blobs
            .get(&self.config.template_folder, &blob_path)
            .await?
            .ok_or_else(|| AppError::Configuration(format!("Missing template: {}", blob_path)))?;
        let mut body = String::from_utf8_lossy(&bytes).into_owned();

        let link = self.build_unsubscribe_link(&destination, &template.tenant, &template.channel);
        body = body.replace(UNSUBSCRIBE_MARKER, &link);
        let mut subject = template.subject.replace(UNSUBSCRIBE_MARKER, &link);

        for (name, value) in parameters {
            match value {
                ParamValue::Scalar(v) => {
                    let marker = format!("{{{{{}}}}}", name.to_uppercase());
                    let encoded = html_escape(v);
                    subject = subject.replace(&marker, &encoded);
                    body = body.replace(&marker, &encoded);
                }
                // Only the body is eligible for section processing
                ParamValue::Rows(rows) => {
                    body = render_section(&body, name, rows);
                }
            }
        }

        Ok(Some(Deliverable {
            from: template.from,
            from_name: template.from_name,
            to: destination,
            to_name: None,
            subject,
            body,
        }))
    }

    fn build_unsubscribe_link(&self, email: &str, tenant: &str, channel: &str) -> String {
        format!(
            "https://{}/unsubscribe?email={}&tenant={}&channel={}",
            self.config.self_host,
            urlencoding::encode(email),
            urlencoding::encode(tenant),
            urlencoding::encode(channel)
        )
    }
}

/// Instantiate the repeatable section named by `name` once per row.
///
/// The section is bounded by `<!-- NAME BEGIN -->` / `<!-- NAME END -->`
/// comment markers; the first BEGIN and the first END after it delimit the
/// region. Missing or misordered markers leave the body untouched. The
/// markers themselves always survive; only the region between them is
/// replaced.
fn render_section(body: &str, name: &str, rows: &[HashMap<String, String>]) -> String {
    let section = name.to_uppercase();
    let begin_tag = format!("<!-- {} BEGIN -->", section);
    let end_tag = format!("<!-- {} END -->", section);

    let Some(begin_at) = body.find(&begin_tag) else {
        return body.to_string();
    };
    let inner_start = begin_at + begin_tag.len();
    let Some(end_offset) = body[inner_start..].find(&end_tag) else {
        return body.to_string();
    };
    let end_at = inner_start + end_offset;

    let fragment = body[inner_start..end_at].trim();
    let instantiated: Vec<String> = rows
        .iter()
        .map(|row| {
            let mut rendered = fragment.to_string();
            for (sub_key, sub_value) in row {
                let marker = format!("{{{{{}}}}}", sub_key.to_uppercase());
                rendered = rendered.replace(&marker, &html_escape(sub_value));
            }
            rendered
        })
        .collect();

    format!(
        "{}{}{}",
        &body[..inner_start],
        instantiated.join("\n"),
        &body[end_at..]
    )
}

/// Escape HTML-special characters in substituted values.
fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
