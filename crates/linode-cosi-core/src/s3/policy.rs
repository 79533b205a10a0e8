//! Bucket policy templates.
//!
//! A policy parameter is a JSON document in which `{{.BucketName}}` stands for
//! the bucket label. No other template action is supported. The rendered
//! document must look like an S3 bucket policy: a `Version`, and a non-empty
//! `Statement` list whose entries each carry an `Effect`, a `Principal`, an
//! `Action` and a `Resource`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::PolicyError;

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap_or_else(|e| panic!("invalid action regex: {e}"))
});

/// Substitute the bucket label into a policy template.
pub fn render_policy_template(template: &str, bucket_name: &str) -> Result<String, PolicyError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in ACTION.captures_iter(template) {
        let (Some(whole), Some(action)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        match action.as_str().trim() {
            ".BucketName" => {}
            other => {
                return Err(PolicyError::Template(format!(
                    "unsupported action {{{{{other}}}}}"
                )));
            }
        }
        out.push_str(&template[last..whole.start()]);
        out.push_str(bucket_name);
        last = whole.end();
    }

    let rest = &template[last..];
    if rest.contains("{{") {
        return Err(PolicyError::Template("unclosed action".to_owned()));
    }
    out.push_str(rest);
    Ok(out)
}

/// Check that a document has the shape of an S3 bucket policy. An empty
/// document is accepted and means "no policy".
pub fn validate_policy(policy: &str) -> Result<(), PolicyError> {
    if policy.trim().is_empty() {
        return Ok(());
    }

    let doc: Value = serde_json::from_str(policy)?;

    match doc.get("Version") {
        Some(Value::String(v)) if !v.is_empty() => {}
        _ => return Err(PolicyError::Invalid("Version is required".to_owned())),
    }

    let statements = match doc.get("Statement") {
        Some(Value::Array(list)) if !list.is_empty() => list,
        _ => {
            return Err(PolicyError::Invalid(
                "Statement must be a non-empty list".to_owned(),
            ));
        }
    };

    for (i, stmt) in statements.iter().enumerate() {
        match stmt.get("Effect") {
            Some(Value::String(e)) if !e.is_empty() => {}
            _ => return Err(invalid_field(i, "Effect")),
        }
        if !stmt.get("Action").is_some_and(is_string_or_list) {
            return Err(invalid_field(i, "Action"));
        }
        if !stmt.get("Resource").is_some_and(is_string_or_list) {
            return Err(invalid_field(i, "Resource"));
        }
        if !stmt.get("Principal").is_some_and(is_principal) {
            return Err(invalid_field(i, "Principal"));
        }
    }

    Ok(())
}

fn invalid_field(index: usize, field: &str) -> PolicyError {
    PolicyError::Invalid(format!("Statement[{index}].{field} is missing or malformed"))
}

/// A non-empty string, or a non-empty list of strings.
fn is_string_or_list(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_string),
        _ => false,
    }
}

/// `"*"`, `{"AWS": ...}` or a list of strings.
fn is_principal(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.values().all(is_string_or_list),
        other => is_string_or_list(other),
    }
}
