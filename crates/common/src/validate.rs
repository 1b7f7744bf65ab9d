//! Shape checks for mutation payloads
//!
//! Run at dispatch time, before a payload reaches the suite document.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Targets become named element handles in generated scripts
static TARGET_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid target label pattern"));

/// `click`, `page.goto`, `assertVisible`
static METHOD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("valid method pattern")
});

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("`{}` must not be empty", field)));
    }
    Ok(())
}

/// An injected id, when present, must be usable as a key
pub fn id(value: Option<&str>) -> Result<()> {
    match value {
        Some(id) => required("id", id),
        None => Ok(()),
    }
}

pub fn target_label(label: &str) -> Result<()> {
    if label.is_empty() || TARGET_LABEL.is_match(label) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "target `{}` must start with a letter, `_` or `$` \
             and contain only letters, digits, `_` or `$`",
            label
        )))
    }
}

pub fn method(name: &str) -> Result<()> {
    if name.is_empty() || METHOD_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!("method `{}` is not a valid method name", name)))
    }
}

pub fn target_options(options: &TargetOptions) -> Result<()> {
    target_label(&options.target)
}

pub fn target_patch(patch: &TargetPatch) -> Result<()> {
    required("id", &patch.id)?;
    if let Some(label) = &patch.target {
        target_label(label)?;
    }
    Ok(())
}

pub fn group_patch(patch: &GroupPatch) -> Result<()> {
    required("id", &patch.id)
}

pub fn test_options(options: &TestOptions) -> Result<()> {
    required("groupId", &options.group_id)
}

pub fn test_patch(patch: &TestPatch) -> Result<()> {
    required("groupId", &patch.group_id)?;
    required("id", &patch.id)
}

pub fn test_ref(test: &TestRef) -> Result<()> {
    required("groupId", &test.group_id)?;
    required("id", &test.id)
}

pub fn command_options(options: &CommandOptions) -> Result<()> {
    required("groupId", &options.group_id)?;
    required("testId", &options.test_id)?;
    method(&options.method)
}

pub fn command_patch(patch: &CommandPatch) -> Result<()> {
    required("groupId", &patch.group_id)?;
    required("testId", &patch.test_id)?;
    required("id", &patch.id)?;
    if let Some(name) = &patch.method {
        method(name)?;
    }
    Ok(())
}

pub fn command_ref(command: &CommandRef) -> Result<()> {
    required("groupId", &command.group_id)?;
    required("testId", &command.test_id)?;
    required("id", &command.id)
}

pub fn remove_id(id: &str) -> Result<()> {
    required("id", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_labels() {
        assert!(target_label("INPUT_FNAME").is_ok());
        assert!(target_label("$btn").is_ok());
        assert!(target_label("").is_ok());
        assert!(matches!(target_label("1ST"), Err(Error::Validation(_))));
        assert!(target_label("has space").is_err());
    }

    #[test]
    fn test_command_requires_back_references() {
        let options = CommandOptions {
            group_id: "g".into(),
            test_id: String::new(),
            method: "click".into(),
            ..Default::default()
        };
        assert!(matches!(command_options(&options), Err(Error::Validation(_))));
    }

    #[test]
    fn test_method_names() {
        assert!(method("page.goto").is_ok());
        assert!(method("click").is_ok());
        assert!(method("page..goto").is_err());
    }

    #[test]
    fn test_empty_injected_id_rejected() {
        assert!(id(Some("  ")).is_err());
        assert!(id(None).is_ok());
    }
}
