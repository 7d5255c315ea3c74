use std::collections::BTreeMap;

use crate::error::AppError;

/// Field-keyed validation messages, rendered as the `fields` map of a 422.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        // First message per field wins.
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    pub fn required(&mut self, field: &str, value: &str, max_len: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "is required");
        } else if trimmed.chars().count() > max_len {
            self.add(field, format!("must be at most {max_len} characters"));
        }
    }

    pub fn non_negative(&mut self, field: &str, value: i64) {
        if value < 0 {
            self.add(field, "must not be negative");
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.add(field, "must be a valid email address");
        }
    }

    pub fn slug(&mut self, field: &str, value: &str) {
        if !is_valid_slug(value) {
            self.add(field, "may only contain lowercase letters, digits and dashes");
        }
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Lowercase, ASCII alphanumerics joined by single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `resource:action`, both parts lowercase words.
pub fn is_valid_permission_key(key: &str) -> bool {
    let part_ok = |p: &str| {
        !p.is_empty()
            && p.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    };
    match key.split_once(':') {
        Some((resource, action)) => part_ok(resource) && part_ok(action),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Grain-Free Dog Food (5kg) "), "grain-free-dog-food-5kg");
        assert_eq!(slugify("Cat & Kitten"), "cat-kitten");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugs_are_checked() {
        assert!(is_valid_slug("chew-toys-2"));
        assert!(!is_valid_slug("Chew Toys"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn permission_keys_need_resource_and_action() {
        assert!(is_valid_permission_key("product:update"));
        assert!(is_valid_permission_key("admin:access"));
        assert!(!is_valid_permission_key("product"));
        assert!(!is_valid_permission_key("Product:Update"));
        assert!(!is_valid_permission_key(":update"));
    }

    #[test]
    fn field_errors_keep_first_message() {
        let mut errors = FieldErrors::default();
        errors.required("name", "   ", 10);
        errors.add("name", "second");
        errors.non_negative("price", -1);
        errors.email("email", "not-an-email");
        assert_eq!(errors.get("name"), Some("is required"));
        assert_eq!(errors.get("price"), Some("must not be negative"));
        assert!(errors.get("email").is_some());
        assert!(matches!(errors.finish(), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_errors_pass() {
        let mut errors = FieldErrors::default();
        errors.required("name", "Kibble", 200);
        errors.email("email", "owner@petshop.test");
        assert!(errors.finish().is_ok());
    }
}
