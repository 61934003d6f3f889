use validator::{validate_email, Validate, ValidationError, ValidationErrors};

use crate::error::{NotifyError, NotifyResult};

pub fn validate_model<T: Validate>(model: &T) -> NotifyResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(NotifyError::validation("model", error_messages))
        }
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = match &error.code {
                std::borrow::Cow::Borrowed("email") => "Invalid email format".to_string(),
                std::borrow::Cow::Borrowed("length") => {
                    format!("Length validation failed for field '{}'", field)
                }
                _ => format!("Validation failed for field '{}': {}", field, error.code),
            };
            messages.push(message);
        }
    }

    messages.join(", ")
}

/// Validates every entry of an address list as a well-formed email address.
pub fn validate_email_list(addresses: &[String]) -> Result<(), ValidationError> {
    for address in addresses {
        if address.is_empty() || !validate_email(address) {
            let mut error = ValidationError::new("email");
            error.message = Some(format!("'{}' is not a valid email address", address).into());
            return Err(error);
        }
    }
    Ok(())
}

/// Strong-password rule: at least 8 characters with one lowercase letter,
/// one uppercase letter, one digit and one symbol.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.len() >= 8;
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if long_enough && has_lower && has_upper && has_digit && has_symbol {
        Ok(())
    } else {
        let mut error = ValidationError::new("password");
        error.message = Some(
            "Password must be at least 8 characters and contain an uppercase letter, \
             a lowercase letter, a number and a symbol"
                .into(),
        );
        Err(error)
    }
}
