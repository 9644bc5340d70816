//! Domain-name checks for record-set zones and names

use crate::error::{Error, Result};

/// Whether `name` is fully qualified (ends in an unescaped dot)
pub fn is_fqdn(name: &str) -> bool {
    let Some(stripped) = name.strip_suffix('.') else {
        return false;
    };

    // An even number of backslashes before the final dot leaves it unescaped
    let escapes = stripped.chars().rev().take_while(|c| *c == '\\').count();
    escapes % 2 == 0
}

/// A zone must be fully qualified and carry no surrounding whitespace
pub fn validate_zone(zone: &str) -> Result<()> {
    if zone.trim() != zone {
        return Err(Error::validation(format!(
            "DNS zone name must not contain whitespace: {:?}",
            zone
        )));
    }
    if !is_fqdn(zone) {
        return Err(Error::validation(format!(
            "DNS zone name must be fully qualified: {:?}",
            zone
        )));
    }
    Ok(())
}

/// A record name must be non-empty, relative, and carry no surrounding whitespace
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.trim() != name {
        return Err(Error::validation(format!(
            "DNS record name must not contain whitespace or be empty: {:?}",
            name
        )));
    }
    if is_fqdn(name) {
        return Err(Error::validation(format!(
            "DNS record name must not be fully qualified: {:?}",
            name
        )));
    }
    Ok(())
}
