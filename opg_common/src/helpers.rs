/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Builds a provider receipt reference of the form `rcpt_<epoch millis>`.
pub fn receipt_reference(epoch_millis: i64) -> String {
    format!("rcpt_{epoch_millis}")
}
