/// Numeric coercion for operator operands.
///
/// Surrounding whitespace is ignored and an empty operand counts as `0`.
/// Anything else must parse as a float.
pub fn to_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Boolean coercion for logical operators and expression conditions.
///
/// `true`/`1`/`yes` are true, `false`/`0`/`no`/empty are false (case-insensitive),
/// and any other non-empty text is true.
pub fn to_bool(input: &str) -> bool {
    match input.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" | "" => false,
        _ => true,
    }
}
