use super::cell::Value;

/// Format a computed value for display.
pub fn format_value(value: &Value, precision: Option<usize>) -> String {
    match value {
        Value::Number(n) => format_number(*n, precision),
        Value::Text(text) => text.clone(),
        Value::Error(tag) => tag.as_str().to_string(),
    }
}

/// Format a number for display.
///
/// With no precision, integral values print without a fractional part and
/// everything else uses the shortest representation that round-trips.
pub fn format_number(n: f64, precision: Option<usize>) -> String {
    // Avoid "-0".
    let n = if n == 0.0 { 0.0 } else { n };
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if let Some(digits) = precision {
        format!("{:.*}", digits, n)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}
