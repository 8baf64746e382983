/*!
Value converters applied to raw command-line strings.

A converter turns one raw token into a `serde_json::Value`, or explains why
it cannot. Unlike lenient coercion, a failed conversion is an error: the
dispatcher reports it as `InvalidArgument` naming the token.

Built-ins:
  string | integer | number | boolean | list | path
*/

use serde_json::Value;

/// Raw token -> typed value.
pub type Converter = fn(&str) -> Result<Value, String>;

pub fn string(raw: &str) -> Result<Value, String> {
    Ok(Value::String(raw.to_string()))
}

pub fn integer(raw: &str) -> Result<Value, String> {
    raw.trim()
        .parse::<i64>()
        .map(|n| Value::Number(n.into()))
        .map_err(|e| format!("expected an integer ({e})"))
}

pub fn number(raw: &str) -> Result<Value, String> {
    let n = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("expected a number ({e})"))?;
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| "expected a finite number".to_string())
}

pub fn boolean(raw: &str) -> Result<Value, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "n" => Ok(Value::Bool(false)),
        _ => Err("expected a boolean (true/false, yes/no, 1/0)".to_string()),
    }
}

/// Comma separated list; blank items are dropped.
pub fn list(raw: &str) -> Result<Value, String> {
    Ok(Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    ))
}

/// Path with a leading `~` expanded to the home directory.
pub fn path(raw: &str) -> Result<Value, String> {
    if raw.is_empty() {
        return Err("expected a path".to_string());
    }
    let expanded = if raw == "~" || raw.starts_with("~/") {
        let home = dirs::home_dir().ok_or_else(|| "home directory is unknown".to_string())?;
        home.join(raw.trim_start_matches('~').trim_start_matches('/'))
            .to_string_lossy()
            .into_owned()
    } else {
        raw.to_string()
    };
    Ok(Value::String(expanded))
}
