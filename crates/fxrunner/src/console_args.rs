//! Encoding of command arguments for the server console.
//!
//! The console is shared with human operators and is tokenized by the server
//! itself: `;` separates commands and input is line oriented. Every argument is
//! therefore turned into one quoted token that the receiving side parses back.
//! Non-string arguments are sent as strings; the receiver is expected to know
//! which ones to parse.

use fxrunner_contracts::SEMICOLON_STANDIN;
use serde_json::Value;

use crate::SupervisorError;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleArg {
    Str(String),
    Int(i64),
    Float(f64),
    /// Structured value. Objects and arrays are sent as escaped JSON; strings
    /// and numbers take their scalar path; `null` and booleans are rejected.
    Json(Value),
}

impl From<&str> for ConsoleArg {
    fn from(v: &str) -> Self {
        ConsoleArg::Str(v.to_string())
    }
}

impl From<String> for ConsoleArg {
    fn from(v: String) -> Self {
        ConsoleArg::Str(v)
    }
}

impl From<i64> for ConsoleArg {
    fn from(v: i64) -> Self {
        ConsoleArg::Int(v)
    }
}

impl From<u32> for ConsoleArg {
    fn from(v: u32) -> Self {
        ConsoleArg::Int(i64::from(v))
    }
}

impl From<f64> for ConsoleArg {
    fn from(v: f64) -> Self {
        ConsoleArg::Float(v)
    }
}

impl From<Value> for ConsoleArg {
    fn from(v: Value) -> Self {
        ConsoleArg::Json(v)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleArgEncoder {
    legacy_semicolon_quirk: bool,
}

impl ConsoleArgEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproduces the historical behavior where `;` was left raw in tokens
    /// holding an odd number of escaped quotes. Off by default.
    pub fn with_legacy_semicolon_quirk(mut self, enabled: bool) -> Self {
        self.legacy_semicolon_quirk = enabled;
        self
    }

    pub fn encode_args(&self, args: &[ConsoleArg]) -> Result<String, SupervisorError> {
        let mut tokens = Vec::with_capacity(args.len());
        for arg in args {
            tokens.push(self.encode_arg(arg)?);
        }
        Ok(tokens.join(" "))
    }

    /// Full console line: `name` alone or `name <encoded args>`.
    pub fn encode_command(
        &self,
        name: &str,
        args: &[ConsoleArg],
    ) -> Result<String, SupervisorError> {
        validate_command_name(name)?;
        if args.is_empty() {
            return Ok(name.to_string());
        }
        Ok(format!("{name} {}", self.encode_args(args)?))
    }

    fn encode_arg(&self, arg: &ConsoleArg) -> Result<String, SupervisorError> {
        match arg {
            ConsoleArg::Str(s) => Ok(self.sanitize(&json_string_literal(s)?)),
            ConsoleArg::Int(n) => Ok(self.sanitize(&json_string_literal(&n.to_string())?)),
            ConsoleArg::Float(f) => Ok(self.sanitize(&json_string_literal(&number_text(*f))?)),
            ConsoleArg::Json(value) => self.encode_json(value),
        }
    }

    fn encode_json(&self, value: &Value) -> Result<String, SupervisorError> {
        match value {
            Value::String(s) => self.encode_arg(&ConsoleArg::Str(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => self.encode_arg(&ConsoleArg::Int(i)),
                None => {
                    let f = n.as_f64().ok_or_else(|| {
                        SupervisorError::Encoding(format!("number out of range: {n}"))
                    })?;
                    self.encode_arg(&ConsoleArg::Float(f))
                }
            },
            Value::Object(_) | Value::Array(_) => {
                let json = serde_json::to_string(value)
                    .map_err(|e| SupervisorError::Encoding(e.to_string()))?;
                let escaped = json.replace('"', "\\\"");
                Ok(format!("\"{}\"", self.sanitize(&escaped)))
            }
            Value::Null => Err(SupervisorError::Encoding(
                "expected string, number or object, got null".to_string(),
            )),
            Value::Bool(b) => Err(SupervisorError::Encoding(format!(
                "expected string, number or object, got boolean {b}"
            ))),
        }
    }

    /// Makes one token safe for the console: semicolons become a look-alike
    /// stand-in and raw newlines become spaces. Escaped quotes are kept as-is.
    pub fn sanitize(&self, token: &str) -> String {
        let skip_semicolons = self.legacy_semicolon_quirk && escaped_quote_count(token) % 2 == 1;
        let mut out = String::with_capacity(token.len());
        for ch in token.chars() {
            match ch {
                ';' if !skip_semicolons => out.push(SEMICOLON_STANDIN),
                '\n' => out.push(' '),
                c => out.push(c),
            }
        }
        out
    }
}

pub fn encode_console_args(args: &[ConsoleArg]) -> Result<String, SupervisorError> {
    ConsoleArgEncoder::new().encode_args(args)
}

fn validate_command_name(name: &str) -> Result<(), SupervisorError> {
    if name.is_empty() {
        return Err(SupervisorError::Encoding("command name is empty".to_string()));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '"' | ';' | '\\'))
    {
        return Err(SupervisorError::Encoding(format!(
            "command name {name:?} contains {bad:?}"
        )));
    }
    Ok(())
}

fn json_string_literal(s: &str) -> Result<String, SupervisorError> {
    serde_json::to_string(s).map_err(|e| SupervisorError::Encoding(e.to_string()))
}

fn escaped_quote_count(token: &str) -> usize {
    token.matches("\\\"").count()
}

// Canonical decimal text, matching what script engines print for numbers.
fn number_text(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }
    let abs = f.abs();
    if !(1e-6..1e21).contains(&abs) {
        let exp = format!("{f:e}");
        return match exp.split_once('e') {
            Some((mantissa, e)) if !e.starts_with('-') => format!("{mantissa}e+{e}"),
            _ => exp,
        };
    }
    // Display is shortest round-trip and drops a zero fraction.
    f.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn standin(s: &str) -> String {
        s.replace(';', &SEMICOLON_STANDIN.to_string())
    }

    #[test]
    fn semicolon_is_replaced_inside_quotes() {
        let out = encode_console_args(&["hello;world".into()]).unwrap();
        assert_eq!(out, standin("\"hello;world\""));
        assert_eq!(out, "\"hello\u{037e}world\"");
    }

    #[test]
    fn numbers_are_quoted_strings() {
        let out = encode_console_args(&[ConsoleArg::Int(60000), ConsoleArg::Float(1.5)]).unwrap();
        assert_eq!(out, "\"60000\" \"1.5\"");
        assert_eq!(number_text(3.0), "3");
        assert_eq!(number_text(-0.0), "0");
        assert_eq!(number_text(f64::INFINITY), "Infinity");
        assert_eq!(number_text(1e21), "1e+21");
        assert_eq!(number_text(1.5e-7), "1.5e-7");
        assert_eq!(number_text(1.2345678901234568e20), "123456789012345680000");
        assert_eq!(number_text(-42.0), "-42");
    }

    #[test]
    fn objects_are_escaped_and_wrapped() {
        let out = encode_console_args(&[json!({"a": "b;c", "n": 1}).into()]).unwrap();
        assert_eq!(out, standin(r#""{\"a\":\"b;c\",\"n\":1}""#));
    }

    #[test]
    fn object_key_order_is_kept() {
        let out = encode_console_args(&[json!({"z": 1, "a": 2}).into()]).unwrap();
        assert_eq!(out, r#""{\"z\":1,\"a\":2}""#);
    }

    #[test]
    fn json_scalars_follow_their_scalar_path() {
        let out = encode_console_args(&[json!("x"), json!(7), json!(0.25)].map(ConsoleArg::Json))
            .unwrap();
        assert_eq!(out, "\"x\" \"7\" \"0.25\"");
    }

    #[test]
    fn null_and_bool_are_rejected() {
        let err = encode_console_args(&[ConsoleArg::Json(Value::Null)]).unwrap_err();
        assert!(matches!(err, SupervisorError::Encoding(_)));
        let err = encode_console_args(&["ok".into(), ConsoleArg::Json(json!(true))]).unwrap_err();
        assert!(matches!(err, SupervisorError::Encoding(_)));
    }

    #[test]
    fn raw_newlines_collapse_to_space() {
        let enc = ConsoleArgEncoder::new();
        assert_eq!(enc.sanitize("a\nb\n"), "a b ");
    }

    #[test]
    fn legacy_quirk_only_applies_to_odd_escaped_quotes() {
        let legacy = ConsoleArgEncoder::new().with_legacy_semicolon_quirk(true);
        let fixed = ConsoleArgEncoder::new();

        let odd = legacy.encode_args(&["a\"b;c".into()]).unwrap();
        assert_eq!(odd, r#""a\"b;c""#);
        let odd_fixed = fixed.encode_args(&["a\"b;c".into()]).unwrap();
        assert_eq!(odd_fixed, standin(r#""a\"b;c""#));

        let even = legacy.encode_args(&["\"a\";b".into()]).unwrap();
        assert_eq!(even, standin(r#""\"a\";b""#));
    }

    #[test]
    fn command_line_with_and_without_args() {
        let enc = ConsoleArgEncoder::new();
        assert_eq!(enc.encode_command("txaReportResources", &[]).unwrap(), "txaReportResources");
        assert_eq!(
            enc.encode_command("txaKickAll", &["bye".into()]).unwrap(),
            "txaKickAll \"bye\""
        );
        assert!(enc.encode_command("say hi", &[]).is_err());
        assert!(enc.encode_command("a;b", &[]).is_err());
        assert!(enc.encode_command("", &[]).is_err());
    }
}
