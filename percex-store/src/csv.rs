use std::borrow::Cow;

use serde::Serialize;
use serde::ser::Error as _;
use serde_json::{Map, Value};

/// Quotes a field containing a comma, quote or newline, doubling inner quotes.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Plain-text form of a JSON value as it appears in a cell
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Some(other) => other.to_string(),
    }
}

/// Header from the first row's field names, then one line per row, joined by `\n`.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String, serde_json::Error> {
    let objects = rows
        .iter()
        .map(|row| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            _ => Err(serde_json::Error::custom("CSV rows must serialize to objects")),
        })
        .collect::<Result<Vec<Map<String, Value>>, _>>()?;

    let Some(first) = objects.first() else {
        return Ok(String::new());
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(objects.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| escape_field(h).into_owned())
            .collect::<Vec<_>>()
            .join(","),
    );
    for object in &objects {
        let line = headers
            .iter()
            .map(|h| escape_field(&cell(object.get(h.as_str()))).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Splits CSV text into rows of fields, honouring quoted fields.
    pub(crate) fn parse(text: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match (in_quotes, c) {
                (true, '"') if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                (true, '"') => in_quotes = false,
                (true, c) => field.push(c),
                (false, '"') => in_quotes = true,
                (false, ',') => row.push(std::mem::take(&mut field)),
                (false, '\n') => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                (false, c) => field.push(c),
            }
        }
        if !text.is_empty() {
            row.push(field);
            rows.push(row);
        }
        rows
    }

    #[test]
    fn escaping_rules() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field("semi;colon"), "semi;colon");
    }

    #[test]
    fn empty_rows_give_empty_text() {
        let rows: Vec<Value> = Vec::new();
        assert_eq!(to_csv(&rows).unwrap(), "");
    }

    #[test]
    fn cells_follow_first_row_headers() {
        let rows = vec![
            json!({"id": "a", "score": 70.0, "ratio": 3.5, "note": null}),
            json!({"id": "b,c", "score": 12, "extra": true}),
        ];
        let text = to_csv(&rows).unwrap();
        assert_eq!(
            text,
            "id,score,ratio,note\na,70,3.5,\n\"b,c\",12,,"
        );
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(to_csv(&[1, 2]).is_err());
    }
}
