//! Minimal RFC-4180 record reader.
//!
//! The upstream list files are plain delimited text with double-quoted
//! fields (quotes escaped by doubling, fields may span lines). This is
//! the whole grammar the adapters need, so it is parsed directly.

/// Split `input` into records of fields, honoring double quotes.
///
/// Handles CRLF and bare LF endings, `""` escapes inside quoted fields,
/// and embedded delimiters/newlines inside quotes. Empty lines produce no
/// record.
pub fn split_records(input: &str, delimiter: char) -> Vec<Vec<String>> {
  let mut records: Vec<Vec<String>> = Vec::new();
  let mut record: Vec<String> = Vec::new();
  let mut field = String::new();
  let mut in_quotes = false;

  let mut chars = input.chars().peekable();
  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' => {
          if chars.peek() == Some(&'"') {
            chars.next();
            field.push('"');
          } else {
            in_quotes = false;
          }
        }
        _ => field.push(c),
      }
      continue;
    }
    match c {
      '"' => in_quotes = true,
      '\r' => {}
      '\n' => {
        record.push(std::mem::take(&mut field));
        if record.len() > 1 || !record[0].is_empty() {
          records.push(std::mem::take(&mut record));
        } else {
          record.clear();
        }
      }
      c if c == delimiter => {
        record.push(std::mem::take(&mut field));
      }
      _ => field.push(c),
    }
  }
  // Final record without a trailing newline.
  record.push(field);
  if record.len() > 1 || !record[0].is_empty() {
    records.push(record);
  }

  records
}

/// Map a header row to column indices, so adapters can look fields up by
/// name instead of hard-coding positions.
pub fn column_index(header: &[String], name: &str) -> Option<usize> {
  header.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_fields() {
    let rows = split_records("a,b,c\nd,e,f\n", ',');
    assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["d", "e", "f"]]);
  }

  #[test]
  fn quoted_fields_keep_delimiters() {
    let rows = split_records("7157,\"MADURO MOROS, Nicolas\",individual\n", ',');
    assert_eq!(
      rows,
      vec![vec!["7157", "MADURO MOROS, Nicolas", "individual"]]
    );
  }

  #[test]
  fn escaped_quotes() {
    let rows = split_records("1,\"a \"\"quoted\"\" word\"\n", ',');
    assert_eq!(rows, vec![vec!["1", "a \"quoted\" word"]]);
  }

  #[test]
  fn quoted_newline_stays_in_field() {
    let rows = split_records("1,\"line one\nline two\",x\n", ',');
    assert_eq!(rows, vec![vec!["1", "line one\nline two", "x"]]);
  }

  #[test]
  fn semicolon_delimiter() {
    let rows = split_records("a;b;\"c;d\"\n", ';');
    assert_eq!(rows, vec![vec!["a", "b", "c;d"]]);
  }

  #[test]
  fn blank_lines_are_skipped() {
    let rows = split_records("a,b\n\n\nc,d\n", ',');
    assert_eq!(rows.len(), 2);
  }

  #[test]
  fn missing_trailing_newline() {
    let rows = split_records("a,b", ',');
    assert_eq!(rows, vec![vec!["a", "b"]]);
  }

  #[test]
  fn header_lookup_is_case_insensitive() {
    let header: Vec<String> =
      ["_id", "Name", "alt_names"].iter().map(|s| s.to_string()).collect();
    assert_eq!(column_index(&header, "name"), Some(1));
    assert_eq!(column_index(&header, "missing"), None);
  }
}
