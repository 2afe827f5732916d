use super::{DataFile, TextFormat};
use std::iter::Peekable;
use std::str::Chars;

impl DataFile {
    pub fn new(header: Option<Vec<String>>, data: Vec<Vec<Option<String>>>) -> Self {
        DataFile { header, data }
    }

    /// Parses delimited text. Qualified fields may contain the delimiter, line breaks and
    /// doubled qualifiers.
    ///
    /// `width` is the expected column count, taken from the header when `None`. A blank line
    /// is a row with a single null field when rows are one column wide and is skipped
    /// otherwise.
    pub fn parse(
        text: &str,
        format: &TextFormat,
        has_header: bool,
        width: Option<usize>,
    ) -> Result<Self, String> {
        let mut lines = vec![];
        let mut chars = text.chars().peekable();
        let mut line = 1;

        while chars.peek().is_some() {
            lines.push(parse_line(&mut chars, format, &mut line)?);
        }

        let mut rows = lines.into_iter();
        let header: Option<Vec<String>> = if has_header {
            rows.by_ref().find(|row| !is_blank(row)).map(|names| {
                names
                    .into_iter()
                    .map(|name| name.unwrap_or_default().trim().to_string())
                    .collect()
            })
        } else {
            None
        };

        let single_column = width.or(header.as_ref().map(Vec::len)) == Some(1);
        let data = rows.filter(|row| single_column || !is_blank(row)).collect();

        Ok(DataFile::new(header, data))
    }

    /// Serializes back to delimited text, header first when present.
    pub fn to_bytes(&self, format: &TextFormat) -> Vec<u8> {
        let mut result = String::new();

        if let Some(header) = &self.header {
            let fields: Vec<_> = header.iter().map(|name| Some(name.as_str())).collect();
            write_line(&mut result, &fields, format);
        }
        for row in &self.data {
            let fields: Vec<_> = row.iter().map(Option::as_deref).collect();
            write_line(&mut result, &fields, format);
        }

        result.into_bytes()
    }
}

fn parse_line(
    chars: &mut Peekable<Chars<'_>>,
    format: &TextFormat,
    line: &mut usize,
) -> Result<Vec<Option<String>>, String> {
    let start_line = *line;
    let mut row = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == format.qualifier {
                if chars.peek() == Some(&format.qualifier) {
                    chars.next();
                    field.push(ch);
                } else {
                    in_quotes = false;
                }
            } else {
                if ch == '\n' {
                    *line += 1;
                }
                field.push(ch);
            }
        } else if ch == format.qualifier && field.is_empty() && !quoted {
            in_quotes = true;
            quoted = true;
        } else if ch == format.delimiter {
            row.push(finish_field(&mut field, quoted));
            quoted = false;
        } else if ch == '\n' || ch == '\r' {
            if ch == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            *line += 1;
            row.push(finish_field(&mut field, quoted));
            return Ok(row);
        } else {
            field.push(ch);
        }
    }

    if in_quotes {
        return Err(format!("unterminated quoted field starting on line {start_line}"));
    }
    row.push(finish_field(&mut field, quoted));
    Ok(row)
}

fn is_blank(row: &[Option<String>]) -> bool {
    matches!(row, [None])
}

fn finish_field(field: &mut String, quoted: bool) -> Option<String> {
    let value = std::mem::take(field);
    if value.is_empty() && !quoted {
        None
    } else {
        Some(value)
    }
}

fn write_line(out: &mut String, fields: &[Option<&str>], format: &TextFormat) {
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(format.delimiter);
        }
        let Some(value) = field else {
            continue;
        };
        let needs_quotes = value.is_empty()
            || value.contains(format.delimiter)
            || value.contains(format.qualifier)
            || value.contains('\n')
            || value.contains('\r');
        if needs_quotes {
            let doubled: String = [format.qualifier, format.qualifier].iter().collect();
            out.push(format.qualifier);
            out.push_str(&value.replace(format.qualifier, &doubled));
            out.push(format.qualifier);
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}
