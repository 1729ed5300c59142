use serde::Serialize;

use super::error::TypeError;

/*
Ingredient catalog file

name,measurement_unit
abricot jam,g
"oil, olive",ml
*/

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogRow {
    pub name: String,
    pub measurement_unit: String,
}

/// Parses the whole catalog file. The first row is a header and is skipped.
pub fn parse_catalog(content: &str) -> Result<Vec<CatalogRow>, TypeError> {
    content
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            CatalogRow::try_from(line)
                .map_err(|e| TypeError::new(&format!("Line {}: {e}", i + 1)))
        })
        .collect()
}

impl TryFrom<&str> for CatalogRow {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let fields = split_fields(value.trim_end_matches('\r'))?;

        match fields.as_slice() {
            [name, unit] => {
                let name = name.trim();
                let unit = unit.trim();
                if name.is_empty() || unit.is_empty() {
                    return Err(TypeError::new("Invalid syntax; Empty field"));
                }

                Ok(Self {
                    name: name.to_string(),
                    measurement_unit: unit.to_string(),
                })
            }
            _ => Err(TypeError::new("Invalid syntax; Expected 2 fields")),
        }
    }
}

fn split_fields(line: &str) -> Result<Vec<String>, TypeError> {
    let mut fields = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if quoted {
        return Err(TypeError::new("Invalid syntax; Unterminated quote"));
    }
    fields.push(field);

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_and_blank_lines() {
        let rows = parse_catalog("name,measurement_unit\nflour,g\n\nmilk,ml\r\n").unwrap();
        assert_eq!(
            rows,
            vec![
                CatalogRow {
                    name: "flour".into(),
                    measurement_unit: "g".into()
                },
                CatalogRow {
                    name: "milk".into(),
                    measurement_unit: "ml".into()
                },
            ]
        );
    }

    #[test]
    fn supports_quoted_fields() {
        let row = CatalogRow::try_from(r#""oil, ""extra"" virgin",ml"#).unwrap();
        assert_eq!(row.name, r#"oil, "extra" virgin"#);
        assert_eq!(row.measurement_unit, "ml");
    }

    #[test]
    fn reports_line_of_bad_row() {
        let error = parse_catalog("name,unit\nflour,g\nsugar\n").unwrap_err();
        assert_eq!(error.to_string(), "(Line 3: (Invalid syntax; Expected 2 fields))");
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(CatalogRow::try_from("\"flour,g").is_err());
        assert!(CatalogRow::try_from(",g").is_err());
    }
}
