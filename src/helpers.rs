use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

#[derive(Debug)]
pub enum Formatter {
    Str(String),
    Number(i64),
}

pub fn formatter(mut parser: String, args: &[Formatter]) -> String {
    for (index, value) in args.iter().enumerate() {
        match value {
            Formatter::Str(n) => {
                parser = parser.replace(format!("${}", index).as_str(), n);
            },
            Formatter::Number(n) => {
                parser = parser
                    .replace(format!("${}", index).as_str(), &n.to_string());
            },
        }
    }
    parser
}

/// Splits a comma separated env value, dropping blanks.
pub fn parse_list(data: &str) -> Vec<String> {
    data.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_owned())
        .collect()
}

/// Chain names end up inside table identifiers.
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn days_before(ts: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    ts - Duration::days(days)
}

pub fn start_of_year(ts: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(ts.year(), 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(ts)
}
