//! Mapping between paste attributes and the columns of a paste row.

use chrono::{DateTime, TimeZone, Utc};

use crate::column::{Column, Mutation};
use crate::models::{NewPaste, Paste};

use super::PasteId;

pub const DATA: &str = "data";
pub const OWNER: &str = "owner";
pub const TITLE: &str = "title";
pub const SYNTAX: &str = "syntax";

/// Every column a read asks for.
pub const ALL_COLUMNS: [&str; 4] = [DATA, SYNTAX, TITLE, OWNER];

/// Build the write set for one paste, all at the same timestamp.
///
/// Empty optional attributes become deletions so a resubmission clears stale values.
pub fn mutations(paste: &NewPaste, owner: &str, timestamp: i64) -> Vec<Mutation> {
    let mut mutations = vec![
        Mutation::Insert(Column::new(DATA, paste.data.clone(), timestamp)),
        Mutation::Insert(Column::new(OWNER, owner.to_owned(), timestamp)),
    ];

    for (name, value) in [(SYNTAX, &paste.syntax), (TITLE, &paste.title)] {
        mutations.push(match value.as_deref() {
            Some(value) if !value.is_empty() => {
                Mutation::Insert(Column::new(name, value.to_owned(), timestamp))
            }
            _ => Mutation::delete(name, timestamp),
        });
    }

    mutations
}

/// Rebuild a paste from whatever columns a read returned.
///
/// Returns `None` when the `data` column is missing or empty.
pub fn reconstruct(id: &str, columns: Vec<Column>) -> Option<Paste> {
    let mut data = None;
    let mut title = None;
    let mut syntax = None;
    let mut owner = String::new();
    let mut timestamp = None;

    for column in columns {
        timestamp = timestamp.max(Some(column.timestamp));
        match column.name.as_str() {
            DATA => data = Some(column.value),
            OWNER => owner = text(&column.value),
            TITLE => title = Some(text(&column.value)).filter(|t| !t.is_empty()),
            SYNTAX => syntax = Some(text(&column.value)).filter(|s| !s.is_empty()),
            _ => {}
        }
    }

    let data = data.filter(|data| !data.is_empty())?;

    Some(Paste {
        id: PasteId::from_row_key(id),
        data,
        title,
        syntax,
        owner,
        time: timestamp.map(to_time).unwrap_or_default(),
    })
}

fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn to_time(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_optionals_become_deletions() {
        let paste = NewPaste::new("hello world").with_title("");
        let mutations = mutations(&paste, "alice", 42);

        assert_eq!(
            mutations,
            vec![
                Mutation::Insert(Column::new(DATA, "hello world", 42)),
                Mutation::Insert(Column::new(OWNER, "alice", 42)),
                Mutation::delete(SYNTAX, 42),
                Mutation::delete(TITLE, 42),
            ]
        );
    }

    #[test]
    fn present_optionals_become_inserts() {
        let paste = NewPaste::new("x").with_title("T1").with_syntax("rust");
        let mutations = mutations(&paste, "bob", 7);

        assert!(mutations.contains(&Mutation::Insert(Column::new(TITLE, "T1", 7))));
        assert!(mutations.contains(&Mutation::Insert(Column::new(SYNTAX, "rust", 7))));
        assert!(mutations.iter().all(|m| m.timestamp() == 7));
    }

    #[test]
    fn reconstructs_present_columns() {
        let paste = reconstruct(
            "uU0nuZN",
            vec![
                Column::new(DATA, "hello world", 100),
                Column::new(OWNER, "alice", 100),
                Column::new(SYNTAX, "text", 90),
            ],
        )
        .unwrap();

        assert_eq!(paste.id.as_str(), "uU0nuZN");
        assert_eq!(&paste.data[..], b"hello world");
        assert_eq!(paste.owner, "alice");
        assert_eq!(paste.syntax.as_deref(), Some("text"));
        assert_eq!(paste.title, None);
        assert_eq!(paste.time.timestamp(), 100);
    }

    #[test]
    fn no_data_means_no_paste() {
        assert!(reconstruct("abc", vec![]).is_none());
        assert!(reconstruct(
            "abc",
            vec![Column::new(OWNER, "alice", 1), Column::new(TITLE, "T", 1)]
        )
        .is_none());
        assert!(reconstruct("abc", vec![Column::new(DATA, "", 1)]).is_none());
    }
}
