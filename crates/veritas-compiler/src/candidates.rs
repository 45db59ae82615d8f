//! The candidates input format (§6): line-delimited JSON, one record per
//! line, blank lines ignored.

use std::io::BufRead;

use veritas_core::errors::{VeritasError, VeritasResult};

pub use veritas_core::model::v1::{Candidate, LocatorInput};

/// Parse a candidates stream. A line that fails to parse as JSON aborts the
/// whole load — unlike a dropped evidence match, a malformed input line is
/// an authoring error, not a runtime fact about the source document.
pub fn load_candidates<R: BufRead>(reader: R) -> VeritasResult<Vec<Candidate>> {
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| VeritasError::io(format!("reading candidates line {}: {e}", lineno + 1)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let candidate: Candidate = serde_json::from_str(trimmed).map_err(|e| {
            VeritasError::invalid_argument(format!(
                "candidates line {}: {e}",
                lineno + 1
            ))
        })?;
        out.push(candidate);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_one_record_per_line_and_skips_blanks() {
        let input = "\n{\"subject\":\"Tourniquet\",\"predicate\":\"treats\",\"object\":\"severe bleeding\",\"object_type\":\"literal:string\",\"evidence\":\"Tourniquet treats severe bleeding.\",\"tier\":3}\n\n";
        let candidates = load_candidates(Cursor::new(input)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].subject, "Tourniquet");
        assert_eq!(candidates[0].tier, 3);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let input = "{not json}\n";
        assert!(load_candidates(Cursor::new(input)).is_err());
    }

    #[test]
    fn locator_is_optional() {
        let input = "{\"subject\":\"a\",\"predicate\":\"b\",\"object\":\"c\",\"object_type\":\"entity\",\"evidence\":\"e\",\"tier\":0,\"locator\":{\"kind\":\"pdf\",\"page_index\":2}}\n";
        let candidates = load_candidates(Cursor::new(input)).unwrap();
        assert_eq!(candidates[0].locator.as_ref().unwrap().page_index, Some(2));
    }
}
