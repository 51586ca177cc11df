//! Schema reconciliation — mapping collected named answers onto the ledger's
//! positional header columns.
//!
//! The ledger's header row is user-editable, so column names rarely equal
//! measurement names exactly. Matching is fuzzy by default (case-insensitive
//! substring containment in either direction) and pluggable via
//! [`HeaderMatch`], so a stricter strategy can be swapped in without touching
//! the state machine.

use tallygram_core::ledger::LedgerRow;

/// Strategy for deciding whether a collected answer belongs under a header.
pub trait HeaderMatch: Send + Sync {
    fn matches(&self, header: &str, name: &str) -> bool;
}

/// Default matcher: case-insensitive containment in either direction
/// (header contains name, or name contains header).
pub struct SubstringMatcher;

impl HeaderMatch for SubstringMatcher {
    fn matches(&self, header: &str, name: &str) -> bool {
        let header = header.trim().to_lowercase();
        let name = name.trim().to_lowercase();
        if header.is_empty() || name.is_empty() {
            return false;
        }
        header.contains(&name) || name.contains(&header)
    }
}

/// Exact matcher (case-insensitive equality) for schemas that are kept in
/// lockstep with the registry.
pub struct ExactMatcher;

impl HeaderMatch for ExactMatcher {
    fn matches(&self, header: &str, name: &str) -> bool {
        header.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// Produce a position-correct row for the given header.
///
/// The first header column is reserved for the timestamp. For every later
/// header, the first answer (in answer order) that matches wins and is
/// consumed — a single answer never fills two columns. Unmatched headers
/// render as empty strings; the output length always equals the header
/// length.
pub fn reconcile(
    headers: &[String],
    answers: &[(String, String)],
    timestamp: &str,
    matcher: &dyn HeaderMatch,
) -> LedgerRow {
    let mut row = Vec::with_capacity(headers.len());
    if headers.is_empty() {
        return row;
    }

    row.push(timestamp.to_string());

    let mut consumed = vec![false; answers.len()];
    for header in &headers[1..] {
        let found = answers.iter().enumerate().find(|(i, (name, _))| {
            !consumed[*i] && matcher.matches(header, name)
        });
        match found {
            Some((i, (_, value))) => {
                consumed[i] = true;
                row.push(value.clone());
            }
            None => row.push(String::new()),
        }
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn answers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substring_matches_both_directions() {
        let m = SubstringMatcher;
        assert!(m.matches("Energy Level", "Energy"));
        assert!(m.matches("Energy", "Energy Level"));
        assert!(m.matches("ENERGY", "energy"));
        assert!(!m.matches("Mood", "Energy"));
        assert!(!m.matches("", "Energy"));
    }

    #[test]
    fn exact_matcher_ignores_case_only() {
        let m = ExactMatcher;
        assert!(m.matches("Energy", "energy"));
        assert!(m.matches(" Energy ", "energy"));
        assert!(!m.matches("Energy Level", "Energy"));
    }

    #[test]
    fn row_length_equals_header_length() {
        let h = headers(&["Time", "Energy", "Mood", "Notes"]);
        let a = answers(&[("Energy", "7")]);
        let row = reconcile(&h, &a, "2024-01-01 09:00", &SubstringMatcher);
        assert_eq!(row.len(), h.len());
        assert_eq!(row, vec!["2024-01-01 09:00", "7", "", ""]);
    }

    #[test]
    fn first_cell_is_timestamp() {
        let h = headers(&["Время", "Energy Level"]);
        let a = answers(&[("Energy", "7")]);
        let row = reconcile(&h, &a, "2024-06-15 21:30", &SubstringMatcher);
        assert_eq!(row, vec!["2024-06-15 21:30", "7"]);
    }

    #[test]
    fn first_matching_answer_wins() {
        let h = headers(&["Time", "Load"]);
        let a = answers(&[("physical_load", "3"), ("mental_load", "4")]);
        let row = reconcile(&h, &a, "t", &SubstringMatcher);
        // Answer order decides: physical_load was answered first
        assert_eq!(row, vec!["t", "3"]);
    }

    #[test]
    fn matched_answers_are_consumed() {
        let h = headers(&["Time", "Load (physical)", "Load (mental)"]);
        let a = answers(&[("Load", "3"), ("Load", "4")]);
        let row = reconcile(&h, &a, "t", &SubstringMatcher);
        // One answer never fills two columns
        assert_eq!(row, vec!["t", "3", "4"]);
    }

    #[test]
    fn unmatched_headers_become_empty_not_skipped() {
        let h = headers(&["Time", "Unknown", "Energy"]);
        let a = answers(&[("Energy", "9")]);
        let row = reconcile(&h, &a, "t", &SubstringMatcher);
        assert_eq!(row, vec!["t", "", "9"]);
    }

    #[test]
    fn empty_header_yields_empty_row() {
        let row = reconcile(&[], &answers(&[("Energy", "7")]), "t", &SubstringMatcher);
        assert!(row.is_empty());
    }

    #[test]
    fn timestamp_only_header() {
        let row = reconcile(
            &headers(&["Time"]),
            &answers(&[("Energy", "7")]),
            "t",
            &SubstringMatcher,
        );
        assert_eq!(row, vec!["t"]);
    }
}
