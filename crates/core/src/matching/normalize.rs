//! Address canonicalisation used before any fuzzy comparison.
//!
//! Addresses arrive from manual entry, form exports and billing-platform customer records
//! with no shared schema, so normalisation accepts any input and never fails.

const UNIT_DESIGNATORS: &[&str] = &["apt", "apartment", "suite", "ste", "unit"];

const SUFFIX_FOLDS: &[(&str, &str)] = &[
    ("street", "st"),
    ("road", "rd"),
    ("drive", "dr"),
    ("avenue", "ave"),
    ("lane", "ln"),
    ("court", "ct"),
    ("circle", "cir"),
    ("place", "pl"),
];

/// Canonical form of a free-text postal address.
///
/// Lowercases, drops periods, treats commas as separators, strips unit designators
/// together with their unit token (and `#12` style units), folds `north carolina` to `nc`
/// and common street suffixes to their abbreviations, and collapses whitespace.
/// `normalize_address(normalize_address(s)) == normalize_address(s)` for every input.
pub fn normalize_address(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace('.', "").replace(',', " ");
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let tokens = strip_units(&tokens);
    let tokens = fold_state(&tokens);

    tokens.iter().map(|token| fold_suffix(token)).collect::<Vec<_>>().join(" ")
}

fn strip_units<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];

        if UNIT_DESIGNATORS.contains(&token) {
            index += 1;
            if tokens.get(index) == Some(&"#") {
                index += 1;
            }
            // the unit token itself, when present
            index += 1;
            continue;
        }

        if token == "#" {
            index += 1;
            if tokens.get(index).map(|next| starts_with_digit(next)).unwrap_or(false) {
                index += 1;
            }
            continue;
        }

        if let Some(rest) = token.strip_prefix('#') {
            if starts_with_digit(rest) {
                index += 1;
                continue;
            }
        }

        kept.push(token);
        index += 1;
    }

    kept
}

fn fold_state<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut folded = Vec::with_capacity(tokens.len());
    let mut index = 0;

    while index < tokens.len() {
        if tokens[index] == "north" && tokens.get(index + 1) == Some(&"carolina") {
            folded.push("nc");
            index += 2;
        } else {
            folded.push(tokens[index]);
            index += 1;
        }
    }

    folded
}

fn fold_suffix(token: &str) -> &str {
    SUFFIX_FOLDS
        .iter()
        .find(|(long, _)| *long == token)
        .map(|(_, short)| *short)
        .unwrap_or(token)
}

fn starts_with_digit(value: &str) -> bool {
    value.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::normalize_address;

    #[test]
    fn strips_unit_and_folds_suffix() {
        assert_eq!(normalize_address("123 Main Street, Apt 4B"), "123 main st");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_address(""), "");
        assert_eq!(normalize_address("   \t "), "");
    }

    #[test]
    fn folds_every_known_suffix() {
        assert_eq!(
            normalize_address("Street Road Drive Avenue Lane Court Circle Place"),
            "st rd dr ave ln ct cir pl"
        );
    }

    #[test]
    fn folds_state_name_and_removes_punctuation() {
        assert_eq!(
            normalize_address("10 Elm Dr., Raleigh, North Carolina 27601"),
            "10 elm dr raleigh nc 27601"
        );
    }

    #[test]
    fn strips_suite_and_hash_units() {
        assert_eq!(normalize_address("500 Oak Avenue Suite 210"), "500 oak ave");
        assert_eq!(normalize_address("500 Oak Avenue #210"), "500 oak ave");
        assert_eq!(normalize_address("500 Oak Avenue # 210, Cary"), "500 oak ave cary");
        assert_eq!(normalize_address("500 Oak Ave Unit # 3"), "500 oak ave");
    }

    #[test]
    fn keeps_hash_tokens_that_are_not_unit_numbers() {
        assert_eq!(normalize_address("Lot #A Pine Ln"), "lot #a pine ln");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_address("  42   Birch\tCourt  "), "42 birch ct");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "123 Main Street, Apt 4B",
            "500 Oak Avenue # apt 5 7",
            "north apt 5 carolina",
            "# apt 5 7",
            "apt apt 5",
            "Lot #A, Pine Lane.",
            "1 N. Carolina Ave, Ste. 200",
            "",
            "PLACE place Place,,,",
            "12 Ünïcode Straße Circle",
        ];

        for sample in samples {
            let once = normalize_address(sample);
            assert_eq!(normalize_address(&once), once, "not idempotent for {sample:?}");
        }
    }
}
