use std::path::{Path, PathBuf};

/// Derive the run folder name from an operator-supplied identifier.
///
/// Identifiers that read as an integer are zero-padded to six digits
/// (`42` -> `000042`, ` 1_000 ` -> `001000`); anything else is used
/// verbatim. Verbatim names are not sanitized, so `../x` escapes the data
/// root.
pub fn folder_name(run_identifier: &str) -> String {
    match parse_run_number(run_identifier) {
        Some(run) => format!("{run:06}"),
        None => run_identifier.to_string(),
    }
}

/// Integer literal as operators type run numbers: surrounding whitespace,
/// an optional sign, and digits that may be grouped by single underscores.
fn parse_run_number(run_identifier: &str) -> Option<i64> {
    let literal = run_identifier.trim();
    let digits = literal.strip_prefix(['+', '-']).unwrap_or(literal);
    let grouped = !digits.is_empty()
        && digits
            .split('_')
            .all(|group| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()));
    if !grouped {
        return None;
    }
    literal.replace('_', "").parse().ok()
}

/// On-disk layout for one run: `<data_root>/<folder_name>/{instance0,instance1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolder {
    pub run_identifier: String,
    pub folder_name: String,
    pub base_path: PathBuf,
    pub instance_paths: [PathBuf; 2],
}

impl RunFolder {
    pub fn resolve(data_root: &Path, run_identifier: &str, instances: [&str; 2]) -> Self {
        let folder_name = folder_name(run_identifier);
        let base_path = data_root.join(&folder_name);
        let instance_paths = instances.map(|name| base_path.join(name));
        Self {
            run_identifier: run_identifier.to_string(),
            folder_name,
            base_path,
            instance_paths,
        }
    }

    pub fn instance(&self, index: usize) -> &Path {
        &self.instance_paths[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numeric_identifiers_are_zero_padded() {
        assert_eq!(folder_name("42"), "000042");
        assert_eq!(folder_name("0"), "000000");
        assert_eq!(folder_name("999999"), "999999");
        assert_eq!(folder_name("1234567"), "1234567");
    }

    #[test]
    fn leading_zeros_and_signs_follow_integer_parsing() {
        assert_eq!(folder_name("007"), "000007");
        assert_eq!(folder_name("+12"), "000012");
        assert_eq!(folder_name("-5"), "-00005");
    }

    #[test]
    fn whitespace_and_digit_groups_read_as_integers() {
        assert_eq!(folder_name(" 42\n"), "000042");
        assert_eq!(folder_name("1_000"), "001000");
        assert_eq!(folder_name("-1_0"), "-00010");
    }

    #[test]
    fn misplaced_underscores_stay_verbatim() {
        assert_eq!(folder_name("_1"), "_1");
        assert_eq!(folder_name("1_"), "1_");
        assert_eq!(folder_name("1__0"), "1__0");
        assert_eq!(folder_name("+_1"), "+_1");
        assert_eq!(folder_name("+"), "+");
    }

    #[test]
    fn non_numeric_identifiers_are_verbatim() {
        assert_eq!(folder_name("testrun"), "testrun");
        assert_eq!(folder_name("42a"), "42a");
        assert_eq!(folder_name("cosmics 3"), "cosmics 3");
        assert_eq!(folder_name(""), "");
    }

    #[test]
    fn resolve_builds_fixed_two_instance_layout() {
        let folder = RunFolder::resolve(Path::new("/data"), "42", ["daq00", "daq01"]);
        assert_eq!(folder.folder_name, "000042");
        assert_eq!(folder.base_path, PathBuf::from("/data/000042"));
        assert_eq!(folder.instance(0), Path::new("/data/000042/daq00"));
        assert_eq!(folder.instance(1), Path::new("/data/000042/daq01"));
    }

    #[test]
    fn resolve_uses_string_identifier_as_folder() {
        let folder = RunFolder::resolve(Path::new("/data"), "testrun", ["daq00", "daq01"]);
        assert_eq!(folder.base_path, PathBuf::from("/data/testrun"));
        assert_eq!(folder.run_identifier, "testrun");
    }

    proptest! {
        #[test]
        fn integers_in_run_range_pad_to_six_digits(n in 0u32..=999_999) {
            let name = folder_name(&n.to_string());
            prop_assert_eq!(name.len(), 6);
            prop_assert_eq!(name, format!("{n:06}"));
        }

        #[test]
        fn non_integer_identifiers_are_unchanged(s in "[a-zA-Z_][a-zA-Z0-9_.-]{0,20}") {
            prop_assert_eq!(folder_name(&s), s);
        }
    }
}
