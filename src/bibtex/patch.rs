use crate::regex::{Captures, Regex};
use crate::resolve::EntryPatch;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static ENTRY_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\s*(\w+)\s*[{(]\s*([^,\s]+)\s*,").unwrap());

fn header_key<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    let entry_type = caps.get(1)?.as_str().to_lowercase();
    if matches!(entry_type.as_str(), "string" | "comment" | "preamble") {
        return None;
    }
    caps.get(2).map(|m| m.as_str())
}

/// Inserts patched fields into BibTeX source text.
///
/// Everything is copied verbatim except that, right after the `@type{key,`
/// header of each patched entry, one `  name         = {value},` line per
/// added field is inserted. Each key is patched at most once.
///
/// ```
/// use bibfill::bibtex::patch_bibtex;
/// use bibfill::resolve::EntryPatch;
///
/// let source = "% my refs\n@inproceedings{abc2024,\n  title = {A Paper},\n}\n";
/// let patch = EntryPatch {
///     key: "abc2024".to_string(),
///     fields: vec![("month".to_string(), "June".to_string())],
/// };
/// assert_eq!(
///     patch_bibtex(source, &[patch]),
///     "% my refs\n@inproceedings{abc2024,\n  month        = {June},\n  title = {A Paper},\n}\n"
/// );
/// ```
pub fn patch_bibtex(source: &str, patches: &[EntryPatch]) -> String {
    let by_key: HashMap<&str, &EntryPatch> = patches
        .iter()
        .filter(|p| !p.fields.is_empty())
        .map(|p| (p.key.as_str(), p))
        .collect();
    let mut patched: HashSet<&str> = HashSet::new();
    let mut out = String::with_capacity(source.len());

    for line in source.split_inclusive('\n') {
        let target = ENTRY_HEADER.captures(line).and_then(|caps| {
            let whole = caps.get(0)?;
            let key = header_key(&caps)?;
            let patch = by_key.get(key)?;
            Some((whole.end(), *patch))
        });

        let Some((end, patch)) = target.filter(|(_, p)| !patched.contains(p.key.as_str())) else {
            out.push_str(line);
            continue;
        };
        patched.insert(patch.key.as_str());

        out.push_str(&line[..end]);
        out.push('\n');
        for (name, value) in &patch.fields {
            out.push_str(&format!("  {:<12} = {{{}}},\n", name, value));
        }
        let rest = &line[end..];
        if !rest.trim().is_empty() {
            out.push_str("  ");
            out.push_str(rest.trim_start());
        }
    }

    tracing::debug!(patched = patched.len(), requested = by_key.len(), "patched bibtex source");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn patch(key: &str, fields: &[(&str, &str)]) -> EntryPatch {
        EntryPatch {
            key: key.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_untouched_source_is_identical() {
        let source = "@comment{x}\r\n@article{k,\r\n  year = 2020,\r\n}\r\n";
        assert_eq!(patch_bibtex(source, &[]), source);
        assert_eq!(patch_bibtex(source, &[patch("other", &[("a", "b")])]), source);
    }

    #[test]
    fn test_multiple_fields_and_entries() {
        let source = "\
@article{a,
  journal = {IEEE Access},
}

@inproceedings{ b ,
  booktitle = {CVPR},
}
";
        let patches = [
            patch("a", &[("issn", "2169-3536"), ("publisher", "IEEE")]),
            patch("b", &[("month", "June")]),
        ];
        let expected = "\
@article{a,
  issn         = {2169-3536},
  publisher    = {IEEE},
  journal = {IEEE Access},
}

@inproceedings{ b ,
  month        = {June},
  booktitle = {CVPR},
}
";
        assert_eq!(patch_bibtex(source, &patches), expected);
    }

    #[test]
    fn test_single_line_entry() {
        let source = "@article{a, journal = {Nature}}\n";
        let expected = "@article{a,\n  issn         = {0028-0836},\n  journal = {Nature}}\n";
        assert_eq!(
            patch_bibtex(source, &[patch("a", &[("issn", "0028-0836")])]),
            expected
        );
    }

    #[test]
    fn test_duplicate_key_patched_once() {
        let source = "@misc{a,\n}\n@misc{a,\n}\n";
        let expected = "@misc{a,\n  note         = {x},\n}\n@misc{a,\n}\n";
        assert_eq!(patch_bibtex(source, &[patch("a", &[("note", "x")])]), expected);
    }

    #[test]
    fn test_string_definitions_are_not_headers() {
        let source = "@string{a, = {x}}\n";
        assert_eq!(patch_bibtex(source, &[patch("a", &[("note", "x")])]), source);
    }
}
