use regex::Regex;
use std::collections::BTreeSet;

use normas_core::types::Chunk;

pub const NO_SOURCE_CITATION: &str = "(Source: origin not identified in metadata)";

/// A closing `(Source: ...)`, allowing one level of nested parentheses such as
/// `Section: 6.2.6(a)` and a trailing period.
const TRAILING_CITATION: &str = r"\s*\(Source:(?:[^()]|\([^()]*\))*\)[.\s]*$";

/// Distinct basenames of the chunks' source files, sorted.
pub fn source_names(chunks: &[Chunk]) -> Vec<String> {
    chunks.iter().filter_map(Chunk::file_name).collect::<BTreeSet<_>>().into_iter().collect()
}

pub fn format_citation(names: &[String]) -> String {
    if names.is_empty() {
        NO_SOURCE_CITATION.to_string()
    } else {
        format!("(Source: {})", names.join(", "))
    }
}

/// Replaces whatever citation the model wrote with the canonical one.
#[derive(Debug, Clone)]
pub struct CitationNormalizer {
    trailing: Regex,
}

impl CitationNormalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { trailing: Regex::new(TRAILING_CITATION)? })
    }

    /// Strip every trailing `(Source: ...)` and append `format_citation(names)`
    /// on its own line. Applying it twice gives the same string.
    pub fn normalize(&self, answer: &str, names: &[String]) -> String {
        let body = self.strip(answer);
        let citation = format_citation(names);
        if body.is_empty() {
            citation
        } else {
            format!("{}\n{}", body, citation)
        }
    }

    pub fn strip<'a>(&self, answer: &'a str) -> &'a str {
        let mut body = answer.trim_end();
        while let Some(m) = self.trailing.find(body) {
            body = body[..m.start()].trim_end();
        }
        body.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn appends_canonical_citation() {
        let n = CitationNormalizer::new().unwrap();
        assert_eq!(
            n.normalize("The maximum tolerance is 0.5 mm.", &names(&["standard-123.pdf"])),
            "The maximum tolerance is 0.5 mm.\n(Source: standard-123.pdf)"
        );
    }

    #[test]
    fn replaces_model_citation_including_section() {
        let n = CitationNormalizer::new().unwrap();
        let raw = "Use 2.5 mm² conductors. (Source: nbr-5410.pdf / Section: 6.2.6)";
        assert_eq!(
            n.normalize(raw, &names(&["iso-9001.pdf", "nbr-5410.pdf"])),
            "Use 2.5 mm² conductors.\n(Source: iso-9001.pdf, nbr-5410.pdf)"
        );
    }

    #[test]
    fn replaces_model_citation_with_parenthesised_section() {
        let n = CitationNormalizer::new().unwrap();
        let raw = "Use 2.5 mm conductors. (Source: nbr-5410.pdf / Section: 6.2.6(a))";
        assert_eq!(n.normalize(raw, &names(&["nbr-5410.pdf"])), "Use 2.5 mm conductors.\n(Source: nbr-5410.pdf)");
    }

    #[test]
    fn strips_citation_followed_by_a_period() {
        let n = CitationNormalizer::new().unwrap();
        assert_eq!(n.normalize("Tolerance is 0.5 mm (Source: a.pdf).", &names(&["a.pdf"])), "Tolerance is 0.5 mm\n(Source: a.pdf)");
        let raw = "Tolerance is 0.5 mm. (Source: a.pdf / Section: 4.2(b)(1)).";
        assert_eq!(n.normalize(raw, &names(&["a.pdf"])), "Tolerance is 0.5 mm.\n(Source: a.pdf)");
    }

    #[test]
    fn strips_repeated_trailing_citations() {
        let n = CitationNormalizer::new().unwrap();
        let raw = "Answer.\n(Source: a.pdf)\n(Source: b.pdf)  \n";
        assert_eq!(n.normalize(raw, &names(&["a.pdf"])), "Answer.\n(Source: a.pdf)");
    }

    #[test]
    fn keeps_citations_in_the_middle() {
        let n = CitationNormalizer::new().unwrap();
        let raw = "See (Source: a.pdf) for the table, values apply to steel.";
        assert_eq!(n.normalize(raw, &names(&["a.pdf"])), format!("{}\n(Source: a.pdf)", raw));
    }

    #[test]
    fn normalization_is_idempotent() {
        let n = CitationNormalizer::new().unwrap();
        let sources = names(&["a.pdf", "b.pdf"]);
        for raw in ["Plain answer", "Answer (Source: x.pdf)", "Answer\n(Source: a.pdf, b.pdf)", ""] {
            let once = n.normalize(raw, &sources);
            assert_eq!(n.normalize(&once, &sources), once);
        }
        let placeholder = n.normalize("Answer", &[]);
        assert_eq!(placeholder, format!("Answer\n{}", NO_SOURCE_CITATION));
        assert_eq!(n.normalize(&placeholder, &[]), placeholder);
    }

    #[test]
    fn source_names_are_distinct_sorted_basenames() {
        use normas_core::types::{ChunkMeta, SourceMeta};
        let chunk = |path: &str| Chunk {
            id: "x:0".to_string(),
            text: "t".to_string(),
            metadata: ChunkMeta { source: SourceMeta { source_path: path.to_string(), page_number: None }, start_offset: 0 },
        };
        let chunks = vec![chunk("/data/docs/b.pdf"), chunk("docs/a.pdf"), chunk("/other/b.pdf"), chunk("")];
        assert_eq!(source_names(&chunks), names(&["a.pdf", "b.pdf"]));
    }
}
