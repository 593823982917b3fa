use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Error, ErrorKind};

/// Section name used for words that appear before any `[name]` header.
pub const DEFAULT_SECTION: &str = "default";

// Curated word lists are typically a few hundred to a few thousand entries.
// Pre-allocating avoids early reallocations while the file is read.
const APPROX_SECTION_WORDS: usize = 1024;

/// Loads word sections from a word-list file (gzipped if the path ends with .gz).
///
/// One word per line. Lines starting with `#` are comments, blank lines are
/// ignored, and a `[name]` line starts a new section. Words are trimmed and
/// lowercased; sections that end up empty are dropped.
pub fn load_word_sections(path: &str) -> Result<Vec<(String, Vec<String>)>, Error> {
    let file = File::open(path)
        .map_err(|e| Error::new(e.kind(), format!("Failed to open word list '{}': {}", path, e)))?;

    let reader: Box<dyn BufRead> = if path.ends_with(".gz") {
        println!("Detected .gz extension for '{}', reading as gzipped word list.", path);
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    parse_sections(reader, path)
}

/// Same parse over an in-memory buffer, for callers that already hold the
/// file contents (the browser entry path).
pub fn load_word_sections_from_bytes(
    bytes: &[u8],
    is_gzipped: bool,
) -> Result<Vec<(String, Vec<String>)>, Error> {
    let reader: Box<dyn BufRead + '_> = if is_gzipped {
        Box::new(BufReader::new(GzDecoder::new(bytes)))
    } else {
        Box::new(BufReader::new(bytes))
    };

    parse_sections(reader, "<memory>")
}

fn parse_sections<'a>(
    reader: Box<dyn BufRead + 'a>,
    source: &str,
) -> Result<Vec<(String, Vec<String>)>, Error> {
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    for line_result in reader.lines() {
        let line = line_result.map_err(|e| {
            Error::new(e.kind(), format!("Error reading line from word list '{}': {}", source, e))
        })?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(header) = parse_section_header(trimmed) {
            if header.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Empty section name in word list '{}'.", source),
                ));
            }
            sections.push((header.to_string(), Vec::with_capacity(APPROX_SECTION_WORDS)));
            continue;
        }

        if sections.is_empty() {
            // Headerless word lists are the common case.
            sections.push((DEFAULT_SECTION.to_string(), Vec::with_capacity(APPROX_SECTION_WORDS)));
        }
        if let Some((_, words)) = sections.last_mut() {
            words.push(trimmed.to_lowercase());
        }
    }

    sections.retain(|(_, words)| !words.is_empty());

    if sections.is_empty() {
        Err(Error::new(
            ErrorKind::InvalidData,
            format!("No words found in word list '{}'.", source),
        ))
    } else {
        Ok(sections)
    }
}

fn parse_section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn flat_list_lands_in_default_section() {
        let sections = load_word_sections_from_bytes(b"pea\nlentil\nchickpea\n", false).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, DEFAULT_SECTION);
        assert_eq!(sections[0].1, vec!["pea", "lentil", "chickpea"]);
    }

    #[test]
    fn sections_comments_and_blanks() {
        let input = b"# legumes and greens\n[legumes]\npea\nlentil\n\n[greens]\nkale\n# inline note\nchard\n";
        let sections = load_word_sections_from_bytes(input, false).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], ("legumes".to_string(), vec!["pea".to_string(), "lentil".to_string()]));
        assert_eq!(sections[1], ("greens".to_string(), vec!["kale".to_string(), "chard".to_string()]));
    }

    #[test]
    fn words_are_trimmed_and_lowercased() {
        let sections = load_word_sections_from_bytes(b"  Kale \nCHARD\n", false).unwrap();
        assert_eq!(sections[0].1, vec!["kale", "chard"]);
    }

    #[test]
    fn words_before_first_header_keep_their_own_section() {
        let sections =
            load_word_sections_from_bytes(b"tomato\n[legumes]\npea\n", false).unwrap();
        assert_eq!(sections[0], (DEFAULT_SECTION.to_string(), vec!["tomato".to_string()]));
        assert_eq!(sections[1], ("legumes".to_string(), vec!["pea".to_string()]));
    }

    #[test]
    fn empty_sections_are_dropped() {
        let sections =
            load_word_sections_from_bytes(b"[empty]\n[greens]\nkale\n", false).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, "greens");
    }

    #[test]
    fn wholly_empty_list_is_an_error() {
        let err = load_word_sections_from_bytes(b"# only comments\n\n", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn blank_section_name_is_an_error() {
        let err = load_word_sections_from_bytes(b"[  ]\nkale\n", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn gzipped_bytes_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"[legumes]\npea\nlentil\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let sections = load_word_sections_from_bytes(&compressed, true).unwrap();
        assert_eq!(sections[0], ("legumes".to_string(), vec!["pea".to_string(), "lentil".to_string()]));
    }

    #[test]
    fn loads_from_a_file_path() {
        let path = std::env::temp_dir().join("word_distance_calculator_wordlist_test.txt");
        std::fs::write(&path, "pea\nbean\n").unwrap();
        let sections = load_word_sections(path.to_str().unwrap()).unwrap();
        assert_eq!(sections[0].1, vec!["pea", "bean"]);
        let _ = std::fs::remove_file(&path);
    }
}
