//! Artifact extraction: cut the artifact out of a reply and clean it.
//!
//! Extraction is idempotent: running it over its own output changes nothing.

use docforge_core::ArtifactGrammar;

#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    grammar: ArtifactGrammar,
}

impl ArtifactExtractor {
    pub fn new(grammar: ArtifactGrammar) -> Self {
        Self { grammar }
    }

    /// Slice from the first start marker to the last end marker that follows
    /// it (or to the end of text), drop fence lines wherever they appear, and
    /// drop prose lines ahead of the first structural line.
    pub fn extract(&self, text: &str) -> String {
        let body = match self.grammar.find_start(text) {
            Some(start) => {
                let rest = &text[start..];
                match self.grammar.find_last_end(rest) {
                    Some(end) => &rest[..end],
                    None => rest,
                }
            }
            None => text,
        };

        let lines: Vec<&str> = body
            .lines()
            .filter(|line| !self.grammar.is_fence_line(line))
            .skip_while(|line| !self.grammar.has_structural_syntax(line))
            .collect();

        lines.join("\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ArtifactExtractor {
        ArtifactExtractor::new(ArtifactGrammar::html())
    }

    #[test]
    fn strips_fences_and_surrounding_prose() {
        let text = "Here is the page you asked for:\n```html\n<!DOCTYPE html>\n<html>\n<body>hi</body>\n</html>\n```\nLet me know if you need anything else.";
        let out = extractor().extract(text);
        assert_eq!(out, "<!DOCTYPE html>\n<html>\n<body>hi</body>\n</html>");
    }

    #[test]
    fn keeps_tail_when_end_marker_missing() {
        let text = "Sure.\n<html>\n<body>\n<p>cut off mid";
        let out = extractor().extract(text);
        assert_eq!(out, "<html>\n<body>\n<p>cut off mid");
    }

    #[test]
    fn fences_inside_the_artifact_are_removed() {
        let text = "<html>\n<body>\n```\n<p>a</p>\n~~~js\n</body>\n</html>";
        let out = extractor().extract(text);
        assert_eq!(out, "<html>\n<body>\n<p>a</p>\n</body>\n</html>");
    }

    #[test]
    fn fence_like_lines_with_markup_survive() {
        let text = "<html>\n<pre>```</pre>\n```<code>x</code>\n</html>";
        let out = extractor().extract(text);
        assert_eq!(out, text);
    }

    #[test]
    fn uses_last_end_marker_after_start() {
        let text = "</html> stray\n<html>a</html>\n<html>b</html>\ntrailing words";
        let out = extractor().extract(text);
        assert_eq!(out, "<html>a</html>\n<html>b</html>");
    }

    #[test]
    fn drops_leading_prose_without_start_marker() {
        let text = "Here is the changed section:\n\n<div class=\"hero\">\n<h1>New</h1>\n</div>";
        let out = extractor().extract(text);
        assert_eq!(out, "<div class=\"hero\">\n<h1>New</h1>\n</div>");
    }

    #[test]
    fn extraction_is_idempotent() {
        let samples = [
            "",
            "just words",
            "Sure!\n```html\n<!doctype html><html><body>x</body></html>\n```\nbye",
            "```\n<html>\n```\n<body>\r\n</body>\n</HTML>   \n\n",
            "intro\n~~~\n<div>\n~~~\n</div>\n",
            "<html>\n<body>\ntruncated",
            "</html> before <html> after",
            "  \n\n<p>x</p>\n```\n",
        ];
        let ex = extractor();
        for sample in samples {
            let once = ex.extract(sample);
            assert_eq!(ex.extract(&once), once, "not idempotent for {sample:?}");
        }
    }
}
