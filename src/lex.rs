use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("unterminated double quote string")]
#[diagnostic(
    code(lex::unterminated_string),
    help("close the text literal with `\"` on the same line")
)]
pub struct StringTerminationError {
    #[source_code]
    src: NamedSource<String>,

    #[label("Syntax Error: Missing trailing `\"` symbol to terminate the string literal")]
    bad_line: SourceSpan,
}

impl StringTerminationError {
    pub fn line(&self) -> usize {
        self.src.inner()[..=self.bad_line.offset()].lines().count()
    }
}

const PUNCTUATION: &[char] = &[
    '(', ')', '{', '}', '[', ']', ',', ';', ':', '+', '-', '*', '/', '%', '<', '>', '=', '!',
];

/// Splits source text into lexemes.
///
/// Punctuation always stands alone (`==`, `!=`, `<=` and `>=` stay joined),
/// double-quoted text is one lexeme including its quotes, and `//` comments
/// run to the end of the line.
pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    byte: usize,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
        }
    }

    fn advance(&mut self, len: usize) -> &'de str {
        let lexeme = &self.rest[..len];
        self.rest = &self.rest[len..];
        self.byte += len;
        lexeme
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<&'de str, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.rest.chars().next()?;

            if c.is_whitespace() {
                self.advance(c.len_utf8());
                continue;
            }

            if self.rest.starts_with("//") {
                let new_line = self.rest.find('\n').unwrap_or(self.rest.len());
                self.advance(new_line);
                continue;
            }

            if c == '"' {
                let end = self.rest[1..]
                    .find(|c: char| c == '"' || c == '\n')
                    .map(|end| end + 1)
                    .filter(|&end| self.rest[end..].starts_with('"'));
                let Some(end) = end else {
                    let line_end = self.rest.find('\n').unwrap_or(self.rest.len());
                    let bad_line = SourceSpan::from(self.byte..self.byte + line_end);
                    self.advance(line_end);
                    return Some(Err(StringTerminationError {
                        src: NamedSource::new(
                            self.filename.unwrap_or("<input>"),
                            self.whole.to_string(),
                        ),
                        bad_line,
                    }
                    .into()));
                };
                return Some(Ok(self.advance(end + 1)));
            }

            if ["==", "!=", "<=", ">="].iter().any(|op| self.rest.starts_with(op)) {
                return Some(Ok(self.advance(2)));
            }

            if PUNCTUATION.contains(&c) {
                return Some(Ok(self.advance(1)));
            }

            let end = self
                .rest
                .find(|c: char| c.is_whitespace() || c == '"' || PUNCTUATION.contains(&c))
                .unwrap_or(self.rest.len());
            return Some(Ok(self.advance(end)));
        }
    }
}

/// Lexemes of a single line, ready for the interpreter.
pub fn split(line: &str) -> Result<Vec<&str>, Error> {
    Lexer::new(None, line).collect()
}

/// Numbered lexemes of every line in `source`, counting from 1. Blank and
/// comment-only lines are skipped.
pub fn lines<'de>(
    filename: Option<&'de str>,
    source: &'de str,
) -> impl Iterator<Item = (usize, Result<Vec<&'de str>, Error>)> + 'de {
    source.lines().enumerate().filter_map(move |(index, line)| {
        match Lexer::new(filename, line).collect::<Result<Vec<_>, _>>() {
            Ok(tokens) if tokens.is_empty() => None,
            result => Some((index + 1, result)),
        }
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn pads_punctuation() {
        assert_eq!(
            split("int x=(1+2)*3;").unwrap(),
            vec!["int", "x", "=", "(", "1", "+", "2", ")", "*", "3", ";"]
        );
    }

    #[test]
    fn keeps_two_character_operators() {
        assert_eq!(split("a==b>=c").unwrap(), vec!["a", "==", "b", ">=", "c"]);
        assert_eq!(split("a = = b").unwrap(), vec!["a", "=", "=", "b"]);
    }

    #[test]
    fn quoted_text_is_one_lexeme() {
        assert_eq!(
            split("string s = \"a b;c\" + \"\";").unwrap(),
            vec!["string", "s", "=", "\"a b;c\"", "+", "\"\"", ";"]
        );
    }

    #[test]
    fn numbers_keep_their_fraction() {
        assert_eq!(split("x = 3.25;").unwrap(), vec!["x", "=", "3.25", ";"]);
    }

    #[test]
    fn comments_and_blank_lines() {
        assert!(split("   ").unwrap().is_empty());
        assert!(split("// only a comment").unwrap().is_empty());
        assert_eq!(split("x = 1; // trailing").unwrap(), vec!["x", "=", "1", ";"]);
    }

    #[test]
    fn lines_skip_blanks_and_comments() {
        let source = "// header\nint x ;\n\n   \nx = 1 ; // set\n// done";
        let numbered: Vec<_> = lines(None, source)
            .map(|(number, tokens)| (number, tokens.unwrap()))
            .collect();
        assert_eq!(
            numbered,
            vec![(2, vec!["int", "x", ";"]), (5, vec!["x", "=", "1", ";"])]
        );
    }

    #[test]
    fn lines_report_unterminated_text() {
        let mut numbered = lines(Some("demo.txt"), "int x ;\ns = \"oops\nx = 2 ;");
        assert!(numbered.next().unwrap().1.is_ok());
        let (number, result) = numbered.next().unwrap();
        assert_eq!(number, 2);
        assert!(result.unwrap_err().downcast_ref::<StringTerminationError>().is_some());
        assert_eq!(numbered.next().unwrap().0, 3);
    }

    #[test]
    fn unterminated_text() {
        let err = split("s = \"abc").unwrap_err();
        let err = err.downcast_ref::<StringTerminationError>().unwrap();
        assert_eq!(err.line(), 1);

        let mut lexer = Lexer::new(Some("two.txt"), "x = 1 ;\ns = \"abc\ny");
        let err = lexer.find_map(Result::err).unwrap();
        assert_eq!(err.downcast_ref::<StringTerminationError>().unwrap().line(), 2);
    }
}
