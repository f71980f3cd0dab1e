use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// How page text is turned into index terms.
///
/// Every analyzer applies NFKC normalization and lowercasing; stop-word
/// removal and English stemming can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    pub stem: bool,
    pub drop_stopwords: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self { stem: true, drop_stopwords: true }
    }
}

impl Analyzer {
    /// Lowercase words only: every token is kept as written.
    pub fn plain() -> Self {
        Self { stem: false, drop_stopwords: false }
    }

    /// Split text into normalized terms, in document order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        RE.find_iter(&normalized)
            .filter_map(|m| self.finish(m.as_str()))
            .collect()
    }

    /// Normalize one query word the same way page text is normalized.
    /// Returns `None` for words the analyzer drops.
    pub fn normalize(&self, word: &str) -> Option<String> {
        self.terms(word).into_iter().next()
    }

    fn finish(&self, token: &str) -> Option<String> {
        if self.drop_stopwords && is_stopword(token) {
            return None;
        }
        if self.stem {
            Some(STEMMER.stem(token).into_owned())
        } else {
            Some(token.to_string())
        }
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize with the default analyzer.
pub fn tokenize(text: &str) -> Vec<String> {
    Analyzer::default().terms(text)
}
