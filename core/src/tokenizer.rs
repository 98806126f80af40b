use crate::config::{StopWords, VectorizerConfig};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\b\w\w+\b").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always",
            "am","among","amongst","amoungst","amount","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around",
            "as","at",
            "back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside","besides","between",
            "beyond","bill","both","bottom","but","by",
            "call","can","cannot","cant","co","con","could","couldnt","cry",
            "de","describe","detail","do","done","down","due","during",
            "each","eg","eight","either","eleven","else","elsewhere","empty","enough","etc","even","ever","every","everyone","everything","everywhere",
            "except",
            "few","fifteen","fifty","fill","find","fire","first","five","for","former","formerly","forty","found","four","from","front",
            "full","further",
            "get","give","go",
            "had","has","hasnt","have","he","hence","her","here","hereafter","hereby","herein","hereupon","hers","herself","him","himself",
            "his","how","however","hundred",
            "i","ie","if","in","inc","indeed","interest","into","is","it","its","itself",
            "keep",
            "last","latter","latterly","least","less","ltd",
            "made","many","may","me","meanwhile","might","mill","mine","more","moreover","most","mostly","move","much","must","my",
            "myself",
            "name","namely","neither","never","nevertheless","next","nine","no","nobody","none","noone","nor","not","nothing","now","nowhere",
            "of","off","often","on","once","one","only","onto","or","other","others","otherwise","our","ours","ourselves","out",
            "over","own",
            "part","per","perhaps","please","put",
            "rather","re",
            "same","see","seem","seemed","seeming","seems","serious","several","she","should","show","side","since","sincere","six","sixty",
            "so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such","system",
            "take","ten","than","that","the","their","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon",
            "these","they","thick","thin","third","this","those","though","three","through","throughout","thru","thus","to","together","too",
            "top","toward","towards","twelve","twenty","two",
            "un","under","until","up","upon","us",
            "very","via",
            "was","we","well","were","what","whatever","when","whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever",
            "whether","which","while","whither","who","whoever","whole","whom","whose","why","will","with","within","without","would",
            "yet","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Split text into lower-cased word tokens of two or more characters after NFKC normalization.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}

/// Produce the terms the vector model counts for `text`: tokens with stop words
/// dropped (and optionally stemmed), expanded to every n-gram in the configured range.
/// Stop words are removed before n-grams are formed.
pub fn analyze(text: &str, config: &VectorizerConfig) -> Vec<String> {
    let mut words = tokenize(text);
    if config.stop_words == StopWords::English {
        words.retain(|w| !is_stopword(w));
    }
    if config.stemming {
        words = words.iter().map(|w| STEMMER.stem(w).into_owned()).collect();
    }

    let (min_n, max_n) = config.ngram_range;
    if min_n == 1 && max_n == 1 {
        return words;
    }
    let mut terms = Vec::new();
    for n in min_n..=max_n {
        if n > words.len() { break; }
        for window in words.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Great service, a friendly STAFF!");
        assert_eq!(t, vec!["great", "service", "friendly", "staff"]);
    }

    #[test]
    fn bigrams_span_removed_stopwords() {
        let cfg = VectorizerConfig::default();
        let terms = analyze("service of the staff", &cfg);
        assert_eq!(terms, vec!["service", "staff", "service staff"]);
    }

    #[test]
    fn stemming_is_opt_in() {
        let plain = analyze("running", &VectorizerConfig::default());
        assert_eq!(plain, vec!["running"]);
        let cfg = VectorizerConfig { stemming: true, ..Default::default() };
        assert_eq!(analyze("running", &cfg), vec!["run"]);
    }

    #[test]
    fn keeps_stopwords_when_disabled() {
        let cfg = VectorizerConfig { stop_words: StopWords::None, ngram_range: (1, 1), ..Default::default() };
        assert_eq!(analyze("the food", &cfg), vec!["the", "food"]);
    }

    #[test]
    fn common_adverbs_are_stopwords() {
        let cfg = VectorizerConfig { ngram_range: (1, 1), ..Default::default() };
        assert_eq!(analyze("never coming back again", &cfg), vec!["coming"]);
        assert!(is_stopword("amongst"));
        assert!(!is_stopword("food"));
    }
}
