//! Rule-based headline polarity in the style of VADER: a valence lexicon plus
//! adjustments for boosters, negation, capitalisation, contrastive "but" and
//! exclamation marks, normalised into a compound score in [-1, 1].

use std::collections::{HashMap, HashSet};

/// Word valences on the -4..4 scale. General sentiment words plus the market
/// vocabulary that shows up in headlines.
const LEXICON: &[(&str, f64)] = &[
    // positive
    ("good", 1.9), ("great", 3.1), ("excellent", 2.7), ("strong", 2.3),
    ("stronger", 2.2), ("best", 3.2), ("better", 1.9), ("positive", 2.6),
    ("success", 2.7), ("successful", 2.8), ("win", 2.8), ("wins", 2.7),
    ("winning", 2.4), ("optimistic", 2.3), ("optimism", 2.5), ("confident", 2.2),
    ("impressive", 2.3), ("boost", 1.7), ("boosts", 1.7), ("gain", 2.0),
    ("gains", 1.8), ("gained", 1.6), ("profit", 1.9), ("profits", 1.9),
    ("profitable", 2.1), ("growth", 1.8), ("grow", 1.4), ("grows", 1.4),
    ("surge", 2.0), ("surges", 2.0), ("surged", 2.0), ("soar", 2.4),
    ("soars", 2.4), ("soared", 2.3), ("rally", 1.9), ("rallies", 1.9),
    ("rallied", 1.8), ("jump", 1.2), ("jumps", 1.2), ("climb", 1.2),
    ("climbs", 1.2), ("rise", 1.2), ("rises", 1.2), ("rising", 1.1),
    ("record", 1.0), ("beat", 1.6), ("beats", 1.6), ("exceed", 1.6),
    ("exceeds", 1.6), ("outperform", 2.0), ("outperforms", 2.0), ("upgrade", 2.1),
    ("upgraded", 2.1), ("upgrades", 2.1), ("bullish", 2.4), ("breakthrough", 2.5),
    ("innovation", 1.6), ("innovative", 1.9), ("recovery", 1.6), ("rebound", 1.5), ("recover", 1.5),
    ("rebounds", 1.5), ("robust", 2.0), ("upside", 1.6), ("momentum", 1.0),
    ("dividend", 1.0), ("buyback", 1.2), ("accretive", 1.4), ("tailwind", 1.4),
    ("tailwinds", 1.4), ("expansion", 1.1), ("overweight", 1.1), ("buy", 0.9),
    ("approval", 2.0), ("approved", 1.8), ("love", 3.2), ("happy", 2.7),
    ("boom", 2.0), ("thrive", 2.4), ("thrives", 2.4), ("opportunity", 1.8),
    // negative
    ("bad", -2.5), ("terrible", -2.9), ("awful", -3.1), ("worst", -3.1),
    ("worse", -2.1), ("weak", -1.9), ("weaker", -1.9), ("weakness", -1.8),
    ("negative", -2.7), ("fail", -2.5), ("fails", -2.5), ("failed", -2.3),
    ("failure", -2.7), ("loss", -1.6), ("losses", -1.6), ("lose", -1.7),
    ("loses", -1.7), ("lost", -1.3), ("decline", -1.5), ("declines", -1.5),
    ("declined", -1.4), ("fall", -1.4), ("falls", -1.4), ("fell", -1.4),
    ("drop", -1.1), ("drops", -1.1), ("dropped", -1.1), ("slump", -2.0),
    ("slumps", -2.0), ("plunge", -2.3), ("plunges", -2.3), ("plunged", -2.3),
    ("crash", -2.7), ("crashes", -2.7), ("tumble", -1.9), ("tumbles", -1.9),
    ("sink", -1.4), ("sinks", -1.4), ("miss", -1.3), ("misses", -1.3),
    ("missed", -1.3), ("downgrade", -2.0), ("downgraded", -2.0), ("downgrades", -2.0),
    ("underperform", -2.0), ("bearish", -2.4), ("concern", -1.4), ("concerns", -1.4),
    ("worry", -1.9), ("worries", -1.9), ("fear", -2.2), ("fears", -2.2),
    ("risk", -1.1), ("risks", -1.1), ("risky", -1.6), ("warning", -1.5),
    ("warns", -1.5), ("disappoint", -2.1), ("disappoints", -2.1), ("disappointing", -2.2),
    ("pessimistic", -2.1), ("trouble", -1.9), ("troubled", -2.0), ("crisis", -3.1),
    ("lawsuit", -1.8), ("sued", -1.8), ("litigation", -1.4), ("probe", -1.2),
    ("investigation", -1.3), ("fraud", -3.2), ("scandal", -2.8), ("recall", -1.4),
    ("default", -1.9), ("bankruptcy", -3.0), ("bankrupt", -3.0), ("layoff", -2.0),
    ("layoffs", -2.0), ("headwind", -1.4), ("headwinds", -1.4), ("dilution", -1.3),
    ("dilutive", -1.3), ("overvalued", -1.5), ("bubble", -1.4), ("downside", -1.4),
    ("underweight", -1.1), ("sell", -0.9), ("selloff", -2.0), ("volatile", -1.0),
    ("uncertainty", -1.4), ("uncertain", -1.2), ("hate", -2.7), ("sad", -2.1),
    ("penalty", -2.0), ("fined", -1.7), ("suspended", -2.1),
];

const BOOSTERS_UP: &[&str] = &[
    "very", "extremely", "highly", "significantly", "sharply", "strongly",
    "hugely", "massively", "substantially", "really", "incredibly", "most",
    "deeply", "remarkably", "exceptionally", "especially", "totally",
];

const BOOSTERS_DOWN: &[&str] = &[
    "slightly", "somewhat", "marginally", "partly", "little", "mildly", "modestly",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without", "nothing", "cannot",
];

const NEGATION_WINDOW: usize = 3;

pub const BOOST_INCREMENT: f64 = 0.293;
pub const NEGATION_SCALAR: f64 = -0.74;
pub const CAPS_INCREMENT: f64 = 0.733;
pub const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NORMALIZATION_ALPHA: f64 = 15.0;

/// Lexicon scorer producing a compound polarity in [-1, 1].
pub struct LexiconAnalyzer {
    lexicon: HashMap<&'static str, f64>,
    boosters: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
}

impl LexiconAnalyzer {
    pub fn new() -> Self {
        let boosters = BOOSTERS_UP
            .iter()
            .map(|w| (*w, BOOST_INCREMENT))
            .chain(BOOSTERS_DOWN.iter().map(|w| (*w, -BOOST_INCREMENT)))
            .collect();

        Self {
            lexicon: LEXICON.iter().copied().collect(),
            boosters,
            negations: NEGATION_WORDS.iter().copied().collect(),
        }
    }

    /// Compound score for one piece of text. Text without any lexicon hit is 0.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let caps_differ = caps_differential(&tokens);

        let mut valences = vec![0.0; tokens.len()];
        for (i, word) in lowered.iter().enumerate() {
            if self.boosters.contains_key(word.as_str()) {
                continue;
            }
            let Some(&base) = self.lexicon.get(word.as_str()) else {
                continue;
            };

            let mut valence = base;
            if caps_differ && is_all_caps(tokens[i]) {
                valence += CAPS_INCREMENT * base.signum();
            }

            for distance in 1..=NEGATION_WINDOW.min(i) {
                let prev = lowered[i - distance].as_str();
                if self.lexicon.contains_key(prev) {
                    continue;
                }
                let damp = match distance {
                    1 => 1.0,
                    2 => 0.95,
                    _ => 0.9,
                };
                valence += self.booster_scalar(prev, tokens[i - distance], valence, caps_differ)
                    * damp;
            }

            let negated = (1..=NEGATION_WINDOW.min(i))
                .any(|distance| self.is_negation(&lowered[i - distance]));
            if negated {
                valence *= NEGATION_SCALAR;
            }

            valences[i] = valence;
        }

        apply_but_rule(&lowered, &mut valences);

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let exclamations = text.chars().filter(|&c| c == '!').count().min(MAX_EXCLAMATIONS);
            sum += sum.signum() * exclamations as f64 * EXCLAMATION_INCREMENT;
        }

        normalize(sum)
    }

    fn booster_scalar(&self, lower: &str, raw: &str, valence: f64, caps_differ: bool) -> f64 {
        let Some(&boost) = self.boosters.get(lower) else {
            return 0.0;
        };
        let mut scalar = boost;
        if caps_differ && is_all_caps(raw) {
            scalar += CAPS_INCREMENT * boost.signum();
        }
        if valence < 0.0 {
            -scalar
        } else {
            scalar
        }
    }

    fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word) || word.ends_with("n't")
    }
}

impl Default for LexiconAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_all_caps(token: &str) -> bool {
    let mut letters = token.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}

/// Emphasis only counts when some, but not all, tokens are shouted.
fn caps_differential(tokens: &[&str]) -> bool {
    let caps = tokens.iter().filter(|t| is_all_caps(t)).count();
    caps > 0 && caps < tokens.len()
}

/// Sentiment before the first "but" is halved and sentiment after it is
/// weighted up by half.
fn apply_but_rule(lowered: &[String], valences: &mut [f64]) {
    let Some(pivot) = lowered.iter().position(|w| w == "but") else {
        return;
    };
    for (i, v) in valences.iter_mut().enumerate() {
        if i < pivot {
            *v *= 0.5;
        } else if i > pivot {
            *v *= 1.5;
        }
    }
}

fn normalize(sum: f64) -> f64 {
    (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}
