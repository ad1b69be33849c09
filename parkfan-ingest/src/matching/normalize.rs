//! Name normalization, similarity, and alias lookup tables
//!
//! Runtime heuristics stop at casing, whitespace, punctuation and diacritics.
//! Everything else (country and continent aliases) is an explicit table.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum length of the shorter name for the containment boost
const CONTAINMENT_MIN_CHARS: usize = 5;

/// Similarity floor when one name contains the other
const CONTAINMENT_BOOST: f64 = 0.9;

/// Lowercase, strip diacritics and punctuation, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| match c {
            'ß' => vec!['s', 's'],
            'æ' | 'Æ' => vec!['a', 'e'],
            'ø' | 'Ø' => vec!['o'],
            '&' => vec![' ', 'a', 'n', 'd', ' '],
            c if c.is_alphanumeric() => c.to_lowercase().collect(),
            _ => vec![' '],
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two names in [0, 1] after normalization
///
/// Plain normalized Levenshtein, boosted to at least 0.9 when one name
/// contains the other and the shorter one is longer than five characters.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let base = strsim::normalized_levenshtein(&a, &b);
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (&a, &b)
    } else {
        (&b, &a)
    };

    if shorter.chars().count() > CONTAINMENT_MIN_CHARS && longer.contains(shorter.as_str()) {
        base.max(CONTAINMENT_BOOST)
    } else {
        base
    }
}

/// Canonical continent keys
pub mod continent {
    pub const NORTH_AMERICA: &str = "north_america";
    pub const SOUTH_AMERICA: &str = "south_america";
    pub const EUROPE: &str = "europe";
    pub const ASIA: &str = "asia";
    pub const AFRICA: &str = "africa";
    pub const OCEANIA: &str = "oceania";
}

const CONTINENT_ALIASES: &[(&str, &str)] = &[
    ("north america", continent::NORTH_AMERICA),
    ("northamerica", continent::NORTH_AMERICA),
    ("north_america", continent::NORTH_AMERICA),
    ("central america", continent::NORTH_AMERICA),
    ("nordamerika", continent::NORTH_AMERICA),
    ("south america", continent::SOUTH_AMERICA),
    ("southamerica", continent::SOUTH_AMERICA),
    ("south_america", continent::SOUTH_AMERICA),
    ("latin america", continent::SOUTH_AMERICA),
    ("sudamerika", continent::SOUTH_AMERICA),
    ("europe", continent::EUROPE),
    ("europa", continent::EUROPE),
    ("asia", continent::ASIA),
    ("asien", continent::ASIA),
    ("middle east", continent::ASIA),
    ("africa", continent::AFRICA),
    ("afrika", continent::AFRICA),
    ("oceania", continent::OCEANIA),
    ("australia", continent::OCEANIA),
    ("australia and oceania", continent::OCEANIA),
    ("australien", continent::OCEANIA),
];

/// (alias, ISO 3166-1 alpha-2, continent)
const COUNTRY_TABLE: &[(&str, &str, &str)] = &[
    ("united states", "US", continent::NORTH_AMERICA),
    ("united states of america", "US", continent::NORTH_AMERICA),
    ("usa", "US", continent::NORTH_AMERICA),
    ("us", "US", continent::NORTH_AMERICA),
    ("canada", "CA", continent::NORTH_AMERICA),
    ("ca", "CA", continent::NORTH_AMERICA),
    ("mexico", "MX", continent::NORTH_AMERICA),
    ("mx", "MX", continent::NORTH_AMERICA),
    ("brazil", "BR", continent::SOUTH_AMERICA),
    ("brasil", "BR", continent::SOUTH_AMERICA),
    ("br", "BR", continent::SOUTH_AMERICA),
    ("argentina", "AR", continent::SOUTH_AMERICA),
    ("colombia", "CO", continent::SOUTH_AMERICA),
    ("chile", "CL", continent::SOUTH_AMERICA),
    ("united kingdom", "GB", continent::EUROPE),
    ("uk", "GB", continent::EUROPE),
    ("gb", "GB", continent::EUROPE),
    ("great britain", "GB", continent::EUROPE),
    ("england", "GB", continent::EUROPE),
    ("scotland", "GB", continent::EUROPE),
    ("grossbritannien", "GB", continent::EUROPE),
    ("ireland", "IE", continent::EUROPE),
    ("france", "FR", continent::EUROPE),
    ("frankreich", "FR", continent::EUROPE),
    ("fr", "FR", continent::EUROPE),
    ("germany", "DE", continent::EUROPE),
    ("deutschland", "DE", continent::EUROPE),
    ("de", "DE", continent::EUROPE),
    ("netherlands", "NL", continent::EUROPE),
    ("the netherlands", "NL", continent::EUROPE),
    ("niederlande", "NL", continent::EUROPE),
    ("nederland", "NL", continent::EUROPE),
    ("holland", "NL", continent::EUROPE),
    ("nl", "NL", continent::EUROPE),
    ("belgium", "BE", continent::EUROPE),
    ("belgien", "BE", continent::EUROPE),
    ("be", "BE", continent::EUROPE),
    ("spain", "ES", continent::EUROPE),
    ("spanien", "ES", continent::EUROPE),
    ("espana", "ES", continent::EUROPE),
    ("es", "ES", continent::EUROPE),
    ("italy", "IT", continent::EUROPE),
    ("italien", "IT", continent::EUROPE),
    ("italia", "IT", continent::EUROPE),
    ("it", "IT", continent::EUROPE),
    ("denmark", "DK", continent::EUROPE),
    ("danemark", "DK", continent::EUROPE),
    ("dk", "DK", continent::EUROPE),
    ("sweden", "SE", continent::EUROPE),
    ("schweden", "SE", continent::EUROPE),
    ("se", "SE", continent::EUROPE),
    ("norway", "NO", continent::EUROPE),
    ("norwegen", "NO", continent::EUROPE),
    ("finland", "FI", continent::EUROPE),
    ("finnland", "FI", continent::EUROPE),
    ("poland", "PL", continent::EUROPE),
    ("polen", "PL", continent::EUROPE),
    ("pl", "PL", continent::EUROPE),
    ("austria", "AT", continent::EUROPE),
    ("osterreich", "AT", continent::EUROPE),
    ("at", "AT", continent::EUROPE),
    ("switzerland", "CH", continent::EUROPE),
    ("schweiz", "CH", continent::EUROPE),
    ("ch", "CH", continent::EUROPE),
    ("czech republic", "CZ", continent::EUROPE),
    ("czechia", "CZ", continent::EUROPE),
    ("tschechien", "CZ", continent::EUROPE),
    ("portugal", "PT", continent::EUROPE),
    ("turkey", "TR", continent::EUROPE),
    ("turkei", "TR", continent::EUROPE),
    ("japan", "JP", continent::ASIA),
    ("jp", "JP", continent::ASIA),
    ("china", "CN", continent::ASIA),
    ("cn", "CN", continent::ASIA),
    ("hong kong", "HK", continent::ASIA),
    ("hongkong", "HK", continent::ASIA),
    ("hk", "HK", continent::ASIA),
    ("south korea", "KR", continent::ASIA),
    ("korea", "KR", continent::ASIA),
    ("sudkorea", "KR", continent::ASIA),
    ("kr", "KR", continent::ASIA),
    ("taiwan", "TW", continent::ASIA),
    ("singapore", "SG", continent::ASIA),
    ("singapur", "SG", continent::ASIA),
    ("sg", "SG", continent::ASIA),
    ("malaysia", "MY", continent::ASIA),
    ("thailand", "TH", continent::ASIA),
    ("india", "IN", continent::ASIA),
    ("united arab emirates", "AE", continent::ASIA),
    ("uae", "AE", continent::ASIA),
    ("vereinigte arabische emirate", "AE", continent::ASIA),
    ("ae", "AE", continent::ASIA),
    ("saudi arabia", "SA", continent::ASIA),
    ("australia", "AU", continent::OCEANIA),
    ("australien", "AU", continent::OCEANIA),
    ("au", "AU", continent::OCEANIA),
    ("new zealand", "NZ", continent::OCEANIA),
    ("south africa", "ZA", continent::AFRICA),
    ("sudafrika", "ZA", continent::AFRICA),
    ("egypt", "EG", continent::AFRICA),
];

fn country_entry(country: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let key = normalize_name(country);
    COUNTRY_TABLE.iter().find(|(alias, _, _)| *alias == key)
}

/// ISO alpha-2 code for a country name, alias, or code
pub fn country_code(country: &str) -> Option<&'static str> {
    country_entry(country).map(|(_, code, _)| *code)
}

/// Canonical continent key for a continent name or alias
pub fn continent_key(continent: &str) -> Option<&'static str> {
    let key = normalize_name(continent);
    CONTINENT_ALIASES
        .iter()
        .find(|(alias, _)| normalize_name(alias) == key)
        .map(|(_, canonical)| *canonical)
}

/// Continent from an explicit value, falling back to the country table
pub fn resolve_continent(continent: Option<&str>, country: Option<&str>) -> Option<&'static str> {
    continent
        .and_then(continent_key)
        .or_else(|| country.and_then(country_entry).map(|(_, _, c)| *c))
}
