//! Per-language stopword tables
//!
//! Small embedded tables for the eleven supported languages. Lookups accept
//! BCP-47 style codes and match on the primary subtag ("en-US" -> "en").
//! Languages without a table return `None`; callers skip removal.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

static TABLES: OnceLock<HashMap<&'static str, HashSet<&'static str>>> = OnceLock::new();

/// Look up the stopword set for a language code, if one exists.
pub fn for_language(code: &str) -> Option<&'static HashSet<&'static str>> {
    let primary = code.split(['-', '_']).next().unwrap_or("");
    let primary = primary.to_ascii_lowercase();
    tables().get(primary.as_str())
}

/// True when the language has a stopword table.
pub fn is_supported(code: &str) -> bool {
    for_language(code).is_some()
}

fn tables() -> &'static HashMap<&'static str, HashSet<&'static str>> {
    TABLES.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("en", ENGLISH.iter().copied().collect());
        map.insert("es", SPANISH.iter().copied().collect());
        map.insert("fr", FRENCH.iter().copied().collect());
        map.insert("de", GERMAN.iter().copied().collect());
        map.insert("pt", PORTUGUESE.iter().copied().collect());
        map.insert("it", ITALIAN.iter().copied().collect());
        map.insert("nl", DUTCH.iter().copied().collect());
        map.insert("ru", RUSSIAN.iter().copied().collect());
        map.insert("zh", CHINESE.iter().copied().collect());
        map.insert("ja", JAPANESE.iter().copied().collect());
        map.insert("ko", KOREAN.iter().copied().collect());
        map
    })
}

const ENGLISH: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had", "has",
    "have", "he", "her", "his", "if", "in", "into", "is", "it", "its", "not", "of", "on", "or",
    "our", "she", "so", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "to", "was", "we", "were", "which", "while", "will", "with", "would", "you",
];

const SPANISH: &[&str] = &[
    "al", "como", "con", "de", "del", "el", "ella", "en", "entre", "es", "esta", "este", "fue",
    "ha", "la", "las", "lo", "los", "mas", "no", "o", "para", "pero", "por", "que", "se", "ser",
    "si", "sin", "sobre", "son", "su", "sus", "un", "una", "y", "ya",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "est", "et", "il",
    "la", "le", "les", "leur", "mais", "ne", "on", "ou", "par", "pas", "pour", "qui", "que", "sa",
    "se", "ses", "son", "sont", "sur", "un", "une",
];

const GERMAN: &[&str] = &[
    "als", "auch", "auf", "aus", "bei", "das", "dass", "dem", "den", "der", "des", "die", "durch",
    "ein", "eine", "einen", "einer", "es", "im", "in", "ist", "mit", "nicht", "oder", "sich",
    "sie", "sind", "und", "von", "vor", "werden", "wird", "zu", "zum", "zur",
];

const PORTUGUESE: &[&str] = &[
    "ao", "as", "com", "como", "da", "das", "de", "do", "dos", "e", "em", "entre", "esta", "foi",
    "mais", "mas", "na", "nas", "no", "nos", "o", "os", "ou", "para", "pela", "pelo", "por",
    "que", "se", "sem", "ser", "sobre", "sua", "um", "uma",
];

const ITALIAN: &[&str] = &[
    "al", "alla", "anche", "che", "come", "con", "da", "dei", "del", "della", "delle", "di", "e",
    "gli", "i", "il", "in", "la", "le", "lo", "ma", "nel", "nella", "non", "o", "per", "piu",
    "se", "si", "sono", "su", "tra", "un", "una", "uno",
];

const DUTCH: &[&str] = &[
    "aan", "als", "bij", "dat", "de", "den", "der", "die", "dit", "door", "een", "en", "er",
    "het", "in", "is", "maar", "met", "naar", "niet", "of", "om", "onder", "ook", "op", "te",
    "tot", "uit", "van", "voor", "wordt", "zijn",
];

const RUSSIAN: &[&str] = &[
    "в", "во", "для", "до", "его", "ее", "если", "же", "за", "и", "из", "или", "их", "к", "как",
    "ко", "на", "не", "но", "о", "об", "он", "она", "они", "от", "по", "при", "с", "со", "так",
    "также", "то", "у", "что", "эта", "это",
];

const CHINESE: &[&str] = &[
    "的", "了", "和", "是", "在", "我", "有", "他", "这", "中", "大", "来", "上", "国", "个",
    "到", "说", "们", "为", "子", "与", "也", "就", "对", "等",
];

const JAPANESE: &[&str] = &[
    "の", "に", "は", "を", "た", "が", "で", "て", "と", "し", "れ", "さ", "ある", "いる",
    "する", "から", "など", "なっ", "ない", "この", "その", "また",
];

const KOREAN: &[&str] = &[
    "이", "그", "저", "것", "수", "등", "들", "및", "에서", "으로", "하는", "하여", "한", "할",
    "있는", "있다", "되어", "된", "또한", "그리고",
];
