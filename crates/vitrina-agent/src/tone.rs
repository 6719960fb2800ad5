// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic pre-classification run before the model call.
//!
//! Detects greetings (which restart the conversation), the register the
//! operator writes in, and prices written in image captions.

use std::sync::LazyLock;

use regex::Regex;
use vitrina_core::parse::parse_amount;
use vitrina_core::{ConversationSession, Tone};

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s¡!]*(buen\s+d[ií]a|buen[oa]s\s+(?:d[ií]as|tardes|noches)|buenas|hola+s?|holis|holu|hello|hi|hey|qu[eé]\s+tal|qu[eé]\s+onda)\b",
    )
    .unwrap()
});

static GREETING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(qu[eé]\s+tal|qu[eé]\s+onda|c[oó]mo\s+(?:est[aá]s?|va|vas|and[aá]s|anda|le\s+va)|todo\s+bien|buen\s+d[ií]a|buen[oa]s\s+(?:d[ií]as|tardes|noches)|buenas|hola+|che|amig[oa])\b",
    )
    .unwrap()
});

static FORMAL_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bustedes?\b",
        r"(?i)\bbuen[oa]s\s+(?:d[ií]as|tardes|noches)\b",
        r"(?i)\bpor\s+favor\b",
        r"(?i)\bpodr[ií]a\b",
        r"(?i)\bquisiera\b",
        r"(?i)\ble\s+agradezco\b",
        r"(?i)\bdisculpe\b",
        r"(?i)\bestimad[oa]s?\b",
        r"(?i)\bse[ñn]or(?:a|es)?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static INFORMAL_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bche\b",
        r"(?i)\bvos\b",
        r"(?i)\b(?:ja){2,}\b",
        r"(?i)\bje(?:je)+\b",
        r"(?i)\bdale\b",
        r"(?i)\bporfa\b",
        r"(?i)\bholis\b",
        r"(?i)\bgenial\b",
        r"(?i)\bb[aá]rbaro\b",
        r"(?i)\b(?:xq|q|tb|tmb)\b",
        r"(?i)\b(?:ten|quer|pod|sab)[eé]s\b",
        r"(?i)\b(?:mand|pas|fij)[aá]te?me\b",
        r"(?i)\b(?:mand|pas)[aá]me\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\$\s*)?(\d[\d.,]*\d|\d)(\s*(?:k|mil)\b)?(\s*[a-záéíóú%]+)?").unwrap()
});

static PRICE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:precio|vale|sale|cuesta|valor)\b").unwrap());

const UNIT_WORDS: &[&str] = &[
    "cm", "mm", "m", "mts", "metros", "kg", "kilos", "g", "gr", "grs", "ml", "l", "lt", "litros",
    "x", "%", "u", "un", "unidad", "unidades", "años", "talle", "gb", "tb", "mah", "w", "v", "hs",
    "min", "pulgadas", "cuotas",
];

const CURRENCY_WORDS: &[&str] = &["pesos", "ars", "usd", "dolares", "dólares", "mangos"];

/// Result of the heuristic pass over one inbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreClassification {
    /// Register of the greeting, when the message opens with one.
    pub greeting: Option<Tone>,
    /// The message is nothing but a greeting.
    pub pure_greeting: bool,
    pub register: Tone,
}

/// Classifies `text`. Captions never count as greetings: an image captioned
/// "hola" is still a product.
pub fn pre_classify(text: &str, is_caption: bool) -> PreClassification {
    let register = detect_register(text);
    let greeting = if is_caption { None } else { detect_greeting(text) };
    PreClassification {
        greeting,
        pure_greeting: greeting.is_some() && is_pure_greeting(text),
        register,
    }
}

/// Records the detected register on the session.
///
/// A neutral message keeps the previously detected tone.
pub fn apply(session: &mut ConversationSession, pre: &PreClassification) {
    if let Some(tone) = pre.greeting {
        session.greeting_tone = Some(tone);
        session.has_greeted = true;
    }
    let tone = match (pre.register, pre.greeting) {
        (Tone::Neutral, Some(greeting)) => greeting,
        (register, _) => register,
    };
    if tone != Tone::Neutral {
        session.user_tone = tone;
    }
}

/// Returns the register of the greeting `text` opens with.
pub fn detect_greeting(text: &str) -> Option<Tone> {
    let caps = GREETING.captures(text)?;
    let word = caps.get(1)?.as_str().to_lowercase();
    let tone = if word.starts_with("buen") && word != "buenas" {
        Tone::Formal
    } else if matches!(word.as_str(), "holis" | "holu" | "hey" | "buenas")
        || (word.starts_with("qu") && word.ends_with("onda"))
        || word.starts_with("holaa")
    {
        Tone::Informal
    } else {
        Tone::Neutral
    };
    Some(tone)
}

/// True when nothing but greeting words and punctuation remain.
pub fn is_pure_greeting(text: &str) -> bool {
    let Some(m) = GREETING.find(text) else {
        return false;
    };
    let rest = &text[m.end()..];
    let rest = GREETING_FILLER.replace_all(rest, " ");
    !rest.chars().any(char::is_alphanumeric)
}

pub fn detect_register(text: &str) -> Tone {
    let formal = FORMAL_MARKERS.iter().filter(|re| re.is_match(text)).count();
    let mut informal = INFORMAL_MARKERS.iter().filter(|re| re.is_match(text)).count();
    if text.chars().any(is_emoji) {
        informal += 1;
    }
    match formal.cmp(&informal) {
        std::cmp::Ordering::Greater => Tone::Formal,
        std::cmp::Ordering::Less => Tone::Informal,
        std::cmp::Ordering::Equal => Tone::Neutral,
    }
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32, 0x1F300..=0x1FAFF | 0x2600..=0x27BF)
}

/// Extracts a price from free text such as an image caption.
///
/// Amounts marked with `$` or a currency word win; otherwise the last
/// plausible number (three or more digits, decimals, or a `k`/`mil` suffix)
/// is used. Numbers followed by a unit (`38 cm`, `2 unidades`) are ignored.
pub fn extract_price(text: &str) -> Option<f64> {
    let keyword = PRICE_KEYWORD.is_match(text);
    let mut fallback = None;

    for caps in AMOUNT.captures_iter(text) {
        let Some(number) = caps.get(2) else { continue };
        let suffix = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
        let trailing = caps
            .get(4)
            .map(|m| m.as_str().trim().to_lowercase())
            .unwrap_or_default();
        let has_symbol = caps.get(1).is_some();

        if UNIT_WORDS.contains(&trailing.as_str()) && !has_symbol {
            continue;
        }
        let Some(value) = parse_amount(&format!("{}{}", number.as_str(), suffix)) else {
            continue;
        };
        if value <= 0.0 {
            continue;
        }
        if has_symbol || CURRENCY_WORDS.contains(&trailing.as_str()) {
            return Some(value);
        }

        let digits = number.as_str().chars().filter(char::is_ascii_digit).count();
        let has_separator = number.as_str().contains(['.', ',']);
        if keyword || digits >= 3 || has_separator || !suffix.is_empty() {
            fallback = Some(value);
        }
    }
    fallback
}

/// Static greeting sent without a model call.
pub fn greeting_reply(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => {
            "¡Hola! Bienvenido. Soy el asistente de su tienda: puedo publicar productos a partir de fotos, buscarlos, modificarlos o darlos de baja. ¿En qué puedo ayudarle?"
        }
        Tone::Informal => {
            "¡Hola! 👋 Soy el asistente de tu tienda. Mandame fotos de un producto para publicarlo, o decime qué querés buscar o cambiar."
        }
        Tone::Neutral => {
            "¡Hola! Soy el asistente de tu tienda. Podés enviarme fotos de un producto para publicarlo, o pedirme que busque, modifique o elimine uno."
        }
    }
}

/// Picks the formal or informal wording of a fixed reply.
pub fn by_tone<'a>(tone: Tone, formal: &'a str, informal: &'a str) -> &'a str {
    if tone == Tone::Formal { formal } else { informal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn greetings_and_their_register() {
        assert_eq!(detect_greeting("Hola"), Some(Tone::Neutral));
        assert_eq!(detect_greeting("¡Buenos días!"), Some(Tone::Formal));
        assert_eq!(detect_greeting("buen dia, quiero cargar algo"), Some(Tone::Formal));
        assert_eq!(detect_greeting("holis"), Some(Tone::Informal));
        assert_eq!(detect_greeting("buenas"), Some(Tone::Informal));
        assert_eq!(detect_greeting("bueno, publicalo"), None);
        assert_eq!(detect_greeting("cambiá el precio"), None);
        assert_eq!(detect_greeting("hierro"), None);
    }

    #[test]
    fn pure_greeting_detection() {
        assert!(is_pure_greeting("hola"));
        assert!(is_pure_greeting("Hola, ¿qué tal?"));
        assert!(is_pure_greeting("buenas tardes!! cómo está"));
        assert!(!is_pure_greeting("hola, quiero buscar una cartera"));
        assert!(!is_pure_greeting("publicalo"));
    }

    #[test]
    fn captions_are_never_greetings() {
        let pre = pre_classify("hola", true);
        assert!(pre.greeting.is_none());
        assert!(!pre.pure_greeting);
    }

    #[test]
    fn register_detection() {
        assert_eq!(detect_register("¿Podría usted cambiar el precio, por favor?"), Tone::Formal);
        assert_eq!(detect_register("che, mandame la lista jajaja"), Tone::Informal);
        assert_eq!(detect_register("listo 👍"), Tone::Informal);
        assert_eq!(detect_register("cambiar precio a 1500"), Tone::Neutral);
    }

    #[test]
    fn neutral_message_keeps_previous_tone() {
        let mut session = ConversationSession::new("tienda", "549111", Utc::now());
        apply(&mut session, &pre_classify("¡Buenos días!", false));
        assert_eq!(session.user_tone, Tone::Formal);
        assert_eq!(session.greeting_tone, Some(Tone::Formal));
        assert!(session.has_greeted);

        apply(&mut session, &pre_classify("publicalo", false));
        assert_eq!(session.user_tone, Tone::Formal);
    }

    #[test]
    fn price_from_captions() {
        assert_eq!(extract_price("Cartera de cuero, 50000"), Some(50000.0));
        assert_eq!(extract_price("Zapatillas talle 38 a $ 12.500"), Some(12500.0));
        assert_eq!(extract_price("19,99"), Some(19.99));
        assert_eq!(extract_price("remera 15 mil"), Some(15000.0));
        assert_eq!(extract_price("mesa de 120 cm, 80000 pesos"), Some(80000.0));
        assert_eq!(extract_price("2 unidades"), None);
        assert_eq!(extract_price("precio 90"), Some(90.0));
        assert_eq!(extract_price("Cartera de cuero"), None);
    }
}
