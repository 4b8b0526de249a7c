/// Parsed form of the document store's `"<label>|<hexcode>"` color field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorEncoding {
    /// Field missing, empty or the literal `"null"`.
    Absent,
    Parsed {
        label: String,
        hexcode: Option<String>,
    },
    /// Something was there but no usable label could be extracted.
    Malformed(String),
}

impl ColorEncoding {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return ColorEncoding::Absent;
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
            return ColorEncoding::Absent;
        }

        let (label, hex) = match raw.split_once('|') {
            Some((label, hex)) => (label.trim(), Some(hex.trim())),
            None => (raw, None),
        };
        if label.is_empty() || label.eq_ignore_ascii_case("null") {
            return ColorEncoding::Malformed(raw.to_string());
        }

        ColorEncoding::Parsed {
            label: label.to_string(),
            hexcode: hex.and_then(normalize_hex),
        }
    }

    /// The color value to store, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ColorEncoding::Parsed { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn hexcode(&self) -> Option<&str> {
        match self {
            ColorEncoding::Parsed { hexcode, .. } => hexcode.as_deref(),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ColorEncoding::Parsed { .. })
    }
}

fn normalize_hex(raw: &str) -> Option<String> {
    let digits = raw.strip_prefix('#').unwrap_or(raw);
    let ok = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    ok.then(|| format!("#{}", digits.to_ascii_lowercase()))
}

// Most specific phrase first: "azul marinho" must win over "azul".
const COLOR_KEYWORDS: &[(&str, &str)] = &[
    ("rosé", "Rosé"),
    ("rose", "Rosé"),
    ("rosa", "Rosa"),
    ("azul marinho", "Azul Marinho"),
    ("azul escuro", "Azul Escuro"),
    ("azul bebê", "Azul Bebê"),
    ("azul bebe", "Azul Bebê"),
    ("azul claro", "Azul Claro"),
    ("azul", "Azul"),
    ("verde escuro", "Verde Escuro"),
    ("verde claro", "Verde Claro"),
    ("verde", "Verde"),
    ("cappuccino", "Marrom"),
    ("chocolate", "Marrom"),
    ("marrom", "Marrom"),
    ("bege", "Bege"),
    ("caramelo", "Caramelo"),
    ("branca", "Branco"),
    ("branco", "Branco"),
    ("preta", "Preto"),
    ("preto", "Preto"),
    ("cinza", "Cinza"),
    ("amarela", "Amarelo"),
    ("amarelo", "Amarelo"),
    ("vermelha", "Vermelho"),
    ("vermelho", "Vermelho"),
    ("roxa", "Roxo"),
    ("roxo", "Roxo"),
    ("violeta", "Violeta"),
    ("laranja", "Laranja"),
];

/// Guesses a color from a product name, for canonical products whose source
/// record carries no color field. A keyword must start a word but may carry
/// an inflected ending ("Brancas", "Rosado").
pub fn detect_color_from_name(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    COLOR_KEYWORDS
        .iter()
        .find(|(keyword, _)| starts_word(&lowered, keyword))
        .map(|(_, color)| *color)
}

fn starts_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        !haystack[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_and_hex_are_split_on_first_pipe() {
        let parsed = ColorEncoding::parse(Some("Rosa|#DF8AA7"));
        assert_eq!(parsed.label(), Some("Rosa"));
        assert_eq!(parsed.hexcode(), Some("#df8aa7"));
        assert!(parsed.is_valid());
    }

    #[test]
    fn null_and_missing_yield_no_color() {
        assert_eq!(ColorEncoding::parse(Some("null")), ColorEncoding::Absent);
        assert_eq!(ColorEncoding::parse(Some("   ")), ColorEncoding::Absent);
        assert_eq!(ColorEncoding::parse(None), ColorEncoding::Absent);
        assert_eq!(ColorEncoding::parse(None).label(), None);
    }

    #[test]
    fn malformed_input_degrades_to_no_color() {
        let parsed = ColorEncoding::parse(Some("|#ffffff"));
        assert!(matches!(parsed, ColorEncoding::Malformed(_)));
        assert_eq!(parsed.label(), None);
    }

    #[test]
    fn label_without_hex_is_still_a_color() {
        let parsed = ColorEncoding::parse(Some(" Azul Marinho "));
        assert_eq!(parsed.label(), Some("Azul Marinho"));
        assert_eq!(parsed.hexcode(), None);

        let bad_hex = ColorEncoding::parse(Some("Verde|green"));
        assert_eq!(bad_hex.label(), Some("Verde"));
        assert_eq!(bad_hex.hexcode(), None);
    }

    #[test]
    fn name_detection_prefers_specific_phrases() {
        assert_eq!(
            detect_color_from_name("Manta Bebê Azul Marinho 80x80"),
            Some("Azul Marinho")
        );
        assert_eq!(detect_color_from_name("Kit Berço Azul"), Some("Azul"));
        assert_eq!(detect_color_from_name("Toalha Rosé"), Some("Rosé"));
    }

    #[test]
    fn name_detection_accepts_inflected_endings() {
        assert_eq!(detect_color_from_name("Toalhas Brancas"), Some("Branco"));
        assert_eq!(detect_color_from_name("Meias Pretas"), Some("Preto"));
        assert_eq!(detect_color_from_name("Mosquiteiro Rosado"), Some("Rosa"));
        assert_eq!(detect_color_from_name("Body Amarelos"), Some("Amarelo"));
    }

    #[test]
    fn keyword_inside_a_word_is_not_a_color() {
        assert_eq!(detect_color_from_name("Livro Prosa Infantil"), None);
        assert_eq!(detect_color_from_name("Carrinho Travel System"), None);
    }
}
