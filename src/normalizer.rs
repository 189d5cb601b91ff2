// 🧹 Text Normalizer
// Canonical form of a free-text description before keyword matching

/// Accented letters kept by the normalizer (single-locale alphabet).
const ACCENTED: &str = "áàâãéèêíìîóòôõúùûç";

fn is_kept(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_whitespace() || ACCENTED.contains(c)
}

/// Normalize a description for matching.
///
/// Lower-cases, replaces every character outside `a-z`, the accented vowels,
/// `ç` and whitespace with a space, then collapses whitespace runs and trims.
///
/// ```
/// use transaction_classifier::normalize_description;
/// assert_eq!(normalize_description("  PIX*Padaria 123!! "), "pix padaria");
/// ```
pub fn normalize_description(raw: &str) -> String {
    let replaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if is_kept(c) { c } else { ' ' })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_symbols() {
        assert_eq!(
            normalize_description("Compra no MERCADO Central #4521"),
            "compra no mercado central"
        );
    }

    #[test]
    fn test_keeps_accented_letters() {
        assert_eq!(normalize_description("Cinema com a FAMÍLIA"), "cinema com a família");
        assert_eq!(normalize_description("Açougue São João"), "açougue são joão");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_description("uber\t\t  eats\n"), "uber eats");
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        assert_eq!(normalize_description(""), "");
        assert_eq!(normalize_description("123 - 456 / $$"), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_description("Pgto Fornecedor LTDA - NF 889");
        assert_eq!(normalize_description(&once), once);
    }
}
