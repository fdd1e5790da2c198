use crate::models::render_preset::Viewset;

// Characters DeltaGen or the file system choke on, with their replacement.
// No replacement contains a character from the left column, so substituting is idempotent.
const CHAR_MAP: &[(char, &str)] = &[
    ('ä', "ae"),
    ('ö', "oe"),
    ('ü', "ue"),
    ('Ä', "Ae"),
    ('Ö', "Oe"),
    ('Ü', "Ue"),
    ('ß', "ss"),
    ('á', "a"),
    ('à', "a"),
    ('â', "a"),
    ('é', "e"),
    ('è', "e"),
    ('ê', "e"),
    ('í', "i"),
    ('ì', "i"),
    ('î', "i"),
    ('ó', "o"),
    ('ò', "o"),
    ('ô', "o"),
    ('ú', "u"),
    ('ù', "u"),
    ('û', "u"),
    ('ë', "e"),
    ('ï', "i"),
    ('ÿ', "y"),
    ('ç', "c"),
    ('ñ', "n"),
    ('ã', "a"),
    ('õ', "o"),
    ('å', "a"),
    ('æ', "ae"),
    ('ø', "o"),
    ('Á', "A"),
    ('À', "A"),
    ('Â', "A"),
    ('Ã', "A"),
    ('Å', "A"),
    ('Æ', "Ae"),
    ('É', "E"),
    ('È', "E"),
    ('Ê', "E"),
    ('Ë', "E"),
    ('Í', "I"),
    ('Ì', "I"),
    ('Î', "I"),
    ('Ï', "I"),
    ('Ó', "O"),
    ('Ò', "O"),
    ('Ô', "O"),
    ('Õ', "O"),
    ('Ø', "O"),
    ('Ú', "U"),
    ('Ù', "U"),
    ('Û', "U"),
    ('Ç', "C"),
    ('Ñ', "N"),
    ('@', "at"),
    ('®', ""),
    ('~', "-"),
    ('+', "plus"),
    ('€', "EUR"),
    ('°', "deg"),
    ('^', "_"),
    (' ', "_"),
    ('/', "_"),
    ('\\', "_"),
    (':', "_"),
    ('*', "_"),
    ('?', "_"),
    ('"', "_"),
    ('<', "_"),
    ('>', "_"),
    ('|', "_"),
];

/// Replace characters that are not allowed in file names.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match CHAR_MAP.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None if c.is_control() => out.push('_'),
            None => out.push(c),
        }
    }
    out
}

/// `{counter:03}_{preset}{_viewset}{extension}` with every part sanitized.
/// The counter runs across the whole render plan.
pub fn image_file_name(counter: usize, preset_name: &str, viewset: &Viewset, extension: &str) -> String {
    format!(
        "{counter:03}_{}{}{}",
        sanitize(preset_name),
        sanitize(&viewset.suffix()),
        sanitize(extension)
    )
}
