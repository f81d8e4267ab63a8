/// Appends or increments a numeric suffix, used to free up a generated
/// name that is already taken.
pub fn bump_suffix_number(phrase: &str) -> String {
    let chars = phrase.chars();
    let mut result: Vec<u32> = vec![];

    for c in chars.rev() {
        if c.is_numeric() {
            result.push(c.to_digit(10).unwrap());
            continue;
        } else {
            break;
        }
    }

    if result.is_empty() {
        let new_phrase = phrase.to_string();
        new_phrase + "2"
    } else {
        let new_phrase = phrase[..phrase.len() - result.len()].to_string();
        let sum = result.iter().rev().fold(0, |acc, elem| acc * 10 + elem) + 1;
        new_phrase + &sum.to_string()
    }
}

/// Base file name with the extension stripped and separators normalized,
/// suitable as a template variable.
pub fn sanitize_source(path: &str) -> String {
    let base = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path);

    let base = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };

    base.replace(['-', ' ', '.'], "_")
}
