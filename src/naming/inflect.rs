//! Minimal English inflection for plural table names.
//!
//! Only the regular rules are covered (`post`/`posts`, `category`/`categories`,
//! `address`/`addresses`); irregular nouns are left to custom styles.

fn ends_with_consonant_y(word: &str) -> bool {
    let mut chars = word.chars().rev();
    match (chars.next(), chars.next()) {
        (Some('y'), Some(before)) => !"aeiou".contains(before),
        _ => false,
    }
}

/// `category` → `categories`, `post` → `posts`
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if ends_with_consonant_y(word) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// `categories` → `category`, `posts` → `post`; singular words pass through.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Apply `f` to the last `_`-separated word: `post_category` → `post_categories`.
pub fn map_last_word(name: &str, f: impl Fn(&str) -> String) -> String {
    match name.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", f(last)),
        None => f(name),
    }
}
