//! Deterministic identifier transforms.
//!
//! Case conversion, English pluralization over a fixed rule table, and the
//! foreign-key-to-relation-name convention. Every function here is a pure
//! string transform; generation output depends on them being stable, so the
//! rule tables are explicit rather than delegated to a general inflector.

/// Irregular singular/plural pairs, checked before the suffix rules.
const IRREGULARS: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("mouse", "mice"),
    ("datum", "data"),
    ("knife", "knives"),
    ("life", "lives"),
    ("wife", "wives"),
];

/// Words with identical singular and plural forms.
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "money",
    "news",
    "series",
    "species",
    "sheep",
    "fish",
    "deer",
    "metadata",
];

/// Convert to snake_case. Consecutive upper-case runs collapse into one word
/// ("HTTPRequest" becomes "http_request").
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch == '-' || ch == ' ' || ch == '_' {
            if !result.ends_with('_') && !result.is_empty() {
                result.push('_');
            }
        } else if ch.is_ascii_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let next_lower = chars.get(i + 1).map(|c| c.is_ascii_lowercase()).unwrap_or(false);
            let prev_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
            if (prev_lower || (prev_upper && next_lower)) && !result.ends_with('_') && !result.is_empty() {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Convert to StudlyCase (upper camel).
pub fn to_studly_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;

    for ch in s.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// Convert to camelCase (lower camel).
pub fn to_camel_case(s: &str) -> String {
    let studly = to_studly_case(s);
    let mut chars = studly.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn ends_with_any(word: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| word.ends_with(s))
}

/// Pluralize an English word.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULARS {
        if lower == *singular {
            return (*plural).to_string();
        }
        if lower == *plural {
            return word.to_string();
        }
    }

    if ends_with_any(&lower, &["s", "x", "z", "ch", "sh"]) {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before = stem.chars().last();
        if before.map(|c| !"aeiou".contains(c.to_ascii_lowercase())).unwrap_or(false) {
            return format!("{}ies", stem);
        }
    }
    if let Some(stem) = word.strip_suffix("fe") {
        return format!("{}ves", stem);
    }
    if let Some(stem) = word.strip_suffix('f') {
        return format!("{}ves", stem);
    }
    format!("{}s", word)
}

/// Singularize an English word.
pub fn singularize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULARS {
        if lower == *plural {
            return (*singular).to_string();
        }
        if lower == *singular {
            return word.to_string();
        }
    }

    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if let Some(stem) = word.strip_suffix("ves") {
        return format!("{}f", stem);
    }
    if ends_with_any(&lower, &["ses", "xes", "zes", "ches", "shes"]) {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("ss") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }
    word.to_string()
}

/// Split a snake name, transform its final segment, and rejoin.
fn map_last_segment(name: &str, f: impl Fn(&str) -> String) -> String {
    match name.rfind('_') {
        Some(pos) => format!("{}_{}", &name[..pos], f(&name[pos + 1..])),
        None => f(name),
    }
}

/// Table name to model (class) name: studly-case the singular of the final
/// snake segment ("user_profiles" becomes "UserProfile").
pub fn table_to_model(table: &str) -> String {
    to_studly_case(&map_last_segment(&to_snake_case(table), singularize))
}

/// Model (class) name back to table name: snake-case, then pluralize the
/// final segment ("UserProfile" becomes "user_profiles").
pub fn model_to_table(model: &str) -> String {
    map_last_segment(&to_snake_case(model), pluralize)
}

/// Relation method name for a foreign-key column: strip a trailing `_id`,
/// `_uuid` or `_key`, then camel-case ("author_id" becomes "author").
pub fn fk_to_relation(column: &str) -> String {
    let stripped = column
        .strip_suffix("_id")
        .or_else(|| column.strip_suffix("_uuid"))
        .or_else(|| column.strip_suffix("_key"))
        .unwrap_or(column);
    to_camel_case(stripped)
}

/// Plural relation method name for a table ("blog_posts" becomes "blogPosts").
pub fn plural_relation(table: &str) -> String {
    to_camel_case(&map_last_segment(&to_snake_case(table), pluralize))
}

/// Singular relation method name for a table ("user_profiles" becomes
/// "userProfile").
pub fn singular_relation(table: &str) -> String {
    to_camel_case(&map_last_segment(&to_snake_case(table), singularize))
}
