const FLOOR_WORDS: &[&str] = &["flr", "fl", "floor"];
const UNIT_WORDS: &[&str] = &["suite", "ste", "unit", "apt"];

fn bare(word: &str) -> String {
    word.trim_end_matches('.').to_ascii_lowercase()
}

fn is_floor_word(word: &str) -> bool {
    FLOOR_WORDS.contains(&bare(word).as_str())
}

fn is_unit_word(word: &str) -> bool {
    let bare = bare(word);
    UNIT_WORDS.contains(&bare.as_str()) || FLOOR_WORDS.contains(&bare.as_str())
}

fn is_number(word: &str) -> bool {
    let word = word.trim_end_matches('.');
    !word.is_empty() && word.chars().all(|ch| ch.is_ascii_digit())
}

fn is_ordinal(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    let digits = lower.chars().take_while(|ch| ch.is_ascii_digit()).count();
    digits > 0 && matches!(&lower[digits..], "st" | "nd" | "rd" | "th")
}

fn is_hash_marker(word: &str) -> bool {
    word.strip_prefix('#')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
}

fn is_dash(word: &str) -> bool {
    word == "-" || word == "–"
}

fn strip_unit_tokens<'a>(words: &[&'a str]) -> Vec<&'a str> {
    let mut kept = Vec::with_capacity(words.len());
    let mut index = 0;
    while index < words.len() {
        let word = words[index];
        if is_hash_marker(word) {
            index += 1;
            continue;
        }

        let start = if is_dash(word) { index + 1 } else { index };
        if let Some(head) = words.get(start) {
            let next = words.get(start + 1).copied();

            if (is_number(head) || is_ordinal(head)) && next.is_some_and(is_floor_word) {
                let mut resume = start + 2;
                if words.get(resume).is_some_and(|w| is_number(w)) {
                    resume += 1;
                }
                index = resume;
                continue;
            }

            if is_unit_word(head) && next.is_some_and(|w| is_number(w) || is_hash_marker(w)) {
                index = start + 2;
                continue;
            }
        }

        kept.push(word);
        index += 1;
    }
    kept
}

pub fn normalize_address(address: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for raw_segment in address.split(',') {
        let words: Vec<&str> = raw_segment.split_whitespace().collect();
        let mut current: Vec<String> = Vec::new();
        for word in strip_unit_tokens(&words) {
            match word.to_ascii_uppercase().as_str() {
                "ON" => current.push("Ontario".to_string()),
                "CA" => {
                    if !current.is_empty() {
                        segments.push(current.join(" "));
                        current.clear();
                    }
                    current.push("Canada".to_string());
                }
                _ => current.push(word.to_string()),
            }
        }
        if !current.is_empty() {
            segments.push(current.join(" "));
        }
    }
    segments.join(", ")
}

pub fn postal_code(address: &str) -> Option<String> {
    let chars: Vec<char> = address.chars().map(|ch| ch.to_ascii_uppercase()).collect();
    for start in 0..chars.len() {
        let window = &chars[start..];
        if window.len() < 6 {
            break;
        }
        let (a, b, c) = (window[0], window[1], window[2]);
        if !(a.is_ascii_alphabetic() && b.is_ascii_digit() && c.is_ascii_alphabetic()) {
            continue;
        }
        let rest = if window[3] == ' ' {
            &window[4..]
        } else {
            &window[3..]
        };
        if rest.len() >= 3
            && rest[0].is_ascii_digit()
            && rest[1].is_ascii_alphabetic()
            && rest[2].is_ascii_digit()
        {
            return Some(format!("{a}{b}{c} {}{}{}", rest[0], rest[1], rest[2]));
        }
    }
    None
}

pub fn street_part(address: &str) -> String {
    let first = address.split(',').next().unwrap_or_default();
    let words: Vec<&str> = first.split_whitespace().collect();
    strip_unit_tokens(&words).join(" ")
}

pub fn geocode_queries(address: &str) -> Vec<String> {
    let mut queries = Vec::new();

    if let Some(postal) = postal_code(address) {
        queries.push(format!("{postal}, Ontario, Canada"));
        queries.push(format!("{postal}, Canada"));
    }

    let cleaned = normalize_address(address);
    if !cleaned.is_empty() {
        queries.push(cleaned);
    }

    let street = street_part(address);
    if !street.is_empty() {
        queries.push(format!("{street}, Ontario, Canada"));
    }

    queries
}
