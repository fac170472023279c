//! Phonetic codes for vendor-name matching.
//!
//! Two complementary encoders: Soundex (coarse, letter-class based) and a
//! compact Metaphone (finer consonant rules). A token and a vendor name
//! that share either code are treated as likely the same spoken name.

/// American Soundex: first letter plus three digits.
pub fn soundex(word: &str) -> String {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let Some(&first) = letters.first() else {
        return String::new();
    };

    fn digit(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut code = String::new();
    code.push(first);

    let mut previous = digit(first);
    for &c in &letters[1..] {
        match c {
            // H and W do not reset the previous code
            'H' | 'W' => continue,
            _ => {}
        }
        let d = digit(c);
        if let Some(d) = d {
            if previous != Some(d) {
                code.push(d);
                if code.len() == 4 {
                    break;
                }
            }
        }
        previous = d;
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}

/// Compact Metaphone: consonant-class code, vowels kept only at the start.
pub fn metaphone(word: &str) -> String {
    let w: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if w.is_empty() {
        return String::new();
    }

    let is_vowel = |c: char| matches!(c, 'A' | 'E' | 'I' | 'O' | 'U');
    let at = |i: usize| w.get(i).copied().unwrap_or('\0');

    // initial-cluster exceptions
    let mut i = 0;
    match (at(0), at(1)) {
        ('A', 'E') | ('G', 'N') | ('K', 'N') | ('P', 'N') | ('W', 'R') => i = 1,
        ('W', 'H') => i = 1,
        ('X', _) => {
            return format!("S{}", metaphone_tail(&w, 1, is_vowel));
        }
        _ => {}
    }

    let mut code = String::new();
    if is_vowel(at(i)) {
        code.push(at(i));
        i += 1;
    }
    code.push_str(&metaphone_tail(&w, i, is_vowel));
    code
}

fn metaphone_tail(w: &[char], start: usize, is_vowel: impl Fn(char) -> bool) -> String {
    let at = |i: usize| w.get(i).copied().unwrap_or('\0');
    let mut code = String::new();
    let mut i = start;

    while i < w.len() {
        let c = at(i);
        let next = at(i + 1);
        let prev = if i > 0 { at(i - 1) } else { '\0' };

        // skip doubled letters except C
        if c == prev && c != 'C' {
            i += 1;
            continue;
        }

        match c {
            'A' | 'E' | 'I' | 'O' | 'U' => {}
            'B' => {
                // silent terminal B after M, as in "lamb"
                if !(prev == 'M' && i + 1 == w.len()) {
                    code.push('B');
                }
            }
            'C' => {
                if next == 'H' {
                    code.push('X');
                    i += 1;
                } else if matches!(next, 'I' | 'E' | 'Y') {
                    code.push('S');
                } else {
                    code.push('K');
                }
            }
            'D' => {
                if next == 'G' && matches!(at(i + 2), 'E' | 'I' | 'Y') {
                    code.push('J');
                    i += 1;
                } else {
                    code.push('T');
                }
            }
            'G' => {
                if next == 'H' && !is_vowel(at(i + 2)) {
                    // silent GH
                    i += 1;
                } else if matches!(next, 'I' | 'E' | 'Y') {
                    code.push('J');
                } else {
                    code.push('K');
                }
            }
            'H' => {
                if is_vowel(prev) && is_vowel(next) {
                    code.push('H');
                }
            }
            'K' => {
                if prev != 'C' {
                    code.push('K');
                }
            }
            'P' => {
                if next == 'H' {
                    code.push('F');
                    i += 1;
                } else {
                    code.push('P');
                }
            }
            'Q' => code.push('K'),
            'S' => {
                if next == 'H' {
                    code.push('X');
                    i += 1;
                } else {
                    code.push('S');
                }
            }
            'T' => {
                if next == 'H' {
                    code.push('0');
                    i += 1;
                } else if next == 'I' && matches!(at(i + 2), 'A' | 'O') {
                    code.push('X');
                } else {
                    code.push('T');
                }
            }
            'V' => code.push('F'),
            'W' | 'Y' => {
                if is_vowel(next) {
                    code.push(c);
                }
            }
            'X' => code.push_str("KS"),
            'Z' => code.push('S'),
            'F' | 'J' | 'L' | 'M' | 'N' | 'R' => code.push(c),
            _ => {}
        }
        i += 1;
    }

    code
}
