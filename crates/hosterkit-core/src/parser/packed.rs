//! Dean Edwards packer unpacker
//!
//! Hosters hide their player setup inside
//! `eval(function(p,a,c,k,e,d){...}('payload',radix,count,'w1|w2|...'.split('|'),0,{}))`.
//! The decoder function never needs to run: the payload is plain JavaScript
//! in which every identifier was replaced by its index in the dictionary,
//! written in base `radix`.

use regex::Regex;

/// Maximum text scanned after a signature for one packed block
const WINDOW_BYTES: usize = 64 * 1024;

/// Largest radix the packer alphabet (`0-9a-zA-Z`) can express
const MAX_RADIX: u32 = 62;

const SIGNATURE_PATTERN: &str =
    r"eval\s*\(\s*function\s*\(\s*p\s*,\s*a\s*,\s*c\s*,\s*k\s*,\s*e\s*,\s*[dr]\s*\)";

const ARGUMENTS_PATTERN: &str = concat!(
    r#"(?s)^\}\s*\(\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
    r"\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*",
    r#"(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
    r#"\s*\.split\(\s*['"]\|['"]\s*\)"#,
);

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Unpacks the first packed block found in `text`
///
/// # Returns
/// The decoded JavaScript, or `None` if no packer signature is present or
/// its arguments cannot be extracted.
pub fn unpack_packed_js(text: &str) -> Option<String> {
    let signature = Regex::new(SIGNATURE_PATTERN).ok()?;
    let start = signature.find(text)?.start();
    unpack_block_at(text, start)
}

/// Unpacks every packed block in `text`, in document order
///
/// Blocks whose arguments cannot be extracted are skipped.
pub fn unpack_all_packed_js(text: &str) -> Vec<String> {
    let Ok(signature) = Regex::new(SIGNATURE_PATTERN) else {
        return Vec::new();
    };

    signature
        .find_iter(text)
        .filter_map(|m| unpack_block_at(text, m.start()))
        .collect()
}

/// Whether `text` contains a packer signature
pub fn contains_packed_js(text: &str) -> bool {
    Regex::new(SIGNATURE_PATTERN)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct PackedArgs {
    payload: String,
    radix: u32,
    count: usize,
    dictionary: Vec<String>,
}

fn unpack_block_at(text: &str, start: usize) -> Option<String> {
    let window = bounded_window(text, start);
    let body_end = function_body_end(window)?;
    let args = extract_arguments(&window[body_end..])?;
    decode(&args)
}

/// Byte offset of the `}` closing the first `{...}` body in `window`
///
/// Braces inside quoted strings are ignored. The argument list must follow
/// this brace directly, so a malformed block never borrows the arguments of
/// a later one.
fn function_body_end(window: &str) -> Option<usize> {
    let open = window.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (offset, &b) in window.as_bytes()[open..].iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Slice of at most `WINDOW_BYTES` starting at `start`, cut on a char boundary
fn bounded_window(text: &str, start: usize) -> &str {
    let mut end = (start + WINDOW_BYTES).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}

fn extract_arguments(window: &str) -> Option<PackedArgs> {
    let re = Regex::new(ARGUMENTS_PATTERN).ok()?;
    let caps = re.captures(window)?;

    let payload = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let radix = caps.get(3)?.as_str().parse::<u32>().ok()?;
    let count = caps.get(4)?.as_str().parse::<usize>().ok()?;
    let dictionary = caps.get(5).or_else(|| caps.get(6))?.as_str();

    Some(PackedArgs {
        payload: unescape_js_string(payload),
        radix,
        count,
        dictionary: unescape_js_string(dictionary)
            .split('|')
            .map(str::to_string)
            .collect(),
    })
}

fn decode(args: &PackedArgs) -> Option<String> {
    if !(2..=MAX_RADIX).contains(&args.radix) {
        return None;
    }

    // Indices past the dictionary have no word, so a forged count is capped
    let count = args.count.min(args.dictionary.len());
    let mut output = args.payload.clone();
    for index in (0..count).rev() {
        // Empty entries mean the token already is the original word
        let Some(word) = args.dictionary.get(index).filter(|w| !w.is_empty()) else {
            continue;
        };
        let token = encode_token(index, args.radix);
        if output.contains(&token) {
            output = replace_whole_word(&output, &token, word);
        }
    }

    Some(output)
}

/// Encodes `value` the way the packer names tokens
///
/// Digits above 35 use `A-Z` (radix 62), matching the packer's
/// `String.fromCharCode(c + 29)` branch.
pub(crate) fn encode_token(value: usize, radix: u32) -> String {
    let radix = radix as usize;
    let mut digits = Vec::new();
    let mut rest = value;
    loop {
        digits.push(packer_digit((rest % radix) as u32));
        rest /= radix;
        if rest == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

fn packer_digit(digit: u32) -> char {
    if digit < 36 {
        char::from_digit(digit, 36).unwrap_or('0')
    } else {
        char::from(b'A' + (digit - 36) as u8)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Replaces every maximal `[A-Za-z0-9_]` run equal to `token` with `word`
///
/// Equivalent to the JavaScript `\btoken\b` replacement used by the packer.
fn replace_whole_word(text: &str, token: &str, word: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !is_word_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let run_start = i;
        while i < bytes.len() && is_word_byte(bytes[i]) {
            i += 1;
        }
        if &text[run_start..i] == token {
            out.push_str(&text[copied..run_start]);
            out.push_str(word);
            copied = i;
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Resolves `\'`, `\"` and `\\`; other escapes stay as written
fn unescape_js_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\'' | '"' | '\\')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
