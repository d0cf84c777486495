// MRZ text parsing for the ICAO 9303 layouts TD1, TD2 and TD3.
//
// OCR output goes in, raw fields plus a confidence score come out. The score
// is the share of structural checks (line lengths and check digits) that pass.

use crate::models::{Confidence, RawMrzFields, ScoredCandidate};
use std::ops::Range;

/// Lines shorter than this are never MRZ lines.
const MIN_LINE_LENGTH: usize = 28;

/// How far an OCR'd line may be off its layout width and still count.
const LENGTH_TOLERANCE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrzLayout {
    /// ID card, 3 lines of 30
    TD1,
    /// Official travel document, 2 lines of 36
    TD2,
    /// Passport, 2 lines of 44
    TD3,
}

impl MrzLayout {
    pub fn line_count(&self) -> usize {
        match self {
            MrzLayout::TD1 => 3,
            MrzLayout::TD2 | MrzLayout::TD3 => 2,
        }
    }

    pub fn line_width(&self) -> usize {
        match self {
            MrzLayout::TD1 => 30,
            MrzLayout::TD2 => 36,
            MrzLayout::TD3 => 44,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MrzLayout::TD1 => "TD1",
            MrzLayout::TD2 => "TD2",
            MrzLayout::TD3 => "TD3",
        }
    }

    /// The layout whose width is nearest to `length`. A tie goes to the wider one.
    fn for_length(length: usize) -> Option<MrzLayout> {
        [MrzLayout::TD3, MrzLayout::TD2, MrzLayout::TD1]
            .into_iter()
            .filter(|layout| length.abs_diff(layout.line_width()) <= LENGTH_TOLERANCE)
            .min_by_key(|layout| length.abs_diff(layout.line_width()))
    }
}

/// MRZ lines found in OCR text, already padded/truncated to the layout width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MrzLines {
    pub layout: MrzLayout,
    pub lines: Vec<String>,
    /// How many lines had exactly the layout width before padding.
    pub exact_lengths: usize,
}

/// Uppercase, drop spaces, and turn anything outside `[A-Z0-9<]` into a filler.
pub fn clean_line(line: &str) -> String {
    line.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .map(|c| if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '<' { c } else { '<' })
        .collect()
}

/// Pick the last block of consecutive lines that fits one layout.
///
/// The MRZ sits at the bottom of the page, so later blocks win.
pub fn find_mrz_lines(text: &str) -> Option<MrzLines> {
    let candidates: Vec<String> = text
        .lines()
        .map(clean_line)
        .filter(|line| line.len() >= MIN_LINE_LENGTH && line.contains('<'))
        .collect();

    let layouts: Vec<Option<MrzLayout>> = candidates.iter().map(|l| MrzLayout::for_length(l.len())).collect();

    let mut end = candidates.len();
    while end > 0 {
        if let Some(layout) = layouts[end - 1] {
            let count = layout.line_count();
            if end >= count && layouts[end - count..end].iter().all(|l| *l == Some(layout)) {
                let block = &candidates[end - count..end];
                let width = layout.line_width();
                return Some(MrzLines {
                    layout,
                    exact_lengths: block.iter().filter(|l| l.len() == width).count(),
                    lines: block.iter().map(|l| fit_width(l, width)).collect(),
                });
            }
        }
        end -= 1;
    }
    None
}

fn fit_width(line: &str, width: usize) -> String {
    let mut fitted: String = line.chars().take(width).collect();
    while fitted.len() < width {
        fitted.push('<');
    }
    fitted
}

/// ICAO 9303 check digit with the repeating 7-3-1 weights.
pub fn check_digit(field: &str) -> char {
    const WEIGHTS: [u32; 3] = [7, 3, 1];
    let total: u32 = field
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let value = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'A'..='Z' => c as u32 - 'A' as u32 + 10,
                _ => 0,
            };
            value * WEIGHTS[i % 3]
        })
        .sum();
    char::from_digit(total % 10, 10).unwrap_or('0')
}

/// Does `digit` verify `field`? An all-filler optional field may carry `<` too.
fn check_passes(field: &str, digit: char) -> bool {
    if digit == '<' {
        return field.chars().all(|c| c == '<');
    }
    check_digit(field) == digit
}

fn slice(line: &str, range: Range<usize>) -> &str {
    line.get(range).unwrap_or("")
}

fn char_at(line: &str, index: usize) -> char {
    line.as_bytes().get(index).map(|&b| b as char).unwrap_or('<')
}

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// Split the name area at the first `<<` into (surname, given names).
fn split_names(area: &str) -> (Option<String>, Option<String>) {
    match area.split_once("<<") {
        Some((surname, names)) => (some(surname), some(names)),
        None => (some(area), None),
    }
}

struct Checks {
    passed: usize,
    total: usize,
}

impl Checks {
    fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.passed += 1;
        }
    }
}

/// Extract raw fields from located lines and score them.
pub fn parse(mrz: &MrzLines) -> ScoredCandidate {
    let mut checks = Checks {
        passed: mrz.exact_lengths,
        total: mrz.layout.line_count(),
    };

    let fields = match mrz.layout {
        MrzLayout::TD3 | MrzLayout::TD2 => parse_two_line(mrz, &mut checks),
        MrzLayout::TD1 => parse_td1(mrz, &mut checks),
    };

    ScoredCandidate::new(
        fields,
        mrz.layout.name(),
        &mrz.lines.join("\n"),
        Confidence::from_ratio(checks.passed, checks.total),
    )
}

/// Locate and parse an MRZ in free OCR text.
pub fn read_mrz(text: &str) -> Option<ScoredCandidate> {
    find_mrz_lines(text).map(|lines| parse(&lines))
}

fn parse_two_line(mrz: &MrzLines, checks: &mut Checks) -> RawMrzFields {
    let width = mrz.layout.line_width();
    let (first, second) = (mrz.lines[0].as_str(), mrz.lines[1].as_str());
    let (surname, names) = split_names(slice(first, 5..width));

    let number = slice(second, 0..9);
    let birth = slice(second, 13..19);
    let expiry = slice(second, 21..27);
    checks.record(check_passes(number, char_at(second, 9)));
    checks.record(check_passes(birth, char_at(second, 19)));
    checks.record(check_passes(expiry, char_at(second, 27)));

    let composite_end = if mrz.layout == MrzLayout::TD3 {
        checks.record(check_passes(slice(second, 28..42), char_at(second, 42)));
        43
    } else {
        35
    };
    let composite = format!(
        "{}{}{}",
        slice(second, 0..10),
        slice(second, 13..20),
        slice(second, 21..composite_end)
    );
    checks.record(check_passes(&composite, char_at(second, composite_end)));

    RawMrzFields {
        document_type: some(slice(first, 0..2)),
        country: some(slice(first, 2..5)),
        number: some(number),
        surname,
        names,
        nationality: some(slice(second, 10..13)),
        date_of_birth: some(birth),
        expiration_date: some(expiry),
        sex: some(slice(second, 20..21)),
    }
}

fn parse_td1(mrz: &MrzLines, checks: &mut Checks) -> RawMrzFields {
    let (first, second, third) = (mrz.lines[0].as_str(), mrz.lines[1].as_str(), mrz.lines[2].as_str());
    let (surname, names) = split_names(third);

    let number = slice(first, 5..14);
    let birth = slice(second, 0..6);
    let expiry = slice(second, 8..14);
    checks.record(check_passes(number, char_at(first, 14)));
    checks.record(check_passes(birth, char_at(second, 6)));
    checks.record(check_passes(expiry, char_at(second, 14)));

    let composite = format!(
        "{}{}{}{}",
        slice(first, 5..30),
        slice(second, 0..7),
        slice(second, 8..15),
        slice(second, 18..29)
    );
    checks.record(check_passes(&composite, char_at(second, 29)));

    RawMrzFields {
        document_type: some(slice(first, 0..2)),
        country: some(slice(first, 2..5)),
        number: some(number),
        surname,
        names,
        nationality: some(slice(second, 15..18)),
        date_of_birth: some(birth),
        expiration_date: some(expiry),
        sex: some(slice(second, 7..8)),
    }
}
