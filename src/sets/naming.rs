//! Deterministic naming for sets produced by algebraic operations.

/// Operator symbol used in names generated by intersections.
pub(crate) const INTERSECTION: char = '∩';

/// Operator symbol used in names generated by unions.
pub(crate) const UNION: char = '∪';

/// Upper bound on the length, in characters, of a generated set name.
const MAX_NAME_CHARS: usize = 255;

/// Characters added around the two operand names: `('' X '')`.
const DECORATION_CHARS: usize = 9;

/// Length of the `…` marker that replaces a truncated prefix.
const ELLIPSIS_CHARS: usize = 1;

/// Composes the name of a set produced by combining `left` and `right`
/// with the given operator, e.g. `('staff' ∩ 'oncall')`.
///
/// If the composed name would exceed 255 characters, the left operand's
/// name is truncated from the front and prefixed with `…` so the total
/// is exactly 255. The left name is not re-quoted when it is already a
/// generated (quoted) name, so chained operations stay readable.
pub(crate) fn composed_name(left: &str, operator: char, right: &str) -> String {
    let left_chars = left.chars().count();
    let right_chars = right.chars().count();

    // Quotes are dropped around a left name that is already quoted or is
    // itself a generated name; the truncation budget must account for the
    // two characters that disappear with them.
    let quoted = !(left.starts_with('\'') || left.starts_with('('));
    let quote = if quoted { "'" } else { "" };
    let decoration = if quoted {
        DECORATION_CHARS
    } else {
        DECORATION_CHARS - 2
    };
    let available = MAX_NAME_CHARS - decoration;

    let overflow = (left_chars + right_chars).saturating_sub(available);
    let generated = if overflow > 0 {
        let keep = left_chars.saturating_sub(overflow + ELLIPSIS_CHARS);
        let tail: String = left.chars().skip(left_chars - keep).collect();
        format!("…{tail}")
    } else {
        left.to_string()
    };

    format!("({quote}{generated}{quote} {operator} '{right}')")
}
