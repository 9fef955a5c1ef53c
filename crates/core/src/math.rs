//! Plain-text rendering of LaTeX-style math notation.
//!
//! Flattens `\frac{..}{..}` (nested to any depth) into `a/b` form with
//! parentheses where precedence would otherwise be lost, then replaces
//! known commands with their Unicode symbols and drops leftover braces.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Matches a command: a backslash followed by the longest run of ASCII letters.
static COMMAND_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

/// Matches grouping braces, escaped or not.
static BRACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\?[{}]").unwrap());

/// Commands that introduce a fraction with two brace groups.
const FRACTION_MARKERS: &[&str] = &["dfrac", "tfrac", "frac"];

/// Characters that make an operand need parentheses.
const BINARY_OPERATORS: &[char] = &['+', '-', '−', '×', '/', '÷', '·'];

/// Operator commands that are still unsubstituted while fractions are flattened.
const OPERATOR_COMMANDS: &[&str] = &[r"\times", r"\div", r"\cdot", r"\pm", r"\mp"];

/// Command name → replacement. Lookup is by whole command name, so the
/// order of entries never matters.
const SYMBOL_TABLE: &[(&str, &str)] = &[
    // Operators
    ("times", "×"),
    ("div", "÷"),
    ("cdot", "·"),
    ("pm", "±"),
    ("mp", "∓"),
    ("ast", "∗"),
    // Relations
    ("le", "≤"),
    ("leq", "≤"),
    ("ge", "≥"),
    ("geq", "≥"),
    ("ne", "≠"),
    ("neq", "≠"),
    ("approx", "≈"),
    ("equiv", "≡"),
    ("sim", "∼"),
    ("propto", "∝"),
    ("lt", "<"),
    ("gt", ">"),
    // Sets and logic
    ("in", "∈"),
    ("notin", "∉"),
    ("subset", "⊂"),
    ("subseteq", "⊆"),
    ("cup", "∪"),
    ("cap", "∩"),
    ("emptyset", "∅"),
    ("varnothing", "∅"),
    ("forall", "∀"),
    ("exists", "∃"),
    // Arrows
    ("to", "→"),
    ("rightarrow", "→"),
    ("leftarrow", "←"),
    ("Rightarrow", "⇒"),
    ("implies", "⇒"),
    ("Leftrightarrow", "⇔"),
    ("iff", "⇔"),
    // Aggregation and calculus
    ("sum", "∑"),
    ("prod", "∏"),
    ("int", "∫"),
    ("infty", "∞"),
    ("partial", "∂"),
    ("nabla", "∇"),
    ("sqrt", "√"),
    // Geometry and misc
    ("degree", "°"),
    ("circ", "°"),
    ("angle", "∠"),
    ("perp", "⊥"),
    ("parallel", "∥"),
    ("triangle", "△"),
    ("ldots", "…"),
    ("dots", "…"),
    ("cdots", "⋯"),
    // Greek, lowercase
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("epsilon", "ε"),
    ("varepsilon", "ε"),
    ("zeta", "ζ"),
    ("eta", "η"),
    ("theta", "θ"),
    ("iota", "ι"),
    ("kappa", "κ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("nu", "ν"),
    ("xi", "ξ"),
    ("pi", "π"),
    ("rho", "ρ"),
    ("sigma", "σ"),
    ("tau", "τ"),
    ("upsilon", "υ"),
    ("phi", "φ"),
    ("varphi", "φ"),
    ("chi", "χ"),
    ("psi", "ψ"),
    ("omega", "ω"),
    // Greek, uppercase
    ("Gamma", "Γ"),
    ("Delta", "Δ"),
    ("Theta", "Θ"),
    ("Lambda", "Λ"),
    ("Xi", "Ξ"),
    ("Pi", "Π"),
    ("Sigma", "Σ"),
    ("Phi", "Φ"),
    ("Psi", "Ψ"),
    ("Omega", "Ω"),
    // Named functions lose their backslash
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
    ("cot", "cot"),
    ("log", "log"),
    ("ln", "ln"),
    ("lim", "lim"),
    ("max", "max"),
    ("min", "min"),
    // Presentation-only commands vanish
    ("left", ""),
    ("right", ""),
    ("displaystyle", ""),
    ("text", ""),
    ("mathrm", ""),
];

/// Look up a command name in the symbol table.
fn symbol_for(command: &str) -> Option<&'static str> {
    SYMBOL_TABLE
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, symbol)| *symbol)
}

/// Whether `name` (without backslash) is a command this formatter understands.
pub fn is_known_command(name: &str) -> bool {
    FRACTION_MARKERS.contains(&name) || symbol_for(name).is_some()
}

/// Find the next fraction marker in `text`.
///
/// Returns the byte offset of the backslash and the marker length. A marker
/// immediately followed by another letter (e.g. `\fraction`) is not a marker.
fn find_fraction_marker(text: &str) -> Option<(usize, usize)> {
    for (pos, _) in text.match_indices('\\') {
        let after = &text[pos + 1..];
        for marker in FRACTION_MARKERS {
            if let Some(rest) = after.strip_prefix(marker) {
                if !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    return Some((pos, marker.len() + 1));
                }
            }
        }
    }
    None
}

/// Take one balanced `{...}` group from the start of `text` (after optional
/// whitespace). Returns the group contents and the remainder.
fn take_group(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_start();
    let body = trimmed.strip_prefix('{')?;

    let mut depth = 1usize;
    let mut escaped = false;
    for (idx, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&body[..idx], &body[idx + 1..]));
                }
            }
            _ => {}
        }
    }

    None
}

/// Whether a formatted operand must be wrapped in parentheses.
fn needs_parentheses(operand: &str, outermost: bool) -> bool {
    operand.contains(BINARY_OPERATORS)
        || OPERATOR_COMMANDS.iter().any(|cmd| operand.contains(cmd))
        || (outermost && operand.contains(' '))
}

fn wrap_operand(operand: &str, outermost: bool) -> String {
    if needs_parentheses(operand, outermost) {
        format!("({})", operand)
    } else {
        operand.to_string()
    }
}

/// Formatter turning LaTeX-subset markup into readable plain-text math.
///
/// `format` is total: malformed markup is left as written rather than
/// rejected, and formatting already formatted text changes nothing.
#[derive(Debug, Clone, Default)]
pub struct MathNotationFormatter;

impl MathNotationFormatter {
    /// Create a new formatter.
    pub fn new() -> Self {
        Self
    }

    /// Format one piece of text.
    pub fn format(&self, input: &str) -> String {
        let composed: String = input.nfc().collect();
        let flattened = self.flatten_fractions(&composed, 0);
        self.substitute_symbols(&flattened)
    }

    /// Flatten every well-formed fraction, repeating until a pass changes nothing.
    fn flatten_fractions(&self, text: &str, depth: usize) -> String {
        let mut current = text.to_string();
        loop {
            let (next, changed) = self.flatten_pass(&current, depth);
            current = next;
            if !changed {
                return current;
            }
        }
    }

    fn flatten_pass(&self, text: &str, depth: usize) -> (String, bool) {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;
        let mut changed = false;

        while let Some((pos, marker_len)) = find_fraction_marker(rest) {
            let after_marker = &rest[pos + marker_len..];
            let groups = take_group(after_marker)
                .and_then(|(num, tail)| take_group(tail).map(|(den, tail)| (num, den, tail)));

            match groups {
                Some((numerator, denominator, tail)) => {
                    output.push_str(&rest[..pos]);
                    output.push_str(&self.render_fraction(numerator, denominator, depth));
                    rest = tail;
                    changed = true;
                }
                None => {
                    // Not a complete fraction; keep the marker and move on.
                    output.push_str(&rest[..pos + marker_len]);
                    rest = after_marker;
                }
            }
        }

        output.push_str(rest);
        (output, changed)
    }

    fn render_fraction(&self, numerator: &str, denominator: &str, depth: usize) -> String {
        let outermost = depth == 0;
        let num = self.flatten_fractions(numerator, depth + 1);
        let den = self.flatten_fractions(denominator, depth + 1);

        format!(
            "{}/{}",
            wrap_operand(num.trim(), outermost),
            wrap_operand(den.trim(), outermost)
        )
    }

    /// Replace table commands and strip braces until nothing changes.
    ///
    /// Stripping a brace can join a backslash with letters into a new
    /// command, so a single pass is not enough for idempotence.
    fn substitute_symbols(&self, text: &str) -> String {
        let mut current = text.to_string();
        loop {
            let substituted = COMMAND_REGEX.replace_all(&current, |caps: &Captures| {
                match symbol_for(&caps[1]) {
                    Some(symbol) => symbol.to_string(),
                    None => caps[0].to_string(),
                }
            });
            let stripped = BRACE_REGEX.replace_all(&substituted, "").into_owned();

            if stripped == current {
                return current;
            }
            current = stripped;
        }
    }
}
