//! Placeholder substitution for announcement templates.
//!
//! A placeholder is `{name}` where `name` is one or more ASCII letters,
//! digits, `_`, `-`, or `.`. Placeholders without a matching context key,
//! and any other brace usage, are copied through unchanged.

use announcer_types::Context;

/// Renders `template` against `context`.
pub fn render(template: &str, context: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if let Some(close) = after.find('}') {
            let name = &after[..close];
            if is_placeholder_name(name) {
                if let Some(value) = context.get(name) {
                    out.push_str(value);
                    rest = &after[close + 1..];
                    continue;
                }
            }
        }

        // Not a substitutable placeholder: emit the brace and rescan after it.
        out.push('{');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_placeholder() {
        assert_eq!(
            render("Gear is {state}", &ctx(&[("state", "down")])),
            "Gear is down"
        );
    }

    #[test]
    fn substitutes_repeated_and_multiple_placeholders() {
        let context = ctx(&[("flight", "IB3456"), ("gate", "B12")]);
        assert_eq!(
            render("{flight} boarding at {gate}. {flight}, gate {gate}.", &context),
            "IB3456 boarding at B12. IB3456, gate B12."
        );
    }

    #[test]
    fn leaves_unknown_placeholder_verbatim() {
        assert_eq!(
            render("Welcome to {city}, local time {time}", &ctx(&[("city", "Madrid")])),
            "Welcome to Madrid, local time {time}"
        );
    }

    #[test]
    fn leaves_malformed_braces_verbatim() {
        let context = ctx(&[("a", "x")]);
        assert_eq!(render("open { brace", &context), "open { brace");
        assert_eq!(render("empty {} pair", &context), "empty {} pair");
        assert_eq!(render("spaced {a b}", &context), "spaced {a b}");
        assert_eq!(render("trailing {", &context), "trailing {");
        assert_eq!(render("}{a}{", &context), "}x{");
    }

    #[test]
    fn nested_braces_substitute_inner_placeholder() {
        assert_eq!(render("{{a}}", &ctx(&[("a", "x")])), "{x}");
    }

    #[test]
    fn dotted_and_dashed_names_are_placeholders() {
        let context = ctx(&[("dep.icao", "LEMD"), ("arr-icao", "EGLL")]);
        assert_eq!(render("{dep.icao} to {arr-icao}", &context), "LEMD to EGLL");
    }

    #[test]
    fn values_are_not_rescanned() {
        assert_eq!(
            render("{a}", &ctx(&[("a", "{b}"), ("b", "nope")])),
            "{b}"
        );
    }

    #[test]
    fn handles_multibyte_text() {
        assert_eq!(
            render("Señoras y señores, {msg} ✈", &ctx(&[("msg", "bienvenidos")])),
            "Señoras y señores, bienvenidos ✈"
        );
    }
}
