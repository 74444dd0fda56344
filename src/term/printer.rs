//! Canonical term rendering, used both for debug output and to satisfy the
//! parse→print→parse idempotence property (spec.md §8).

use super::{AtomKind, Term};

pub fn print_term(term: &Term) -> String {
    let mut out = String::new();
    write_term(term, &mut out);
    out
}

fn write_term(term: &Term, out: &mut String) {
    if let Some(name) = term.var_name() {
        out.push_str(name);
        return;
    }
    if let Some(name) = term.atom_name() {
        match term.atom_kind().unwrap() {
            AtomKind::Str => {
                out.push('"');
                for ch in name.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        _ => out.push(ch),
                    }
                }
                out.push('"');
            }
            AtomKind::Symbol | AtomKind::Number | AtomKind::Skolem => out.push_str(name),
        }
        return;
    }
    let items = term.as_list().expect("term is atom, var, or list");
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_term(item, out);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_ground_list() {
        let t = Term::list(vec![Term::atom("parent"), Term::atom("alice"), Term::atom("bob")]);
        assert_eq!(print_term(&t), "(parent alice bob)");
    }

    #[test]
    fn prints_variable() {
        assert_eq!(print_term(&Term::var("?x")), "?x");
    }

    #[test]
    fn prints_string_with_escapes() {
        let t = Term::string_atom("a \"quoted\" word");
        assert_eq!(print_term(&t), "\"a \\\"quoted\\\" word\"");
    }

    #[test]
    fn prints_empty_list() {
        assert_eq!(print_term(&Term::empty_list()), "()");
    }
}
