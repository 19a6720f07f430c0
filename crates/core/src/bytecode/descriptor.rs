//! Remapping of class names embedded in JVM descriptors and generic
//! signatures.
//!
//! Descriptors go through [`FieldType`]; generic signatures have their own
//! small grammar and get a hand parser. Every function returns `None` when
//! nothing changed, so callers can keep the original constant untouched.

use ristretto_classfile::FieldType;

use super::Remapper;

/// A `CONSTANT_Class` name: either an internal name or an array descriptor.
pub fn map_type(name: &str, remapper: &dyn Remapper) -> Option<String> {
    if name.starts_with('[') {
        map_descriptor(name, remapper)
    } else {
        remapper.map_internal_name(name)
    }
}

/// A field or method descriptor, e.g. `(ILcom/foo/Bar;)[Lcom/foo/Baz;`.
/// Descriptors that do not parse are left alone.
pub fn map_descriptor(desc: &str, remapper: &dyn Remapper) -> Option<String> {
    if !desc.contains('L') {
        return None;
    }
    let (parameters, returns) = if desc.starts_with('(') {
        FieldType::parse_method_descriptor(desc).ok()?
    } else {
        (Vec::new(), Some(FieldType::parse(desc).ok()?))
    };
    // A parse that does not render back to the input is not trusted
    if render(&parameters, returns.as_ref(), desc.starts_with('('), |t| t.descriptor()) != desc {
        return None;
    }

    let mut changed = false;
    let out = render(&parameters, returns.as_ref(), desc.starts_with('('), |t| {
        match map_field_type(t, remapper) {
            Some(mapped) => {
                changed = true;
                mapped.descriptor()
            }
            None => t.descriptor(),
        }
    });
    changed.then_some(out)
}

fn render(
    parameters: &[FieldType],
    returns: Option<&FieldType>,
    method: bool,
    mut descriptor: impl FnMut(&FieldType) -> String,
) -> String {
    let mut out = String::new();
    if method {
        out.push('(');
        for parameter in parameters {
            out.push_str(&descriptor(parameter));
        }
        out.push(')');
    }
    match returns {
        Some(returns) => out.push_str(&descriptor(returns)),
        None => out.push('V'),
    }
    out
}

fn map_field_type(field_type: &FieldType, remapper: &dyn Remapper) -> Option<FieldType> {
    match field_type {
        FieldType::Base(_) => None,
        FieldType::Object(name) => remapper.map_internal_name(name).map(FieldType::Object),
        FieldType::Array(component) => {
            map_field_type(component, remapper).map(|c| FieldType::Array(Box::new(c)))
        }
    }
}

/// A generic signature (class, method or field). Malformed input is left
/// alone rather than rejected, since signatures are metadata only.
pub fn map_signature(signature: &str, remapper: &dyn Remapper) -> Option<String> {
    if !signature.contains('L') {
        return None;
    }
    let mut parser = SignatureParser {
        input: signature,
        pos: 0,
        out: String::with_capacity(signature.len() + 16),
        changed: false,
        remapper,
    };
    parser.signature()?;
    parser.changed.then_some(parser.out)
}

struct SignatureParser<'a> {
    input: &'a str,
    pos: usize,
    out: String,
    changed: bool,
    remapper: &'a dyn Remapper,
}

impl SignatureParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        self.out.push(c);
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        (self.bump()? == expected).then_some(())
    }

    /// Copies input up to (not including) the first char in `stops`.
    fn identifier(&mut self, stops: &[char]) -> Option<&str> {
        let start = self.pos;
        let len = self.input[start..].find(|c| stops.contains(&c))?;
        self.pos += len;
        Some(&self.input[start..start + len])
    }

    fn signature(&mut self) -> Option<()> {
        if self.peek() == Some('<') {
            self.formal_type_parameters()?;
        }
        if self.peek() == Some('(') {
            self.bump();
            while self.peek()? != ')' {
                self.type_signature()?;
            }
            self.bump();
            // return type
            if self.peek()? == 'V' {
                self.bump();
            } else {
                self.type_signature()?;
            }
            while self.peek() == Some('^') {
                self.bump();
                self.reference_type()?;
            }
        } else {
            // superclass followed by interfaces, or a lone field type
            while self.peek().is_some() {
                self.reference_type()?;
            }
        }
        (self.pos == self.input.len()).then_some(())
    }

    fn formal_type_parameters(&mut self) -> Option<()> {
        self.expect('<')?;
        while self.peek()? != '>' {
            let name = self.identifier(&[':'])?.to_string();
            self.out.push_str(&name);
            // class bound may be empty, interface bounds follow
            while self.peek() == Some(':') {
                self.bump();
                if matches!(self.peek()?, 'L' | 'T' | '[') {
                    self.reference_type()?;
                }
            }
        }
        self.expect('>')
    }

    fn type_signature(&mut self) -> Option<()> {
        match self.peek()? {
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => {
                self.bump();
                Some(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Option<()> {
        match self.peek()? {
            'L' => self.class_type(),
            'T' => {
                self.bump();
                let name = self.identifier(&[';'])?.to_string();
                self.out.push_str(&name);
                self.expect(';')
            }
            '[' => {
                self.bump();
                self.type_signature()
            }
            _ => None,
        }
    }

    fn class_type(&mut self) -> Option<()> {
        self.expect('L')?;
        let name = self.identifier(&['<', '.', ';'])?.to_string();
        match self.remapper.map_internal_name(&name) {
            Some(mapped) => {
                self.changed = true;
                self.out.push_str(&mapped);
            }
            None => self.out.push_str(&name),
        }
        loop {
            if self.peek()? == '<' {
                self.type_arguments()?;
            }
            match self.peek()? {
                '.' => {
                    // inner class simple names are not relocated
                    self.bump();
                    let inner = self.identifier(&['<', '.', ';'])?.to_string();
                    self.out.push_str(&inner);
                }
                ';' => {
                    self.bump();
                    return Some(());
                }
                _ => return None,
            }
        }
    }

    fn type_arguments(&mut self) -> Option<()> {
        self.expect('<')?;
        while self.peek()? != '>' {
            match self.peek()? {
                '*' => {
                    self.bump();
                }
                '+' | '-' => {
                    self.bump();
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect('>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix;

    impl Remapper for Prefix {
        fn map_internal_name(&self, name: &str) -> Option<String> {
            name.strip_prefix("com/foo/")
                .map(|rest| format!("shaded/foo/{rest}"))
        }

        fn map_value(&self, _value: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_map_type() {
        assert_eq!(map_type("com/foo/Bar", &Prefix).as_deref(), Some("shaded/foo/Bar"));
        assert_eq!(
            map_type("[[Lcom/foo/Bar;", &Prefix).as_deref(),
            Some("[[Lshaded/foo/Bar;")
        );
        assert_eq!(map_type("[I", &Prefix), None);
        assert_eq!(map_type("java/lang/Object", &Prefix), None);
    }

    #[test]
    fn test_map_method_descriptor() {
        assert_eq!(
            map_descriptor("(ILcom/foo/A;[Ljava/lang/String;)Lcom/foo/B;", &Prefix).as_deref(),
            Some("(ILshaded/foo/A;[Ljava/lang/String;)Lshaded/foo/B;")
        );
        assert_eq!(map_descriptor("(IJ)V", &Prefix), None);
        assert_eq!(map_descriptor("Ljava/lang/Object;", &Prefix), None);
        assert_eq!(
            map_descriptor("[[Lcom/foo/A;", &Prefix).as_deref(),
            Some("[[Lshaded/foo/A;")
        );
        // unterminated, left for the verifier to complain about
        assert_eq!(map_descriptor("(Lcom/foo/A)V", &Prefix), None);
        assert_eq!(map_descriptor("Lcom/foo/A", &Prefix), None);
    }

    #[test]
    fn test_map_generic_signatures() {
        assert_eq!(
            map_signature("Ljava/util/List<Lcom/foo/Bar;>;", &Prefix).as_deref(),
            Some("Ljava/util/List<Lshaded/foo/Bar;>;")
        );
        assert_eq!(
            map_signature(
                "<T:Ljava/lang/Object;L:Lcom/foo/Bound;>Lcom/foo/Base<TT;>;Ljava/lang/Comparable<TL;>;",
                &Prefix
            )
            .as_deref(),
            Some(
                "<T:Ljava/lang/Object;L:Lshaded/foo/Bound;>Lshaded/foo/Base<TT;>;Ljava/lang/Comparable<TL;>;"
            )
        );
        assert_eq!(
            map_signature("<E::Ljava/lang/Runnable;>(TE;[TE;)Lcom/foo/Outer<*>.Inner<+TE;>;^Lcom/foo/Oops;", &Prefix)
                .as_deref(),
            Some("<E::Ljava/lang/Runnable;>(TE;[TE;)Lshaded/foo/Outer<*>.Inner<+TE;>;^Lshaded/foo/Oops;")
        );
    }

    #[test]
    fn test_malformed_signature_is_left_alone() {
        assert_eq!(map_signature("Lcom/foo/Bar", &Prefix), None);
        assert_eq!(map_signature("Lcom/foo/Bar;junk", &Prefix), None);
    }
}
