/// Represents ways to locate an element on the console page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select a form control by its `name` attribute
    Name(String),
    /// Select by DOM id
    Id(String),
    /// Select any element whose own text node equals the given string
    Text(String),
    /// Select a button whose label span contains the given text
    Button(String),
    /// Select an anchor by its visible text
    Link(String),
    /// Select using a raw XPath query
    Path(String),
    /// Chain multiple selectors, each one resolved relative to the previous
    Chain(Vec<Selector>),
    /// A string that did not parse, with the reason
    Invalid(String),
}

impl Selector {
    /// Render this selector as an XPath expression.
    ///
    /// Every selector compiles down to XPath because the console's custom
    /// widgets are only addressable through attribute and text predicates.
    pub fn to_xpath(&self) -> Result<String, crate::AutomationError> {
        match self {
            Selector::Name(name) => Ok(format!("//*[@name = {}]", xpath_literal(name))),
            Selector::Id(id) => Ok(format!("//*[@id = {}]", xpath_literal(id))),
            Selector::Text(text) => Ok(format!("//*[text() = {}]", xpath_literal(text))),
            Selector::Button(label) => Ok(format!(
                "//button[contains(span/text(), {})]",
                xpath_literal(label)
            )),
            Selector::Link(text) => Ok(format!("//a[normalize-space(.) = {}]", xpath_literal(text))),
            Selector::Path(path) => Ok(path.clone()),
            Selector::Chain(parts) => {
                let mut xpath = String::new();
                for part in parts {
                    let next = part.to_xpath()?;
                    if xpath.is_empty() {
                        xpath = next;
                    } else {
                        // "./ancestor::tr" continues from the previous step
                        xpath.push_str(next.strip_prefix('.').unwrap_or(&next));
                    }
                }
                if xpath.is_empty() {
                    return Err(crate::AutomationError::InvalidSelector(
                        "empty selector chain".to_string(),
                    ));
                }
                Ok(xpath)
            }
            Selector::Invalid(reason) => Err(crate::AutomationError::InvalidSelector(reason.clone())),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Name(v) => write!(f, "name:{v}"),
            Selector::Id(v) => write!(f, "id:{v}"),
            Selector::Text(v) => write!(f, "text:{v}"),
            Selector::Button(v) => write!(f, "button:{v}"),
            Selector::Link(v) => write!(f, "link:{v}"),
            Selector::Path(v) => write!(f, "{v}"),
            Selector::Chain(parts) => {
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", rendered.join(" >> "))
            }
            Selector::Invalid(reason) => write!(f, "<invalid: {reason}>"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        if s.contains(">>") {
            return Selector::Chain(s.split(">>").map(|step| Selector::from(step.trim())).collect());
        }

        let prefixes: [(&str, fn(String) -> Selector); 7] = [
            ("name:", Selector::Name),
            ("id:", Selector::Id),
            ("text:", Selector::Text),
            ("button:", Selector::Button),
            ("link:", Selector::Link),
            ("xpath:", Selector::Path),
            ("#", Selector::Id),
        ];
        for (prefix, build) in prefixes {
            if let Some(rest) = s.strip_prefix(prefix) {
                return build(rest.to_string());
            }
        }
        if s.starts_with('/') || s.starts_with("./") || s.starts_with('(') {
            return Selector::Path(s.to_string());
        }
        Selector::Invalid(format!(
            "unknown selector {s:?}; expected a name:, id:, text:, button:, link: or xpath: prefix"
        ))
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// Quote a string for use inside an XPath expression.
///
/// XPath 1.0 has no escape sequences, so a value holding both quote kinds
/// has to be assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let pieces: Vec<String> = value
        .split('\'')
        .map(|piece| format!("'{piece}'"))
        .collect();
    format!("concat({})", pieces.join(", \"'\", "))
}
