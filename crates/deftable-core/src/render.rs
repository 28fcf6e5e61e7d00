//! Renderers for a finished [`Document`]: XML text and pretty JSON.

use std::fmt::Write;

use deftable_types::Result;

use crate::tree::{Document, Element};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const INDENT: &str = "  ";

/// Escape a string for use inside a double-quoted XML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize) -> std::fmt::Result {
    let pad = INDENT.repeat(depth);
    write!(out, "{}<{}", pad, element.name)?;
    for attr in &element.attrs {
        write!(out, " {}=\"{}\"", attr.name, escape_attr(&attr.value))?;
    }
    if element.children.is_empty() {
        return out.write_str("/>\n");
    }
    out.write_str(">\n")?;
    for child in &element.children {
        write_element(out, child, depth + 1)?;
    }
    writeln!(out, "{}</{}>", pad, element.name)
}

/// Render the document as indented XML with a declaration line.
pub fn to_xml(document: &Document) -> String {
    let mut out = String::new();
    out.push_str(XML_DECLARATION);
    out.push('\n');
    write_element(&mut out, &document.root, 0).expect("writing to a String cannot fail");
    out
}

pub fn to_json(document: &Document) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
