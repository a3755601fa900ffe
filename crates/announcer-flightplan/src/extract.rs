//! Heuristic field extraction from flight-plan XML.
//!
//! Upstream documents vary in layout, so each field is located by a list
//! of candidate element names, compared case-insensitively. Every level of
//! the tree is searched for all candidates before descending into children.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xmltree::{Element, XMLNode};

const FLIGHT_NUMBER_KEYS: &[&str] = &["flight_number", "fltno", "flight", "flightnum", "flt"];
const DEPARTURE_KEYS: &[&str] = &["dep_icao", "departure", "dep", "orig"];
const ARRIVAL_KEYS: &[&str] = &["arr_icao", "arrival", "dest", "destination", "arr"];
const ETA_KEYS: &[&str] = &["eta", "arrival_time", "eobt"];

/// Fields pulled out of a flight plan, plus the whole document as JSON.
///
/// Missing fields are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightInfo {
    pub flight_number: String,
    pub departure: String,
    pub arrival: String,
    pub eta: String,
    pub raw: Value,
}

/// Extracts [`FlightInfo`] from a parsed document root.
pub fn extract_flight_info(root: &Element) -> FlightInfo {
    let field = |keys: &[&str]| -> String {
        find_first(&[root], keys)
            .and_then(element_value)
            .unwrap_or_default()
    };

    FlightInfo {
        flight_number: field(FLIGHT_NUMBER_KEYS),
        departure: field(DEPARTURE_KEYS),
        arrival: field(ARRIVAL_KEYS),
        eta: field(ETA_KEYS),
        raw: document_to_json(root),
    }
}

/// Breadth-first by level: all candidates at this level, then each child's
/// subtree in document order.
fn find_first<'a>(level: &[&'a Element], candidates: &[&str]) -> Option<&'a Element> {
    for candidate in candidates {
        if let Some(found) = level
            .iter()
            .copied()
            .find(|element| element.name.eq_ignore_ascii_case(candidate))
        {
            return Some(found);
        }
    }

    level.iter().copied().find_map(|element| {
        let children: Vec<&'a Element> = child_elements(element).collect();
        if children.is_empty() {
            None
        } else {
            find_first(&children, candidates)
        }
    })
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

/// Text content of a leaf, falling back to a `value` attribute.
fn element_value(element: &Element) -> Option<String> {
    let text = element
        .get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    text.or_else(|| element.attributes.get("value").cloned())
}

/// Converts a document into JSON keyed by the root element name.
///
/// Attributes become `@name` keys, text alongside attributes or children
/// becomes `#text`, and repeated child names collapse into arrays.
pub fn document_to_json(root: &Element) -> Value {
    let mut doc = Map::new();
    doc.insert(root.name.clone(), element_to_json(root));
    Value::Object(doc)
}

fn element_to_json(element: &Element) -> Value {
    let text = element
        .get_text()
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    let mut children = child_elements(element).peekable();

    if element.attributes.is_empty() && children.peek().is_none() {
        return Value::String(text);
    }

    let mut object = Map::new();
    for (name, value) in element.attributes.iter() {
        object.insert(format!("@{}", name), Value::String(value.clone()));
    }
    for child in children {
        let value = element_to_json(child);
        match object.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(child.name.clone(), value);
            }
        }
    }
    if !text.is_empty() {
        object.insert("#text".to_string(), Value::String(text));
    }
    Value::Object(object)
}
