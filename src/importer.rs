// src/importer.rs

use crate::capture_models::*;
use crate::error::{Error, Result};
use crate::xml_tree::XmlElement;
use log::{debug, warn};

/// Where a scalar field may live on a Capture XML node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolver {
    /// `<Pin name="VIN"/>`
    DirectAttribute,
    /// `<Pin><Defn name="VIN"/></Pin>`
    DefnAttribute,
    /// `<Pin><name>VIN</name></Pin>`
    ChildField,
}

const RESOLUTION_ORDER: [Resolver; 3] = [
    Resolver::DirectAttribute,
    Resolver::DefnAttribute,
    Resolver::ChildField,
];

impl Resolver {
    fn resolve<'a>(self, element: &'a XmlElement, key: &str) -> Option<&'a str> {
        match self {
            Resolver::DirectAttribute => element.attribute(key),
            Resolver::DefnAttribute => element
                .children_named("Defn")
                .find_map(|defn| defn.attribute(key)),
            Resolver::ChildField => element.child(key).map(|c| c.text.as_str()),
        }
    }
}

/// Resolves `key` on `element`; the first strategy that finds it wins.
fn resolve<'a>(element: &'a XmlElement, key: &str) -> Option<&'a str> {
    RESOLUTION_ORDER
        .iter()
        .find_map(|resolver| resolver.resolve(element, key))
}

fn resolve_string(element: &XmlElement, key: &str) -> String {
    resolve(element, key).unwrap_or_default().to_string()
}

fn resolve_i32(element: &XmlElement, key: &str) -> i32 {
    resolve(element, key).map_or(0, |raw| {
        in_range(i32::try_from(parse_number(raw, key)).ok(), raw, key)
    })
}

fn resolve_u32(element: &XmlElement, key: &str) -> u32 {
    resolve(element, key).map_or(0, |raw| {
        in_range(u32::try_from(parse_number(raw, key)).ok(), raw, key)
    })
}

/// Pin types are stored as u32; negative values keep their two's-complement bits.
fn resolve_pin_type(element: &XmlElement) -> u32 {
    resolve(element, "type").map_or(0, |raw| {
        let value = parse_number(raw, "type");
        let narrowed = u32::try_from(value)
            .ok()
            .or_else(|| i32::try_from(value).ok().map(|v| v as u32));
        in_range(narrowed, raw, "type")
    })
}

fn in_range<T: Default>(value: Option<T>, raw: &str, key: &str) -> T {
    value.unwrap_or_else(|| {
        debug!("Value {:?} for '{}' is out of range, using 0", raw, key);
        T::default()
    })
}

/// Integer text, or a float rounded to the nearest integer. Anything else is 0.
fn parse_number(raw: &str, key: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return v;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => v.round() as i64,
        _ => {
            debug!("Non-numeric value {:?} for '{}', using 0", raw, key);
            0
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true")
}

/// Decoration flags are child elements carrying a `val`, e.g. `<IsClock val="1"/>`.
fn resolve_flag(element: &XmlElement, flag: &str) -> bool {
    element
        .child(flag)
        .and_then(|f| resolve(f, "val"))
        .is_some_and(is_truthy)
}

/// Parses a Capture XML document into a `ComponentDefinition`.
pub fn import_component_definition(xml: &str) -> Result<ComponentDefinition> {
    let root = XmlElement::parse(xml)?;
    if root.name != "Lib" {
        return Err(Error::FormatError(format!(
            "Expected <Lib> root element, found <{}>",
            root.name
        )));
    }

    let mut packages = root.children_named("Package");
    let package = packages
        .next()
        .ok_or_else(|| Error::FormatError("Missing <Lib><Package> element".to_string()))?;
    let ignored = packages.count();
    if ignored > 0 {
        warn!(
            "Capture XML holds {} extra <Package> element(s); only the first is converted",
            ignored
        );
    }

    import_package(package)
}

fn import_package(package: &XmlElement) -> Result<ComponentDefinition> {
    let name = match resolve(package, "name").map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => DEFAULT_NAME.to_string(),
    };

    let refdes_prefix = resolve(package, "refdesPrefix")
        .unwrap_or(DEFAULT_REFDES_PREFIX)
        .to_string();

    let symbol_bbox = package
        .descendants_named("SymbolBBox")
        .first()
        .map(|bbox| BBox {
            x1: resolve_i32(bbox, "x1"),
            y1: resolve_i32(bbox, "y1"),
            x2: resolve_i32(bbox, "x2"),
            y2: resolve_i32(bbox, "y2"),
        })
        .unwrap_or_default();

    let lines = package
        .descendants_named("Line")
        .into_iter()
        .map(|line| LineSegment {
            x1: resolve_i32(line, "x1"),
            y1: resolve_i32(line, "y1"),
            x2: resolve_i32(line, "x2"),
            y2: resolve_i32(line, "y2"),
        })
        .collect();

    let pins = package
        .descendants_named("SymbolPinScalar")
        .into_iter()
        .map(import_pin)
        .collect();

    let pin_numbers = package
        .descendants_named("PinNumber")
        .into_iter()
        .map(|pn| PinNumber {
            number: resolve_string(pn, "number"),
            position: resolve_u32(pn, "position"),
        })
        .collect();

    let mut user_props: Vec<UserProp> = Vec::new();
    for prop in package.descendants_named("SymbolUserProp") {
        let key = resolve_string(prop, "name");
        if key.is_empty() {
            continue;
        }
        let value = resolve_string(prop, "val");
        // Mapping semantics: a repeated key keeps its first slot.
        match user_props.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value,
            None => user_props.push(UserProp { key, value }),
        }
    }

    Ok(ComponentDefinition {
        name,
        pcb_footprint: resolve_string(package, "pcbFootprint"),
        refdes_prefix,
        user_props,
        symbol_bbox,
        lines,
        pins,
        pin_numbers,
    })
}

fn import_pin(pin: &XmlElement) -> Pin {
    let visible = resolve(pin, "visible").is_none_or(|v| !matches!(v.trim(), "0" | "false"));

    Pin {
        name: resolve_string(pin, "name"),
        position: resolve_u32(pin, "position"),
        hotpt_x: resolve_i32(pin, "hotptX"),
        hotpt_y: resolve_i32(pin, "hotptY"),
        start_x: resolve_i32(pin, "startX"),
        start_y: resolve_i32(pin, "startY"),
        pin_type: resolve_pin_type(pin),
        visible,
        is_clock: resolve_flag(pin, "IsClock"),
        is_dot: resolve_flag(pin, "IsDot"),
        is_long: resolve_flag(pin, "IsLong"),
    }
}
