//! The XML program loader.
//!
//! Parses the source document into a minimal element tree, validates the
//! program structure, pre-parses every argument (identifiers against the
//! variable grammar, constants by a full literal parse), and emits the
//! instruction sequence sorted by `order`.

use std::sync::LazyLock;

use ahash::AHashSet;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use regex::Regex;
use smallvec::SmallVec;

use crate::{
    error::InterpretError,
    frame::FrameKind,
    instruction::{Arg, Instruction, Opcode},
    run::Program,
    value,
};

static VAR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(GF|TF|LF)@([a-zA-Z_$&%*!?-][a-zA-Z0-9_$&%*!?-]*)$").expect("variable identifier pattern is valid")
});

pub(crate) fn load(source: &str) -> Result<Program, InterpretError> {
    let root = parse_document(source)?;
    build_program(&root)
}

/// A parsed XML element: tag name, attributes, child elements, and the text
/// directly inside it.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Builds the element tree from the quick-xml event stream.
///
/// Text is kept verbatim (no trimming): leading or trailing whitespace in an
/// argument literal is significant and must reach the literal parser. Any
/// well-formedness failure maps to the XML-malformed error (exit 31).
fn parse_document(source: &str) -> Result<Element, InterpretError> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Err(error) => return Err(InterpretError::xml_malformed(error, reader.buffer_position())),
            Ok(Event::Start(start)) => stack.push(open_element(&start, position)?),
            Ok(Event::Empty(start)) => {
                let element = open_element(&start, position)?;
                attach(element, &mut stack, &mut root, position)?;
            }
            Ok(Event::End(_)) => {
                // tag mismatches are already rejected by the reader
                let element = stack
                    .pop()
                    .ok_or_else(|| InterpretError::xml_malformed("unexpected closing tag", position))?;
                attach(element, &mut stack, &mut root, position)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|error| InterpretError::xml_malformed(error, position))?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(InterpretError::xml_malformed(
                            "text content outside the root element",
                            position,
                        ));
                    }
                }
            }
            Ok(Event::CData(cdata)) => match stack.last_mut() {
                Some(open) => open.text.push_str(&String::from_utf8_lossy(&cdata)),
                None => {
                    return Err(InterpretError::xml_malformed(
                        "character data outside the root element",
                        position,
                    ));
                }
            },
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
        }
    }
    if !stack.is_empty() {
        return Err(InterpretError::xml_malformed(
            "unexpected end of document",
            reader.buffer_position(),
        ));
    }
    root.ok_or_else(|| InterpretError::xml_malformed("document has no root element", reader.buffer_position()))
}

fn open_element(start: &BytesStart<'_>, position: u64) -> Result<Element, InterpretError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|error| InterpretError::xml_malformed(error, position))?
        .to_owned();
    let mut attrs = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|error| InterpretError::xml_malformed(error, position))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|error| InterpretError::xml_malformed(error, position))?
            .to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|error| InterpretError::xml_malformed(error, position))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
    position: u64,
) -> Result<(), InterpretError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_some() {
        Err(InterpretError::xml_malformed("multiple root elements", position))
    } else {
        *root = Some(element);
        Ok(())
    }
}

/// Validates the document structure and emits the sorted program.
fn build_program(root: &Element) -> Result<Program, InterpretError> {
    if root.name != "program" {
        return Err(InterpretError::program_format(format!(
            "unexpected root element '{}'",
            root.name
        )));
    }
    if root.attr("language") != Some("IPPcode21") {
        return Err(InterpretError::program_format("missing language specification"));
    }
    for (key, _) in &root.attrs {
        if !matches!(key.as_str(), "language" | "name" | "description") {
            return Err(InterpretError::program_format(
                "invalid attributes found in the root element",
            ));
        }
    }
    let mut numbered: Vec<(u32, Instruction)> = Vec::with_capacity(root.children.len());
    let mut seen_orders: AHashSet<u32> = AHashSet::new();
    for element in &root.children {
        let (order, instruction) = load_instruction(element)?;
        if !seen_orders.insert(order) {
            return Err(InterpretError::program_format(format!(
                "duplicate instruction order {order}"
            )));
        }
        numbered.push((order, instruction));
    }
    numbered.sort_by_key(|&(order, _)| order);
    Ok(Program::new(
        numbered.into_iter().map(|(_, instruction)| instruction).collect(),
    ))
}

fn load_instruction(element: &Element) -> Result<(u32, Instruction), InterpretError> {
    if element.name != "instruction" {
        return Err(InterpretError::program_format(format!(
            "unexpected element '{}'",
            element.name
        )));
    }
    let order_text = element
        .attr("order")
        .ok_or_else(|| InterpretError::program_format("found an 'instruction' element with no 'order' attribute"))?;
    let order: u32 = order_text
        .trim()
        .parse()
        .ok()
        .filter(|&order| order > 0)
        .ok_or_else(|| {
            InterpretError::program_format(format!(
                "invalid value of the 'order' attribute (expected 1 or more): '{order_text}'"
            ))
        })?;
    let opcode_text = element
        .attr("opcode")
        .ok_or_else(|| InterpretError::program_format("found an 'instruction' element with no 'opcode' attribute"))?;
    let opcode: Opcode = opcode_text
        .trim()
        .parse()
        .map_err(|_| InterpretError::invalid_opcode(opcode_text.trim(), order))?;
    for (key, _) in &element.attrs {
        if !matches!(key.as_str(), "order" | "opcode") {
            return Err(InterpretError::program_format(
                "invalid attributes found in an instruction element",
            ));
        }
    }
    let args = collect_args(element, opcode, order)?;
    Ok((order, Instruction { opcode, args }))
}

/// Gathers `arg1`–`arg3` children in position order regardless of document
/// order; duplicates, gaps, sub-elements and arity mismatches are rejected.
fn collect_args(element: &Element, opcode: Opcode, order: u32) -> Result<SmallVec<[Arg; 3]>, InterpretError> {
    let mut slots: [Option<Arg>; 3] = [const { None }; 3];
    for child in &element.children {
        let position = match child.name.as_str() {
            "arg1" => 0,
            "arg2" => 1,
            "arg3" => 2,
            other => {
                return Err(InterpretError::program_format(format!(
                    "unexpected child '{other}' of an instruction element"
                )));
            }
        };
        if slots[position].is_some() {
            return Err(InterpretError::program_format(format!(
                "duplicate '{}' element",
                child.name
            )));
        }
        if !child.children.is_empty() {
            return Err(InterpretError::program_format(format!(
                "found an '{}' element with children elements",
                child.name
            )));
        }
        let type_name = child.attr("type").ok_or_else(|| {
            InterpretError::program_format(format!("found an '{}' element with no 'type' attribute", child.name))
        })?;
        slots[position] = Some(parse_arg(type_name, &child.text, opcode, order)?);
    }
    if slots[1].is_some() && slots[0].is_none() {
        return Err(InterpretError::program_format(
            "found an arg2 element when there is no arg1 element",
        ));
    }
    if slots[2].is_some() && slots[1].is_none() {
        return Err(InterpretError::program_format(
            "found an arg3 element when there is no arg2 element",
        ));
    }
    let args: SmallVec<[Arg; 3]> = slots.into_iter().flatten().collect();
    if args.len() != opcode.arity() {
        return Err(InterpretError::program_format(format!(
            "invalid number of arguments for instruction '{opcode}' (expected {}, found {})",
            opcode.arity(),
            args.len()
        )));
    }
    Ok(args)
}

fn parse_arg(type_name: &str, text: &str, opcode: Opcode, order: u32) -> Result<Arg, InterpretError> {
    if type_name == "var" {
        let captures = VAR_NAME
            .captures(text)
            .ok_or_else(|| InterpretError::lexical(text, "variable identifier").with_order(opcode, order))?;
        let frame = match &captures[1] {
            "GF" => FrameKind::Global,
            "LF" => FrameKind::Local,
            _ => FrameKind::Temporary,
        };
        Ok(Arg::Var {
            frame,
            name: captures[2].to_owned(),
        })
    } else {
        value::parse_literal(type_name, text)
            .map(Arg::Const)
            .map_err(|error| error.with_order(opcode, order))
    }
}
