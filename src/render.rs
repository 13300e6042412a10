//! Human-readable views of a state tree.

use crate::store::tree::{Node, StateTree};
use crate::value::Value;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Longest value rendering shown before truncation.
const MAX_VALUE_WIDTH: usize = 60;

/// Indented tree: groups as headings, leaves as `name: value`.
pub fn render_tree(tree: &StateTree, color: bool) -> String {
    let mut out = String::new();
    if tree.top_level().is_empty() {
        out.push_str(&styled("(empty)", color, Style::Muted));
        out.push('\n');
        return out;
    }
    render_children(tree.top_level(), 0, color, &mut out);
    out
}

fn render_children(children: &BTreeMap<String, Node>, depth: usize, color: bool, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, node) in children {
        match node {
            Node::Leaf(value) => {
                out.push_str(&format!(
                    "{}{}: {}\n",
                    indent,
                    name,
                    styled(&short_value(value), color, Style::Value)
                ));
            }
            Node::Group(grand) => {
                out.push_str(&format!("{}{}\n", indent, styled(name, color, Style::Group)));
                render_children(grand, depth + 1, color, out);
            }
        }
    }
}

/// Table of every leaf with its type and value.
pub fn render_leaf_table(tree: &StateTree) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Type", "Value"]);
    for (path, value) in tree.leaves() {
        table.add_row(vec![path.to_string(), value.kind().to_string(), short_value(value)]);
    }
    table.to_string()
}

/// Nested JSON object mirroring the tree; leaves become their JSON view.
pub fn tree_to_json(tree: &StateTree) -> serde_json::Value {
    group_to_json(tree.top_level())
}

fn group_to_json(children: &BTreeMap<String, Node>) -> serde_json::Value {
    serde_json::Value::Object(
        children
            .iter()
            .map(|(name, node)| {
                let json = match node {
                    Node::Leaf(value) => value.to_json(),
                    Node::Group(grand) => group_to_json(grand),
                };
                (name.clone(), json)
            })
            .collect(),
    )
}

/// Bold section heading.
pub fn format_section_heading(title: &str, color: bool) -> String {
    if color {
        format!("{}", title.bold().underline())
    } else {
        title.to_string()
    }
}

#[derive(Clone, Copy)]
enum Style {
    Group,
    Value,
    Muted,
}

fn styled(text: &str, color: bool, style: Style) -> String {
    if !color {
        return text.to_string();
    }
    match style {
        Style::Group => text.bold().cyan().to_string(),
        Style::Value => text.green().to_string(),
        Style::Muted => text.dimmed().to_string(),
    }
}

fn short_value(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_VALUE_WIDTH {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(MAX_VALUE_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}
