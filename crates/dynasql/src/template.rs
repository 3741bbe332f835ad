//! Builds a [`SqlNode`] tree from a DOM-like input (spec §4.1).
//!
//! `TemplateNode` is the documented contract: a caller that already parses
//! its own markup (XML, a template engine, whatever) builds this tree
//! directly and hands it to [`build`]. `parse_fragment` is an additive
//! convenience entry point, since the worked statement bodies in practice
//! arrive as a single raw string rather than a pre-built DOM.

use crate::error::{MapperError, MapperResult};
use crate::node::SqlNode;
use crate::statement::JdbcType;

/// One node of the caller-supplied DOM-like tree.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    /// A text/CDATA run, exactly as written (spec §4.1: whitespace preserved).
    Text(String),
    /// An element with a local name, attributes, and children.
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<TemplateNode>,
    },
}

impl TemplateNode {
    fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Parse a DOM-like tree into a `Mixed` root node plus its `is-dynamic` flag.
/// `#{…}` tokens found in text runs are lowered into `Parameter` nodes as
/// part of this call (spec §4.1: "any `#{…}` inside will be lowered later
/// to a driver placeholder"; here, "later" means after text-node
/// construction but still within `build`).
pub fn build(children: &[TemplateNode]) -> MapperResult<(SqlNode, bool)> {
    let node = build_mixed(children)?;
    let node = lower_parameters(node)?;
    let is_dynamic = node.is_dynamic();
    Ok((node, is_dynamic))
}

fn build_mixed(children: &[TemplateNode]) -> MapperResult<SqlNode> {
    let nodes = children.iter().map(build_one).collect::<MapperResult<Vec<_>>>()?;
    Ok(SqlNode::Mixed(nodes))
}

fn build_one(node: &TemplateNode) -> MapperResult<SqlNode> {
    match node {
        TemplateNode::Text(text) => Ok(build_text(text)),
        TemplateNode::Element { name, attrs, children } => build_element(name, attrs, children),
    }
}

fn build_text(text: &str) -> SqlNode {
    if text.contains("${") {
        SqlNode::TextWithSubstitution(text.to_string())
    } else {
        SqlNode::StaticText(text.to_string())
    }
}

fn build_element(name: &str, attrs: &[(String, String)], children: &[TemplateNode]) -> MapperResult<SqlNode> {
    match name {
        "if" | "when" => {
            let test = TemplateNode::attr(attrs, "test")
                .ok_or_else(|| MapperError::build(format!("<{name}> requires a 'test' attribute")))?;
            Ok(SqlNode::If {
                test: test.to_string(),
                child: Box::new(build_mixed(children)?),
            })
        }
        "choose" => build_choose(children),
        "otherwise" => build_mixed(children),
        "where" => Ok(SqlNode::Where(Box::new(build_mixed(children)?))),
        "set" => Ok(SqlNode::Set(Box::new(build_mixed(children)?))),
        "trim" => {
            let prefix = TemplateNode::attr(attrs, "prefix").map(str::to_string);
            let suffix = TemplateNode::attr(attrs, "suffix").map(str::to_string);
            let prefix_overrides = split_overrides(TemplateNode::attr(attrs, "prefixOverrides"));
            let suffix_overrides = split_overrides(TemplateNode::attr(attrs, "suffixOverrides"));
            Ok(SqlNode::Trim {
                child: Box::new(build_mixed(children)?),
                prefix,
                prefix_overrides,
                suffix,
                suffix_overrides,
            })
        }
        "foreach" => {
            let collection = TemplateNode::attr(attrs, "collection")
                .ok_or_else(|| MapperError::build("<foreach> requires a 'collection' attribute"))?;
            Ok(SqlNode::ForEach {
                child: Box::new(build_mixed(children)?),
                collection: collection.to_string(),
                item: TemplateNode::attr(attrs, "item").map(str::to_string),
                index: TemplateNode::attr(attrs, "index").map(str::to_string),
                open: TemplateNode::attr(attrs, "open").map(str::to_string),
                close: TemplateNode::attr(attrs, "close").map(str::to_string),
                separator: TemplateNode::attr(attrs, "separator").map(str::to_string),
            })
        }
        "bind" => {
            let name_attr = TemplateNode::attr(attrs, "name")
                .ok_or_else(|| MapperError::build("<bind> requires a 'name' attribute"))?;
            let value = TemplateNode::attr(attrs, "value")
                .ok_or_else(|| MapperError::build("<bind> requires a 'value' attribute"))?;
            Ok(SqlNode::VarDecl {
                name: name_attr.to_string(),
                expression: value.to_string(),
            })
        }
        other => Err(MapperError::build(format!("unknown template element '<{other}>'"))),
    }
}

fn build_choose(children: &[TemplateNode]) -> MapperResult<SqlNode> {
    let mut whens = Vec::new();
    let mut otherwise = None;
    for child in children {
        let TemplateNode::Element { name, attrs, children } = child else {
            continue;
        };
        match name.as_str() {
            "when" => {
                let test = TemplateNode::attr(attrs, "test")
                    .ok_or_else(|| MapperError::build("<when> requires a 'test' attribute"))?;
                whens.push((test.to_string(), build_mixed(children)?));
            }
            "otherwise" => {
                if otherwise.is_some() {
                    return Err(MapperError::build("<choose> permits at most one <otherwise>"));
                }
                otherwise = Some(Box::new(build_mixed(children)?));
            }
            other => return Err(MapperError::build(format!("<choose> cannot contain '<{other}>'"))),
        }
    }
    Ok(SqlNode::Choose { whens, otherwise })
}

fn split_overrides(attr: Option<&str>) -> Vec<String> {
    attr.map(|s| s.split('|').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Convenience entry point: tokenize a raw statement body string directly
/// into a `Mixed` root, without requiring the caller to hand-build a
/// [`TemplateNode`] tree first. Supports the same element set as [`build`],
/// written as ordinary tags (`<if test="...">...</if>`), plus `#{expr}` and
/// `${expr}` tokens inside text runs. `#{expr}` may carry
/// `jdbcType=TYPE`/`handler=NAME` qualifiers: `#{expr, jdbcType=INTEGER}`.
pub fn parse_fragment(source: &str) -> MapperResult<(SqlNode, bool)> {
    let mut parser = FragmentParser { source, pos: 0 };
    let children = parser.parse_children(None)?;
    build(&children)
}

struct FragmentParser<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> FragmentParser<'s> {
    fn parse_children(&mut self, closing: Option<&str>) -> MapperResult<Vec<TemplateNode>> {
        let mut out = Vec::new();
        let mut text = String::new();
        loop {
            let rest = &self.source[self.pos..];
            if rest.is_empty() {
                if closing.is_some() {
                    return Err(MapperError::build(format!(
                        "unterminated element, expected '</{}>'",
                        closing.unwrap()
                    )));
                }
                break;
            }
            if let Some(tag_start) = rest.find('<') {
                if tag_start > 0 {
                    text.push_str(&rest[..tag_start]);
                }
                self.pos += tag_start;
                let after_lt = &self.source[self.pos + 1..];
                if let Some(name) = after_lt.strip_prefix('/') {
                    let end = name
                        .find('>')
                        .ok_or_else(|| MapperError::build("unterminated closing tag"))?;
                    let tag_name = name[..end].trim();
                    if !text.is_empty() {
                        out.push(TemplateNode::Text(decode_entities(&std::mem::take(&mut text))));
                    }
                    self.pos += 1 + end + 2;
                    match closing {
                        Some(expected) if expected == tag_name => return Ok(out),
                        _ => {
                            return Err(MapperError::build(format!(
                                "mismatched closing tag '</{tag_name}>'"
                            )))
                        }
                    }
                } else {
                    if !text.is_empty() {
                        out.push(TemplateNode::Text(decode_entities(&std::mem::take(&mut text))));
                    }
                    out.push(self.parse_element()?);
                }
            } else {
                text.push_str(rest);
                self.pos = self.source.len();
            }
        }
        if !text.is_empty() {
            out.push(TemplateNode::Text(decode_entities(&text)));
        }
        Ok(out)
    }

    fn parse_element(&mut self) -> MapperResult<TemplateNode> {
        debug_assert_eq!(&self.source[self.pos..self.pos + 1], "<");
        let rest = &self.source[self.pos + 1..];
        let head_end = rest
            .find('>')
            .ok_or_else(|| MapperError::build("unterminated element tag"))?;
        let head = &rest[..head_end];
        let self_closing = head.trim_end().ends_with('/');
        let head = if self_closing { &head[..head.trim_end().len() - 1] } else { head };
        let mut parts = head.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| MapperError::build("empty element tag"))?
            .to_string();
        let attrs = parse_attrs(&head[name.len()..])?;
        self.pos += 1 + head_end + 1;
        if self_closing {
            return Ok(TemplateNode::Element { name, attrs, children: Vec::new() });
        }
        let children = self.parse_children(Some(&name))?;
        Ok(TemplateNode::Element { name, attrs, children })
    }
}

fn parse_attrs(src: &str) -> MapperResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut rest = src.trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| MapperError::build(format!("malformed attribute near '{rest}'")))?;
        let key = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let quote = rest
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| MapperError::build(format!("attribute '{key}' value must be quoted")))?;
        let value_start = 1;
        let value_end = rest[value_start..]
            .find(quote)
            .ok_or_else(|| MapperError::build(format!("unterminated attribute value for '{key}'")))?;
        let value = rest[value_start..value_start + value_end].to_string();
        out.push((key, value));
        rest = rest[value_start + value_end + 1..].trim_start();
    }
    Ok(out)
}

/// Lower any `#{expr}`/`#{expr, jdbcType=...}` tokens inside `StaticText`
/// nodes into `Parameter` nodes, splitting the surrounding text as needed.
/// Applied as a post-pass over the tree `build`/`parse_fragment` produce,
/// since `#{…}` lowering is independent of element structure (spec §4.1:
/// "any `#{…}` inside will be lowered later to a driver placeholder").
pub fn lower_parameters(node: SqlNode) -> MapperResult<SqlNode> {
    match node {
        SqlNode::StaticText(text) => lower_text(&text),
        SqlNode::TextWithSubstitution(text) => {
            let lowered = lower_text(&text)?;
            rewrap_substitution(lowered)
        }
        SqlNode::Mixed(children) => Ok(SqlNode::Mixed(
            children.into_iter().map(lower_parameters).collect::<MapperResult<_>>()?,
        )),
        SqlNode::If { test, child } => Ok(SqlNode::If {
            test,
            child: Box::new(lower_parameters(*child)?),
        }),
        SqlNode::Choose { whens, otherwise } => Ok(SqlNode::Choose {
            whens: whens
                .into_iter()
                .map(|(t, c)| Ok((t, lower_parameters(c)?)))
                .collect::<MapperResult<_>>()?,
            otherwise: otherwise.map(|c| lower_parameters(*c)).transpose()?.map(Box::new),
        }),
        SqlNode::Where(child) => Ok(SqlNode::Where(Box::new(lower_parameters(*child)?))),
        SqlNode::Set(child) => Ok(SqlNode::Set(Box::new(lower_parameters(*child)?))),
        SqlNode::Trim { child, prefix, prefix_overrides, suffix, suffix_overrides } => Ok(SqlNode::Trim {
            child: Box::new(lower_parameters(*child)?),
            prefix,
            prefix_overrides,
            suffix,
            suffix_overrides,
        }),
        SqlNode::ForEach { child, collection, item, index, open, close, separator } => Ok(SqlNode::ForEach {
            child: Box::new(lower_parameters(*child)?),
            collection,
            item,
            index,
            open,
            close,
            separator,
        }),
        other @ (SqlNode::Parameter { .. } | SqlNode::VarDecl { .. }) => Ok(other),
    }
}

fn rewrap_substitution(node: SqlNode) -> MapperResult<SqlNode> {
    // `${…}` text never contains `#{…}`, so a StaticText-only result from
    // lower_text means there were no `#{…}` tokens; otherwise it became Mixed.
    match node {
        SqlNode::StaticText(text) => Ok(SqlNode::TextWithSubstitution(text)),
        other => Ok(other),
    }
}

fn lower_text(text: &str) -> MapperResult<SqlNode> {
    if !text.contains("#{") {
        return Ok(SqlNode::StaticText(text.to_string()));
    }
    let mut nodes = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        if start > 0 {
            nodes.push(SqlNode::StaticText(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| MapperError::build(format!("unterminated '#{{' token in '{text}'")))?;
        let body = &after[..end];
        let (expression, jdbc_type, handler) = parse_parameter_body(body)?;
        nodes.push(SqlNode::Parameter { expression, jdbc_type, handler });
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        nodes.push(SqlNode::StaticText(rest.to_string()));
    }
    if nodes.len() == 1 {
        Ok(nodes.into_iter().next().unwrap())
    } else {
        Ok(SqlNode::Mixed(nodes))
    }
}

fn parse_parameter_body(body: &str) -> MapperResult<(String, Option<JdbcType>, Option<String>)> {
    let mut parts = body.split(',');
    let expression = parts
        .next()
        .ok_or_else(|| MapperError::build("empty '#{}' token"))?
        .trim()
        .to_string();
    let mut jdbc_type = None;
    let mut handler = None;
    for qualifier in parts {
        let qualifier = qualifier.trim();
        if let Some(value) = qualifier.strip_prefix("jdbcType=") {
            jdbc_type = Some(JdbcType::parse(value.trim()).ok_or_else(|| {
                MapperError::build(format!("unknown jdbcType '{value}' in '#{{{body}}}'"))
            })?);
        } else if let Some(value) = qualifier.strip_prefix("handler=") {
            handler = Some(value.trim().to_string());
        } else if !qualifier.is_empty() {
            return Err(MapperError::build(format!("unknown '#{{}}' qualifier '{qualifier}'")));
        }
    }
    Ok((expression, jdbc_type, handler))
}
