//! Documentation block and type expression parsing.
//!
//! Annotations are the richest type signal available: native declarations say
//! `array` or `Collection`, the doc block says `Collection<int, Post>`. Both go
//! through [`TypeDescriptor::parse`] so the classifier only ever sees one shape.
//!
//! # Example
//!
//! ```
//! use route_schema_gen::docblock::{DocBlock, TypeDescriptor};
//!
//! let doc = DocBlock::parse("/**\n * Show a user.\n *\n * @return UserResource|null\n */");
//! assert_eq!(doc.summary.as_deref(), Some("Show a user."));
//!
//! let ty = TypeDescriptor::parse(doc.return_type().unwrap()).unwrap();
//! assert_eq!(ty.to_string(), "UserResource|null");
//! ```

use crate::error::{Error, Result};
use std::fmt;

/// Parsed type expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// Primitive keyword or (possibly unqualified) class name
    Named(String),
    /// `?T`
    Nullable(Box<TypeDescriptor>),
    /// `A|B|...`
    Union(Vec<TypeDescriptor>),
    /// `T[]`, `list<T>`, `array<K, T>`, `iterable<T>`
    List(Box<TypeDescriptor>),
    /// `Base<A, B>` for any other base
    Generic { base: String, args: Vec<TypeDescriptor> },
    /// `array{key: T, other?: U}`
    Shape(Vec<ShapeEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeEntry {
    pub key: String,
    pub optional: bool,
    pub value: TypeDescriptor,
}

const LIST_BASES: &[&str] = &[
    "array",
    "list",
    "iterable",
    "non-empty-array",
    "non-empty-list",
];

impl TypeDescriptor {
    /// Parses a type expression; malformed input is an unknown type.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = TypeParser {
            source: text,
            chars: text.chars().collect(),
            pos: 0,
        };
        let ty = parser.union()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error());
        }
        Ok(ty)
    }

    pub fn named(name: &str) -> Self {
        TypeDescriptor::Named(name.to_string())
    }

    /// True for the `null` keyword.
    pub fn is_null(&self) -> bool {
        matches!(self, TypeDescriptor::Named(name) if name.eq_ignore_ascii_case("null"))
    }

    /// Splits this descriptor into its non-null members and whether `null`
    /// was among them. Nested unions and `?T` are flattened.
    pub fn members(&self) -> (Vec<&TypeDescriptor>, bool) {
        let mut members = Vec::new();
        let mut nullable = false;
        self.collect_members(&mut members, &mut nullable);
        (members, nullable)
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a TypeDescriptor>, nullable: &mut bool) {
        match self {
            TypeDescriptor::Union(members) => {
                for member in members {
                    member.collect_members(out, nullable);
                }
            }
            TypeDescriptor::Nullable(inner) => {
                *nullable = true;
                inner.collect_members(out, nullable);
            }
            ty if ty.is_null() => *nullable = true,
            ty => out.push(ty),
        }
    }

    /// Base name for named and generic descriptors.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Named(name) => Some(name),
            TypeDescriptor::Generic { base, .. } => Some(base),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Named(name) => write!(f, "{}", name),
            TypeDescriptor::Nullable(inner) => write!(f, "?{}", inner),
            TypeDescriptor::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            TypeDescriptor::List(inner) => match inner.as_ref() {
                TypeDescriptor::Union(_) | TypeDescriptor::Nullable(_) => write!(f, "({})[]", inner),
                _ => write!(f, "{}[]", inner),
            },
            TypeDescriptor::Generic { base, args } => {
                write!(f, "{}<", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeDescriptor::Shape(entries) => {
                write!(f, "array{{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let optional = if entry.optional { "?" } else { "" };
                    write!(f, "{}{}: {}", entry.key, optional, entry.value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

struct TypeParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl TypeParser<'_> {
    fn error(&self) -> Error {
        Error::unknown_type("type expression", self.source)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn union(&mut self) -> Result<TypeDescriptor> {
        let mut members = vec![self.postfix()?];
        while self.eat('|') {
            members.push(self.postfix()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeDescriptor::Union(members)
        })
    }

    fn postfix(&mut self) -> Result<TypeDescriptor> {
        let mut ty = self.atom()?;
        loop {
            self.skip_ws();
            if self.peek() == Some('[') && self.chars.get(self.pos + 1) == Some(&']') {
                self.pos += 2;
                ty = TypeDescriptor::List(Box::new(ty));
            } else {
                return Ok(ty);
            }
        }
    }

    fn atom(&mut self) -> Result<TypeDescriptor> {
        self.skip_ws();
        match self.peek() {
            Some('?') => {
                self.pos += 1;
                Ok(TypeDescriptor::Nullable(Box::new(self.postfix()?)))
            }
            Some('(') => {
                self.pos += 1;
                let inner = self.union()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('\'') | Some('"') => {
                self.quoted()?;
                Ok(TypeDescriptor::named("string"))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.')
                {
                    self.pos += 1;
                }
                Ok(TypeDescriptor::named("int"))
            }
            Some(c) if is_name_char(c) => {
                let name = self.name();
                self.after_name(name)
            }
            _ => Err(self.error()),
        }
    }

    fn after_name(&mut self, name: String) -> Result<TypeDescriptor> {
        let is_list = LIST_BASES.contains(&name.to_ascii_lowercase().as_str());
        if self.peek() == Some('<') {
            self.pos += 1;
            let mut args = vec![self.union()?];
            while self.eat(',') {
                args.push(self.union()?);
            }
            self.expect('>')?;
            if is_list {
                let last = args.pop().ok_or_else(|| self.error())?;
                return Ok(TypeDescriptor::List(Box::new(last)));
            }
            return Ok(TypeDescriptor::Generic { base: name, args });
        }
        if self.peek() == Some('{') && is_list {
            self.pos += 1;
            return self.shape();
        }
        Ok(TypeDescriptor::Named(name))
    }

    fn shape(&mut self) -> Result<TypeDescriptor> {
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            if self.peek() == Some('.') {
                // `...` marks an unsealed shape
                while self.peek() == Some('.') {
                    self.pos += 1;
                }
                self.eat(',');
                continue;
            }
            let key = match self.peek() {
                Some('\'') | Some('"') => self.quoted()?,
                Some(c) if is_name_char(c) || c.is_ascii_digit() => self.name(),
                _ => return Err(self.error()),
            };
            let optional = self.eat('?');
            self.expect(':')?;
            let value = self.union()?;
            entries.push(ShapeEntry {
                key,
                optional,
                value,
            });
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(TypeDescriptor::Shape(entries))
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| is_name_char(c) || c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        let mut value = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                return Ok(value);
            }
            value.push(c);
        }
        Err(self.error())
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '\\' || c == '-' || c == '$'
}

/// One `@name body` line of a doc block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTag {
    pub name: String,
    pub body: String,
}

/// `@param Type $name description`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTag {
    pub ty: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

/// `@throws Type description`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowsTag {
    pub ty: String,
    pub description: Option<String>,
}

/// `@property Type $name` and `@property-read Type $name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTag {
    pub ty: String,
    pub name: String,
    pub read_only: bool,
}

/// Parsed documentation block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocBlock {
    /// First paragraph of prose
    pub summary: Option<String>,
    /// Remaining prose
    pub description: Option<String>,
    /// Tags in declaration order
    pub tags: Vec<DocTag>,
}

impl DocBlock {
    /// Parses a `/** ... */` comment. Delimiters and leading `*` are optional.
    pub fn parse(text: &str) -> Self {
        let mut paragraphs: Vec<Vec<String>> = vec![Vec::new()];
        let mut tags: Vec<DocTag> = Vec::new();

        for raw in text.lines() {
            let line = clean_line(raw);
            if let Some(rest) = line.strip_prefix('@') {
                let (name, body) = match rest.find(char::is_whitespace) {
                    Some(split) => (&rest[..split], rest[split..].trim()),
                    None => (rest, ""),
                };
                tags.push(DocTag {
                    name: name.to_string(),
                    body: body.to_string(),
                });
            } else if let Some(tag) = tags.last_mut() {
                if !line.is_empty() {
                    if !tag.body.is_empty() {
                        tag.body.push(' ');
                    }
                    tag.body.push_str(line);
                }
            } else if line.is_empty() {
                if paragraphs.last().is_some_and(|p| !p.is_empty()) {
                    paragraphs.push(Vec::new());
                }
            } else if let Some(paragraph) = paragraphs.last_mut() {
                paragraph.push(line.to_string());
            }
        }

        let mut prose = paragraphs
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.join(" "));
        let summary = prose.next();
        let rest: Vec<String> = prose.collect();
        let description = if rest.is_empty() {
            None
        } else {
            Some(rest.join("\n\n"))
        };

        DocBlock {
            summary,
            description,
            tags,
        }
    }

    pub fn tag_bodies<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.name == name)
            .map(|tag| tag.body.as_str())
    }

    /// Value of the first `@id` tag
    pub fn id(&self) -> Option<&str> {
        self.tag_bodies("id")
            .filter_map(|body| body.split_whitespace().next())
            .next()
    }

    /// Values of every `@tag` tag
    pub fn tag_names(&self) -> Vec<String> {
        self.tag_bodies("tag")
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Type text of the first `@return` tag
    pub fn return_type(&self) -> Option<&str> {
        self.return_types().next()
    }

    /// Type texts of every `@return` tag, in declaration order
    pub fn return_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.tag_bodies("return")
            .map(|body| split_type(body).0)
            .filter(|ty| !ty.is_empty())
    }

    pub fn params(&self) -> Vec<ParamTag> {
        self.tag_bodies("param")
            .filter_map(|body| {
                let (ty, rest) = if body.starts_with('$') {
                    ("", body)
                } else {
                    split_type(body)
                };
                let (name, description) = split_word(rest);
                let name = name.strip_prefix('$')?;
                Some(ParamTag {
                    ty: non_empty(ty),
                    name: name.to_string(),
                    description: non_empty(description),
                })
            })
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<ParamTag> {
        self.params().into_iter().find(|param| param.name == name)
    }

    pub fn throws(&self) -> Vec<ThrowsTag> {
        self.tag_bodies("throws")
            .filter_map(|body| {
                let (ty, rest) = split_type(body);
                Some(ThrowsTag {
                    ty: non_empty(ty)?,
                    description: non_empty(rest),
                })
            })
            .collect()
    }

    pub fn properties(&self) -> Vec<PropertyTag> {
        self.tags
            .iter()
            .filter(|tag| tag.name == "property" || tag.name == "property-read")
            .filter_map(|tag| {
                let (ty, rest) = split_type(&tag.body);
                let (name, _) = split_word(rest);
                Some(PropertyTag {
                    ty: non_empty(ty)?,
                    name: name.strip_prefix('$')?.to_string(),
                    read_only: tag.name == "property-read",
                })
            })
            .collect()
    }

    pub fn mixins(&self) -> Vec<&str> {
        self.tag_bodies("mixin")
            .map(|body| split_type(body).0)
            .filter(|ty| !ty.is_empty())
            .collect()
    }

    /// Type text of the first `@var` tag
    pub fn var_type(&self) -> Option<&str> {
        self.tag_bodies("var")
            .map(|body| split_type(body).0)
            .find(|ty| !ty.is_empty())
    }
}

fn clean_line(raw: &str) -> &str {
    let mut line = raw.trim();
    line = line.strip_prefix("/**").unwrap_or(line);
    line = line.strip_suffix("*/").unwrap_or(line);
    line = line.trim_start();
    line = line.strip_prefix('*').unwrap_or(line);
    line.trim()
}

/// Splits a tag body into its leading type expression and the remainder.
/// Whitespace inside `<>`, `{}` or `()` belongs to the type.
pub fn split_type(body: &str) -> (&str, &str) {
    let body = body.trim();
    let mut depth = 0i32;
    let mut previous = ' ';
    for (i, c) in body.char_indices() {
        match c {
            '<' | '{' | '(' => depth += 1,
            '>' | '}' | ')' => depth -= 1,
            c if c.is_whitespace() && depth <= 0 && previous != '|' && previous != ',' => {
                let rest = body[i..].trim_start();
                if rest.starts_with('|') {
                    previous = c;
                    continue;
                }
                return (&body[..i], rest);
            }
            _ => {}
        }
        if !c.is_whitespace() {
            previous = c;
        }
    }
    (body, "")
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
