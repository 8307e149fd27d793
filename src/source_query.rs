//! Static queries over method bodies and property initialisers.
//!
//! When no type signal exists, field names are recovered from source text: the
//! keys of an array literal returned by `toArray()` or `rules()`, the class
//! passed to `$this->hasMany(...)`, the string returned by `getTable()`. The
//! engine only talks to the [`SourceQuery`] trait; [`LiteralScanner`] is a small
//! tokenizer for the expression subset these lookups need.

use indexmap::IndexMap;

/// Literal expression recovered from source
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(String),
    /// Bare constant such as `true`, `null` or `Foo::BAR`
    Const(String),
    /// `Foo::class`
    ClassRef(String),
    /// `$name`, stored without the sigil
    Var(String),
    Array(Vec<ArrayItem>),
    /// `$this->name(args)`
    SelfCall { name: String, args: Vec<Expr> },
    /// Anything this scanner does not model
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// A `$this->name(...)` call found in a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfMethodCall {
    pub name: String,
    /// Literal rendering of each argument (`Foo::class` → `Foo`, non-literals → `unknown`)
    pub arg_literals: Vec<String>,
}

impl Expr {
    /// Literal text of this expression, as used for call arguments.
    pub fn literal(&self) -> String {
        match self {
            Expr::ClassRef(name) | Expr::Str(name) | Expr::Num(name) => name.clone(),
            Expr::Var(name) => format!("${}", name),
            _ => "unknown".to_string(),
        }
    }

    fn as_key(&self) -> Option<String> {
        match self {
            Expr::Str(value) | Expr::Num(value) => Some(value.clone()),
            _ => None,
        }
    }
}

pub trait SourceQuery {
    /// Every expression following a `return` keyword in `body`.
    fn returned_expressions(&self, body: &str) -> Vec<Expr>;

    /// The single expression an initialiser consists of.
    fn initializer(&self, text: &str) -> Option<Expr>;

    /// Every `$this->name(args)` call in `body`, in source order.
    fn self_method_calls(&self, body: &str) -> Vec<SelfMethodCall>;

    /// Literal keys of the associative arrays returned by `body`.
    fn returned_literal_keys(&self, body: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for expr in self.returned_expressions(body) {
            if let Expr::Array(items) = expr {
                for item in items {
                    if let Some(key) = item.key.as_ref().and_then(Expr::as_key) {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys
    }

    /// String values of the list arrays returned by `body`.
    fn returned_literal_values(&self, body: &str) -> Vec<String> {
        self.returned_expressions(body)
            .into_iter()
            .filter_map(|expr| match expr {
                Expr::Array(items) => Some(string_values(&items)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// First string literal returned by `body`.
    fn returned_string(&self, body: &str) -> Option<String> {
        self.returned_expressions(body)
            .into_iter()
            .find_map(|expr| match expr {
                Expr::Str(value) => Some(value),
                _ => None,
            })
    }

    /// `key => value` pairs of the first associative array returned by `body`,
    /// keeping only string and constant values.
    fn returned_assoc(&self, body: &str) -> IndexMap<String, String> {
        self.returned_expressions(body)
            .into_iter()
            .find_map(|expr| match expr {
                Expr::Array(items) => Some(assoc_pairs(&items)),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// String values of an array literal's items.
pub fn string_values(items: &[ArrayItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match &item.value {
            Expr::Str(value) => Some(value.clone()),
            _ => None,
        })
        .collect()
}

/// String-keyed pairs of an array literal; class references are left out.
pub fn assoc_pairs(items: &[ArrayItem]) -> IndexMap<String, String> {
    items
        .iter()
        .filter_map(|item| {
            let key = item.key.as_ref()?.as_key()?;
            let value = match &item.value {
                Expr::Str(value) | Expr::Const(value) => value.clone(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}

/// Tokenizing implementation of [`SourceQuery`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralScanner;

impl SourceQuery for LiteralScanner {
    fn returned_expressions(&self, body: &str) -> Vec<Expr> {
        let tokens = tokenize(body);
        let mut exprs = Vec::new();
        let mut pos = 0;
        while pos < tokens.len() {
            if matches!(&tokens[pos], Token::Ident(word) if word.eq_ignore_ascii_case("return")) {
                let mut parser = ExprParser {
                    tokens: &tokens,
                    pos: pos + 1,
                };
                exprs.push(parser.expr());
                pos = parser.pos.max(pos + 1);
            } else {
                pos += 1;
            }
        }
        exprs
    }

    fn initializer(&self, text: &str) -> Option<Expr> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return None;
        }
        let mut parser = ExprParser {
            tokens: &tokens,
            pos: 0,
        };
        Some(parser.expr())
    }

    fn self_method_calls(&self, body: &str) -> Vec<SelfMethodCall> {
        let tokens = tokenize(body);
        let mut calls = Vec::new();
        for pos in 0..tokens.len() {
            if let Some((name, args)) = self_call_at(&tokens, pos) {
                calls.push(SelfMethodCall {
                    name,
                    arg_literals: args.iter().map(Expr::literal).collect(),
                });
            }
        }
        calls
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Num(String),
    Ident(String),
    Var(String),
    /// `=>`
    FatArrow,
    /// `->` or `?->`
    Arrow,
    /// `::`
    Scope,
    Open(char),
    Close(char),
    Comma,
    Semicolon,
    Punct(char),
}

fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c == '#' || (c == '/' && next == Some('/')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
        } else if c == '\'' || c == '"' {
            let mut value = String::new();
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                }
                value.push(chars[i]);
                i += 1;
            }
            i += 1;
            tokens.push(Token::Str(value));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Num(chars[start..i].iter().collect()));
        } else if c == '$' {
            let start = i + 1;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Var(chars[start..i].iter().collect()));
        } else if c.is_alphabetic() || c == '_' || c == '\\' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '\\') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '=' && next == Some('>') {
            tokens.push(Token::FatArrow);
            i += 2;
        } else if c == '-' && next == Some('>') {
            tokens.push(Token::Arrow);
            i += 2;
        } else if c == '?' && next == Some('-') && chars.get(i + 2) == Some(&'>') {
            tokens.push(Token::Arrow);
            i += 3;
        } else if c == ':' && next == Some(':') {
            tokens.push(Token::Scope);
            i += 2;
        } else if c == '(' || c == '[' || c == '{' {
            tokens.push(Token::Open(c));
            i += 1;
        } else if c == ')' || c == ']' || c == '}' {
            tokens.push(Token::Close(c));
            i += 1;
        } else if c == ',' {
            tokens.push(Token::Comma);
            i += 1;
        } else if c == ';' {
            tokens.push(Token::Semicolon);
            i += 1;
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }

    tokens
}

/// Matches `$this -> name (` at `pos` and parses the call's arguments.
fn self_call_at(tokens: &[Token], pos: usize) -> Option<(String, Vec<Expr>)> {
    match (tokens.get(pos), tokens.get(pos + 1), tokens.get(pos + 2), tokens.get(pos + 3)) {
        (Some(Token::Var(this)), Some(Token::Arrow), Some(Token::Ident(name)), Some(Token::Open('(')))
            if this == "this" =>
        {
            let mut parser = ExprParser {
                tokens,
                pos: pos + 4,
            };
            let args = parser.items(')').into_iter().map(|item| item.value).collect();
            Some((name.clone(), args))
        }
        _ => None,
    }
}

struct ExprParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.peek(),
            None | Some(Token::Comma)
                | Some(Token::Semicolon)
                | Some(Token::FatArrow)
                | Some(Token::Close(_))
        )
    }

    /// Parses one expression; anything followed by operators collapses to `Other`.
    fn expr(&mut self) -> Expr {
        let primary = self.primary();
        if self.at_terminator() {
            primary
        } else {
            self.skip_to_terminator();
            Expr::Other
        }
    }

    fn primary(&mut self) -> Expr {
        let Some(token) = self.peek().cloned() else {
            return Expr::Other;
        };
        match token {
            Token::Str(value) => {
                self.pos += 1;
                Expr::Str(value)
            }
            Token::Num(value) => {
                self.pos += 1;
                Expr::Num(value)
            }
            Token::Open('[') => {
                self.pos += 1;
                Expr::Array(self.items(']'))
            }
            Token::Ident(word)
                if word.eq_ignore_ascii_case("array") && self.peek_at(1) == Some(&Token::Open('(')) =>
            {
                self.pos += 2;
                Expr::Array(self.items(')'))
            }
            Token::Ident(word) => {
                self.pos += 1;
                if self.peek() == Some(&Token::Scope) {
                    if let Some(Token::Ident(member)) = self.peek_at(1).cloned() {
                        self.pos += 2;
                        if member.eq_ignore_ascii_case("class") {
                            return Expr::ClassRef(word);
                        }
                        return Expr::Const(format!("{}::{}", word, member));
                    }
                }
                if self.peek() == Some(&Token::Open('(')) {
                    return Expr::Other;
                }
                Expr::Const(word)
            }
            Token::Var(name) => {
                if let Some((call, args)) = self_call_at(self.tokens, self.pos) {
                    // skip `$this -> name (` and the balanced argument list
                    self.pos += 3;
                    self.skip_group();
                    return Expr::SelfCall { name: call, args };
                }
                self.pos += 1;
                Expr::Var(name)
            }
            _ => Expr::Other,
        }
    }

    /// Parses array items or call arguments up to the `close` delimiter.
    fn items(&mut self, close: char) -> Vec<ArrayItem> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::Close(c)) => {
                    let matched = *c == close;
                    self.pos += 1;
                    if matched {
                        break;
                    }
                    continue;
                }
                Some(Token::Comma) => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }
            let first = self.expr();
            if self.peek() == Some(&Token::FatArrow) {
                self.pos += 1;
                let value = self.expr();
                items.push(ArrayItem {
                    key: Some(first),
                    value,
                });
            } else {
                items.push(ArrayItem {
                    key: None,
                    value: first,
                });
            }
        }
        items
    }

    /// Skips a balanced group starting at an opening token.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Open(_) => depth += 1,
                Token::Close(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_to_terminator(&mut self) {
        while !self.at_terminator() {
            if matches!(self.peek(), Some(Token::Open(_))) {
                self.skip_group();
            } else {
                self.pos += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_returned_literal_keys() {
        let body = r#"
            // shape of the user payload
            return [
                'id' => $this->id,
                "name" => $this->name,
                'posts' => PostResource::collection($this->whenLoaded('posts')),
            ];
        "#;
        assert_eq!(
            LiteralScanner.returned_literal_keys(body),
            vec!["id", "name", "posts"]
        );
    }

    #[test]
    fn test_rules_keys_with_array_syntax() {
        let body = "return array('email' => 'required|email', 'password' => ['required', 'min:8']);";
        assert_eq!(
            LiteralScanner.returned_literal_keys(body),
            vec!["email", "password"]
        );
    }

    #[test]
    fn test_returned_values_and_string() {
        assert_eq!(
            LiteralScanner.returned_literal_values("return ['password', 'remember_token'];"),
            vec!["password", "remember_token"]
        );
        assert_eq!(
            LiteralScanner.returned_string("/* legacy */ return 'members';"),
            Some("members".to_string())
        );
        assert_eq!(LiteralScanner.returned_string("return $this->table;"), None);
    }

    #[test]
    fn test_returned_assoc_skips_class_refs() {
        let body = "return ['born_at' => 'datetime', 'options' => AsCollection::class, 'price' => 'decimal:2'];";
        let assoc = LiteralScanner.returned_assoc(body);
        assert_eq!(assoc.len(), 2);
        assert_eq!(assoc["born_at"], "datetime");
        assert_eq!(assoc["price"], "decimal:2");
    }

    #[test]
    fn test_self_method_calls() {
        let body = "return $this->hasMany(Post::class, 'author_id')->latest($column);";
        let calls = LiteralScanner.self_method_calls(body);
        assert_eq!(
            calls,
            vec![SelfMethodCall {
                name: "hasMany".to_string(),
                arg_literals: vec!["Post".to_string(), "author_id".to_string()],
            }]
        );
    }

    #[test]
    fn test_self_call_with_non_literal_argument() {
        let calls = LiteralScanner.self_method_calls("return $this->belongsTo($this->relatedClass(), $key);");
        assert_eq!(calls[0].name, "belongsTo");
        assert_eq!(calls[0].arg_literals, vec!["unknown", "$key"]);
        assert_eq!(calls[1].name, "relatedClass");
    }

    #[test]
    fn test_initializer() {
        assert_eq!(
            LiteralScanner.initializer("['name', 'email']"),
            Some(Expr::Array(vec![
                ArrayItem {
                    key: None,
                    value: Expr::Str("name".to_string()),
                },
                ArrayItem {
                    key: None,
                    value: Expr::Str("email".to_string()),
                },
            ]))
        );
        assert_eq!(
            LiteralScanner.initializer("\\App\\Http\\Resources\\PostResource::class"),
            Some(Expr::ClassRef("\\App\\Http\\Resources\\PostResource".to_string()))
        );
        assert_eq!(LiteralScanner.initializer("  "), None);
    }

    #[test]
    fn test_non_literal_return_is_other() {
        let exprs = LiteralScanner.returned_expressions("return 'a' . $suffix;");
        assert_eq!(exprs, vec![Expr::Other]);
    }
}
