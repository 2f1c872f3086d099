//! Recursive-descent template parser
//!
//! One call parses one file into its main tree plus every `define`/`block`
//! tree the file introduces.

use std::rc::Rc;

use crate::ast::{
    Action, Argument, ArgumentKind, Branch, Command, Node, Number, NumberValue, Pipeline, Pos,
    TemplateCall, Tree,
};
use crate::error::ParseError;
use crate::functions;
use crate::lexer::{Keyword, LexError, Token, TokenKind, tokenize};
use crate::suggestions::{suggest_undefined_variable, suggest_unknown_function};
use crate::value::parse_go_int;

/// Parse a template file; the first tree is the file itself
pub fn parse(name: &str, source: &str) -> Result<Vec<Tree>, ParseError> {
    let tokens = tokenize(source).map_err(|LexError { message, pos }| {
        ParseError::new(name, source, pos, message)
    })?;
    let mut parser = Parser {
        name,
        src: source,
        shared: Rc::from(source),
        tokens,
        index: 0,
        vars: vec!["$".to_string()],
        range_depth: 0,
        defined: Vec::new(),
    };
    let root = parser.parse_root()?;
    let mut trees = vec![Tree {
        name: name.to_string(),
        parse_name: name.to_string(),
        source: parser.shared.clone(),
        root,
    }];
    trees.append(&mut parser.defined);
    Ok(trees)
}

/// What `action` produced: a node, or a marker that closes a list
enum Item {
    Node(Node),
    End(Pos),
    Else {
        pos: Pos,
        /// `else if` / `else with`: the keyword was left for the nested control
        chain: Option<Keyword>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    If,
    Range,
    With,
}

impl Context {
    fn as_str(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Range => "range",
            Self::With => "with",
        }
    }
}

struct Parser<'a> {
    name: &'a str,
    src: &'a str,
    shared: Rc<str>,
    tokens: Vec<Token<'a>>,
    index: usize,
    /// Variables in scope, innermost last
    vars: Vec<String>,
    range_depth: usize,
    defined: Vec<Tree>,
}

type PResult<T> = Result<T, ParseError>;

fn describe(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::Eof => "EOF".to_string(),
        TokenKind::Keyword(k) => format!("<{}>", k.as_str()),
        _ if token.text.chars().count() > 10 => {
            let head: String = token.text.chars().take(10).collect();
            format!("{:?}...", head)
        }
        _ => format!("{:?}", token.text),
    }
}

impl<'a> Parser<'a> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> ParseError {
        ParseError::new(self.name, self.src, pos, message)
    }

    fn unexpected(&self, token: &Token<'_>, context: &str) -> ParseError {
        self.error(
            token.pos,
            format!("unexpected {} in {}", describe(token), context),
        )
    }

    fn next(&mut self) -> Token<'a> {
        let token = self.tokens[self.index.min(self.tokens.len() - 1)];
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn peek(&self) -> Token<'a> {
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn backup(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    fn next_non_space(&mut self) -> Token<'a> {
        loop {
            let token = self.next();
            if token.kind != TokenKind::Space {
                return token;
            }
        }
    }

    fn peek_non_space(&mut self) -> Token<'a> {
        let token = self.next_non_space();
        self.backup();
        token
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token<'a>> {
        let token = self.next_non_space();
        if token.kind != kind {
            return Err(self.unexpected(&token, context));
        }
        Ok(token)
    }

    fn parse_root(&mut self) -> PResult<Vec<Node>> {
        let mut root = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            if self.peek().kind == TokenKind::LeftDelim {
                let mark = self.index;
                self.next();
                if self.next_non_space().kind == TokenKind::Keyword(Keyword::Define) {
                    self.parse_definition()?;
                    continue;
                }
                self.index = mark;
            }
            match self.text_or_action()? {
                Item::Node(node) => root.push(node),
                Item::End(pos) => return Err(self.error(pos, "unexpected {{end}}")),
                Item::Else { pos, .. } => return Err(self.error(pos, "unexpected {{else}}")),
            }
        }
        Ok(root)
    }

    /// Parse a nested tree body with its own variable scope
    fn nested_tree<T>(&mut self, body: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let range_depth = std::mem::replace(&mut self.range_depth, 0);
        let result = body(self);
        self.vars = vars;
        self.range_depth = range_depth;
        result
    }

    fn add_tree(&mut self, name: String, root: Vec<Node>) {
        self.defined.push(Tree {
            name,
            parse_name: self.name.to_string(),
            source: self.shared.clone(),
            root,
        });
    }

    fn parse_definition(&mut self) -> PResult<()> {
        const CONTEXT: &str = "define clause";
        let token = self.next_non_space();
        let name = self.template_name(&token, CONTEXT)?;
        self.expect(TokenKind::RightDelim, CONTEXT)?;
        let root = self.nested_tree(|p| {
            let (list, end) = p.item_list()?;
            match end {
                Item::End(_) => Ok(list),
                Item::Else { pos, .. } => {
                    Err(p.error(pos, format!("unexpected {{{{else}}}} in {}", CONTEXT)))
                }
                Item::Node(_) => Err(p.error(token.pos, "unexpected node")),
            }
        })?;
        self.add_tree(name, root);
        Ok(())
    }

    fn template_name(&self, token: &Token<'_>, context: &str) -> PResult<String> {
        match token.kind {
            TokenKind::String | TokenKind::RawString => self.unquote(token),
            _ => Err(self.unexpected(token, context)),
        }
    }

    /// Nodes up to (and returning) the closing `{{end}}` or `{{else}}`
    fn item_list(&mut self) -> PResult<(Vec<Node>, Item)> {
        let mut list = Vec::new();
        while self.peek_non_space().kind != TokenKind::Eof {
            match self.text_or_action()? {
                Item::Node(node) => list.push(node),
                closing => return Ok((list, closing)),
            }
        }
        let eof = self.peek();
        Err(self.error(eof.pos, "unexpected EOF"))
    }

    fn text_or_action(&mut self) -> PResult<Item> {
        let token = self.next_non_space();
        match token.kind {
            TokenKind::Text => Ok(Item::Node(Node::Text(token.text.to_string()))),
            TokenKind::LeftDelim => self.action(),
            _ => Err(self.unexpected(&token, "input")),
        }
    }

    fn action(&mut self) -> PResult<Item> {
        let token = self.next_non_space();
        match token.kind {
            TokenKind::Keyword(Keyword::Block) => return self.block_control(),
            TokenKind::Keyword(Keyword::Break) => return self.loop_control(token, Keyword::Break),
            TokenKind::Keyword(Keyword::Continue) => {
                return self.loop_control(token, Keyword::Continue);
            }
            TokenKind::Keyword(Keyword::Else) => return self.else_control(),
            TokenKind::Keyword(Keyword::End) => {
                self.expect(TokenKind::RightDelim, "end")?;
                return Ok(Item::End(token.pos));
            }
            TokenKind::Keyword(Keyword::If) => return self.control(Context::If),
            TokenKind::Keyword(Keyword::Range) => return self.control(Context::Range),
            TokenKind::Keyword(Keyword::With) => return self.control(Context::With),
            TokenKind::Keyword(Keyword::Template) => return self.template_control(),
            _ => {}
        }
        self.backup();
        let pos = self.peek().pos;
        let pipe = self.pipeline("command", TokenKind::RightDelim)?;
        Ok(Item::Node(Node::Action(Action { pos, pipe })))
    }

    fn loop_control(&mut self, token: Token<'a>, keyword: Keyword) -> PResult<Item> {
        let context = format!("{{{{{}}}}}", keyword.as_str());
        let next = self.next_non_space();
        if next.kind != TokenKind::RightDelim {
            return Err(self.unexpected(&next, &context));
        }
        if self.range_depth == 0 {
            return Err(self.error(token.pos, format!("{} outside {{{{range}}}}", context)));
        }
        Ok(Item::Node(match keyword {
            Keyword::Break => Node::Break(token.pos),
            _ => Node::Continue(token.pos),
        }))
    }

    fn else_control(&mut self) -> PResult<Item> {
        let peek = self.peek_non_space();
        if let TokenKind::Keyword(k @ (Keyword::If | Keyword::With)) = peek.kind {
            return Ok(Item::Else {
                pos: peek.pos,
                chain: Some(k),
            });
        }
        let token = self.expect(TokenKind::RightDelim, "else")?;
        Ok(Item::Else {
            pos: token.pos,
            chain: None,
        })
    }

    fn control(&mut self, context: Context) -> PResult<Item> {
        let mark = self.vars.len();
        let result = self.parse_control(context);
        self.vars.truncate(mark);
        let branch = result?;
        Ok(Item::Node(match context {
            Context::If => Node::If(branch),
            Context::Range => Node::Range(branch),
            Context::With => Node::With(branch),
        }))
    }

    fn parse_control(&mut self, context: Context) -> PResult<Branch> {
        let pipe = self.pipeline(context.as_str(), TokenKind::RightDelim)?;
        if context == Context::Range {
            self.range_depth += 1;
        }
        let listed = self.item_list();
        if context == Context::Range {
            self.range_depth -= 1;
        }
        let (list, next) = listed?;

        let else_list = match next {
            Item::End(_) => None,
            Item::Else { chain: Some(keyword), pos } => {
                let nested = match (context, keyword) {
                    (Context::If, Keyword::If) => Context::If,
                    (Context::With, Keyword::With) => Context::With,
                    _ => {
                        return Err(self.error(
                            pos,
                            format!("unexpected <{}> in input", keyword.as_str()),
                        ));
                    }
                };
                self.next_non_space();
                match self.control(nested)? {
                    Item::Node(node) => Some(vec![node]),
                    _ => None,
                }
            }
            Item::Else { chain: None, .. } => {
                let (else_list, end) = self.item_list()?;
                match end {
                    Item::End(_) => Some(else_list),
                    Item::Else { pos, .. } => {
                        return Err(self.error(pos, "expected end; found {{else}}"));
                    }
                    Item::Node(_) => None,
                }
            }
            Item::Node(_) => None,
        };

        Ok(Branch {
            pos: pipe.pos,
            pipe,
            list,
            else_list,
        })
    }

    fn block_control(&mut self) -> PResult<Item> {
        const CONTEXT: &str = "block clause";
        let token = self.next_non_space();
        let name = self.template_name(&token, CONTEXT)?;
        let pipe = self.pipeline(CONTEXT, TokenKind::RightDelim)?;
        let root = self.nested_tree(|p| {
            let (list, end) = p.item_list()?;
            match end {
                Item::End(_) => Ok(list),
                Item::Else { pos, .. } => {
                    Err(p.error(pos, format!("unexpected {{{{else}}}} in {}", CONTEXT)))
                }
                Item::Node(_) => Err(p.error(token.pos, "unexpected node")),
            }
        })?;
        self.add_tree(name.clone(), root);
        Ok(Item::Node(Node::Template(TemplateCall {
            pos: token.pos,
            name,
            pipe: Some(pipe),
        })))
    }

    fn template_control(&mut self) -> PResult<Item> {
        const CONTEXT: &str = "template clause";
        let token = self.next_non_space();
        let name = self.template_name(&token, CONTEXT)?;
        let pipe = if self.next_non_space().kind != TokenKind::RightDelim {
            self.backup();
            Some(self.pipeline(CONTEXT, TokenKind::RightDelim)?)
        } else {
            None
        };
        Ok(Item::Node(Node::Template(TemplateCall {
            pos: token.pos,
            name,
            pipe,
        })))
    }

    fn pipeline(&mut self, context: &str, end: TokenKind) -> PResult<Pipeline> {
        let pos = self.peek_non_space().pos;
        let mut pipe = Pipeline {
            pos,
            decl: Vec::new(),
            is_assign: false,
            commands: Vec::new(),
        };

        self.declarations(&mut pipe, context)?;

        loop {
            let token = self.next_non_space();
            match token.kind {
                kind if kind == end => {
                    self.check_pipeline(&pipe, context, token.pos)?;
                    return Ok(pipe);
                }
                TokenKind::Bool
                | TokenKind::Char
                | TokenKind::Dot
                | TokenKind::Field
                | TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Nil
                | TokenKind::RawString
                | TokenKind::String
                | TokenKind::Variable
                | TokenKind::LeftParen => {
                    self.backup();
                    let command = self.command()?;
                    pipe.commands.push(command);
                }
                _ => return Err(self.unexpected(&token, context)),
            }
        }
    }

    fn declarations(&mut self, pipe: &mut Pipeline, context: &str) -> PResult<()> {
        loop {
            let mark = self.index;
            let var = self.next_non_space();
            if var.kind != TokenKind::Variable {
                self.index = mark;
                return Ok(());
            }
            let next = self.next_non_space();
            match next.kind {
                TokenKind::Declare | TokenKind::Assign => {
                    let is_assign = next.kind == TokenKind::Assign;
                    if is_assign && !self.vars.iter().any(|v| v == var.text) {
                        return Err(self.error(
                            var.pos,
                            format!("undefined variable {:?}", var.text),
                        ));
                    }
                    pipe.is_assign = is_assign;
                    pipe.decl.push(var.text.to_string());
                    self.vars.push(var.text.to_string());
                    return Ok(());
                }
                TokenKind::Comma => {
                    pipe.decl.push(var.text.to_string());
                    self.vars.push(var.text.to_string());
                    if context == "range" && pipe.decl.len() < 2 {
                        match self.peek_non_space().kind {
                            TokenKind::Variable => continue,
                            _ => {
                                let message = "range can only initialize variables";
                                return Err(self.error(next.pos, message));
                            }
                        }
                    }
                    return Err(
                        self.error(next.pos, format!("too many declarations in {}", context))
                    );
                }
                _ => {
                    if !pipe.decl.is_empty() {
                        return Err(self.unexpected(&next, context));
                    }
                    self.index = mark;
                    return Ok(());
                }
            }
        }
    }

    fn check_pipeline(&self, pipe: &Pipeline, context: &str, pos: Pos) -> PResult<()> {
        if pipe.commands.is_empty() {
            return Err(self.error(pos, format!("missing value for {}", context)));
        }
        for (i, cmd) in pipe.commands.iter().enumerate().skip(1) {
            let first = &cmd.args[0];
            if matches!(
                first.kind,
                ArgumentKind::Bool(_)
                    | ArgumentKind::Dot
                    | ArgumentKind::Nil
                    | ArgumentKind::Number(_)
                    | ArgumentKind::String(_)
            ) {
                return Err(self.error(
                    first.pos,
                    format!("non executable command in pipeline stage {}", i + 1),
                ));
            }
        }
        Ok(())
    }

    fn command(&mut self) -> PResult<Command> {
        let pos = self.peek_non_space().pos;
        let mut cmd = Command {
            pos,
            args: Vec::new(),
        };
        loop {
            self.peek_non_space();
            if let Some(operand) = self.operand()? {
                cmd.args.push(operand);
            }
            let token = self.next();
            match token.kind {
                TokenKind::Space => continue,
                TokenKind::RightDelim | TokenKind::RightParen => self.backup(),
                TokenKind::Pipe => {}
                _ => return Err(self.unexpected(&token, "operand")),
            }
            break;
        }
        if cmd.args.is_empty() {
            return Err(self.error(pos, "empty command"));
        }
        Ok(cmd)
    }

    fn operand(&mut self) -> PResult<Option<Argument>> {
        let node = match self.term()? {
            Some(node) => node,
            None => return Ok(None),
        };
        if self.peek().kind != TokenKind::Field {
            return Ok(Some(node));
        }

        let mut fields = Vec::new();
        while self.peek().kind == TokenKind::Field {
            fields.push(self.next().text[1..].to_string());
        }
        let pos = node.pos;
        let term = node.to_string();
        let kind = match node.kind {
            ArgumentKind::Field(mut path) => {
                path.extend(fields);
                ArgumentKind::Field(path)
            }
            ArgumentKind::Variable {
                name,
                fields: mut existing,
            } => {
                existing.extend(fields);
                ArgumentKind::Variable {
                    name,
                    fields: existing,
                }
            }
            ArgumentKind::Bool(_)
            | ArgumentKind::String(_)
            | ArgumentKind::Number(_)
            | ArgumentKind::Nil
            | ArgumentKind::Dot => {
                return Err(self.error(pos, format!("unexpected . after term {:?}", term)));
            }
            other => ArgumentKind::Chain {
                base: Box::new(Argument { pos, kind: other }),
                fields,
            },
        };
        Ok(Some(Argument { pos, kind }))
    }

    fn term(&mut self) -> PResult<Option<Argument>> {
        let token = self.next_non_space();
        let kind = match token.kind {
            TokenKind::Identifier => {
                if !functions::is_defined(token.text) {
                    return Err(self
                        .error(token.pos, format!("function {:?} not defined", token.text))
                        .with_suggestion(suggest_unknown_function(token.text)));
                }
                ArgumentKind::Identifier(token.text.to_string())
            }
            TokenKind::Dot => ArgumentKind::Dot,
            TokenKind::Nil => ArgumentKind::Nil,
            TokenKind::Variable => {
                if !self.vars.iter().any(|v| v == token.text) {
                    return Err(self
                        .error(token.pos, format!("undefined variable {:?}", token.text))
                        .with_suggestion(suggest_undefined_variable(token.text, &self.vars)));
                }
                ArgumentKind::Variable {
                    name: token.text.to_string(),
                    fields: Vec::new(),
                }
            }
            TokenKind::Field => ArgumentKind::Field(vec![token.text[1..].to_string()]),
            TokenKind::Bool => ArgumentKind::Bool(token.text == "true"),
            TokenKind::Number | TokenKind::Char => ArgumentKind::Number(self.number(&token)?),
            TokenKind::LeftParen => {
                let pipe = self.pipeline("parenthesized pipeline", TokenKind::RightParen)?;
                ArgumentKind::Pipeline(Box::new(pipe))
            }
            TokenKind::String | TokenKind::RawString => ArgumentKind::String(self.unquote(&token)?),
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(Argument {
            pos: token.pos,
            kind,
        }))
    }

    fn number(&self, token: &Token<'_>) -> PResult<Number> {
        let text = token.text;
        if token.kind == TokenKind::Char {
            let inner = &text[1..text.len() - 1];
            let mut chars = unescape(inner, '\'')
                .map_err(|m| self.error(token.pos, m))?
                .into_iter();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Number {
                    text: text.to_string(),
                    value: NumberValue::Int(i64::from(u32::from(c))),
                }),
                _ => Err(self.error(token.pos, format!("malformed character constant: {}", text))),
            };
        }

        let lower = text.to_ascii_lowercase();
        let is_hex = lower.trim_start_matches(['+', '-']).starts_with("0x");
        let float_like = if is_hex {
            lower.contains('p')
        } else {
            lower.contains(['.', 'e'])
        };
        if !float_like {
            return match parse_go_int(text) {
                Some(i) => Ok(Number {
                    text: text.to_string(),
                    value: NumberValue::Int(i),
                }),
                None => Err(self.error(token.pos, format!("illegal number syntax: {:?}", text))),
            };
        }
        if is_hex {
            return Err(self.error(token.pos, format!("illegal number syntax: {:?}", text)));
        }
        match text.replace('_', "").trim_start_matches('+').parse::<f64>() {
            Ok(f) => Ok(Number {
                text: text.to_string(),
                value: NumberValue::Float(f),
            }),
            Err(_) => Err(self.error(token.pos, format!("illegal number syntax: {:?}", text))),
        }
    }

    fn unquote(&self, token: &Token<'_>) -> PResult<String> {
        let text = token.text;
        let inner = &text[1..text.len() - 1];
        if token.kind == TokenKind::RawString {
            return Ok(inner.replace('\r', ""));
        }
        unescape(inner, '"')
            .map(|chars| chars.into_iter().collect())
            .map_err(|m| self.error(token.pos, m))
    }
}

/// Go escape sequences inside a quoted literal
fn unescape(inner: &str, quote: char) -> Result<Vec<char>, String> {
    let mut out = Vec::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let esc = chars.next().ok_or("invalid syntax")?;
        let decoded = match esc {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            c if c == quote => c,
            'x' | 'u' | 'U' => {
                let width = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..width).filter_map(|_| chars.next()).collect();
                if hex.len() != width {
                    return Err("invalid syntax".to_string());
                }
                let code = u32::from_str_radix(&hex, 16).map_err(|_| "invalid syntax")?;
                char::from_u32(code).ok_or("invalid syntax")?
            }
            '0'..='7' => {
                let mut code = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    let digit = chars
                        .next()
                        .and_then(|d| d.to_digit(8))
                        .ok_or("invalid syntax")?;
                    code = code * 8 + digit;
                }
                char::from_u32(code).ok_or("invalid syntax")?
            }
            _ => return Err("invalid syntax".to_string()),
        };
        out.push(decoded);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> Tree {
        parse("test", src).unwrap().remove(0)
    }

    fn parse_err(src: &str) -> String {
        parse("test", src).unwrap_err().to_string()
    }

    #[test]
    fn test_parses_pipeline_into_individual_commands() {
        let tree = parse_one("{{ .name | default \"chart\" | upper }}");
        let action = match &tree.root[0] {
            Node::Action(action) => action,
            other => panic!("expected action node, found {other:?}"),
        };
        assert_eq!(action.pipe.commands.len(), 3);
        assert_eq!(action.pipe.to_string(), ".name | default \"chart\" | upper");
    }

    #[test]
    fn test_else_if_chain_is_nested() {
        let tree = parse_one("{{if .a}}A{{else if .b}}B{{else}}C{{end}}");
        let branch = match &tree.root[0] {
            Node::If(branch) => branch,
            other => panic!("expected if, found {other:?}"),
        };
        let else_list = branch.else_list.as_ref().unwrap();
        assert_eq!(else_list.len(), 1);
        match &else_list[0] {
            Node::If(inner) => assert!(inner.else_list.is_some()),
            other => panic!("expected nested if, found {other:?}"),
        }
    }

    #[test]
    fn test_define_and_block_register_trees() {
        let trees = parse("file", r#"{{define "a"}}x{{end}}{{block "b" .}}y{{end}}"#).unwrap();
        let names: Vec<&str> = trees.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["file", "a", "b"]);
        assert!(matches!(&trees[0].root[0], Node::Template(call) if call.name == "b"));
        assert_eq!(trees[1].parse_name, "file");
    }

    #[test]
    fn test_range_declarations() {
        let tree = parse_one("{{range $k, $v := .m}}{{$k}}={{$v}}{{end}}");
        match &tree.root[0] {
            Node::Range(branch) => assert_eq!(branch.pipe.decl, vec!["$k", "$v"]),
            other => panic!("expected range, found {other:?}"),
        }
    }

    #[test]
    fn test_chain_on_parenthesized_pipeline() {
        let tree = parse_one("{{ (index .list 0).name }}");
        match &tree.root[0] {
            Node::Action(action) => {
                assert_eq!(action.pipe.to_string(), "(index .list 0).name");
            }
            other => panic!("expected action, found {other:?}"),
        }
    }

    #[test]
    fn test_literals() {
        let tree = parse_one(r#"{{ printf "%v %v %v %v" 0x1F 'a' 1e3 `raw\n` }}"#);
        let action = match &tree.root[0] {
            Node::Action(action) => action,
            other => panic!("expected action, found {other:?}"),
        };
        let args = &action.pipe.commands[0].args;
        let number = |i: usize| match &args[i].kind {
            ArgumentKind::Number(n) => n.value,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(number(2), NumberValue::Int(31));
        assert_eq!(number(3), NumberValue::Int(97));
        assert_eq!(number(4), NumberValue::Float(1000.0));
        assert!(matches!(&args[5].kind, ArgumentKind::String(s) if s == "raw\\n"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_err("{{ end }}"), "template: test:1: unexpected {{end}}");
        assert_eq!(parse_err("{{ if .x }}"), "template: test:1: unexpected EOF");
        assert_eq!(parse_err("{{ nope 1 }}"), "template: test:1: function \"nope\" not defined");
        assert_eq!(parse_err("{{ $x }}"), "template: test:1: undefined variable \"$x\"");
        assert_eq!(parse_err("{{ }}"), "template: test:1: missing value for command");
        assert_eq!(parse_err("{{ break }}"), "template: test:1: {{break}} outside {{range}}");
        assert_eq!(
            parse_err("{{ .x | \"s\" }}"),
            "template: test:1: non executable command in pipeline stage 2"
        );
    }

    #[test]
    fn test_parenthesized_stage_parses() {
        let tree = parse_one("{{ .x | (printf \"%d\" 1) }}");
        let action = match &tree.root[0] {
            Node::Action(action) => action,
            other => panic!("expected action node, found {other:?}"),
        };
        assert_eq!(action.pipe.commands.len(), 2);
        assert!(matches!(action.pipe.commands[1].args[0].kind, ArgumentKind::Pipeline(_)));
    }

    #[test]
    fn test_unknown_function_has_suggestion() {
        let err = parse("test", "{{ .x | nindnet 2 }}").unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("Did you mean `nindent`?"));
    }

    #[test]
    fn test_variable_scope_ends_with_block() {
        let err = parse_err("{{ with .a }}{{ $v := 1 }}{{ end }}{{ $v }}");
        assert_eq!(err, "template: test:1: undefined variable \"$v\"");
        assert!(parse("test", "{{ $v := 1 }}{{ with .a }}{{ $v = 2 }}{{ $v }}{{ end }}").is_ok());
    }
}
