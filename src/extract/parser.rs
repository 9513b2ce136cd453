//! Recursive-descent parser for bootstrap scripts
//!
//! Only literal values are evaluated. Everything else is parsed far enough to
//! be skipped and surfaces as an [`OpaqueKind`] placeholder.

use crate::extract::lexer::{tokenize, ParseError, Token};
use crate::extract::value::{BootstrapValue, Mapping, OpaqueKind, Scalar};

type PResult<T> = Result<T, ParseError>;

const COMPOUND_ASSIGN: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=", "||=",
    "??=",
];

const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "==", "!=", "===", "!==", "<", ">", "<=", ">=", "&&", "||",
    "??", "&", "|", "^", "<<", ">>", ">>>",
];

const UNARY_KEYWORDS: &[&str] = &["typeof", "void", "delete", "await"];

/// Deepest statement or expression nesting accepted before giving up
const MAX_NESTING: usize = 256;

/// Result of parsing an expression
///
/// A bare dotted-identifier chain is kept as a name so it can serve as an
/// assignment target; used as a value it reads as its dotted string.
enum Node {
    Name(String),
    Value(BootstrapValue),
}

impl Node {
    fn into_value(self) -> BootstrapValue {
        match self {
            Self::Name(name) => BootstrapValue::str(name),
            Self::Value(value) => value,
        }
    }

    fn opaque(kind: OpaqueKind) -> Self {
        Self::Value(BootstrapValue::Opaque(kind))
    }
}

/// Parses a script and collects its top-level assignments into a mapping
///
/// Each `a.b.c = <expr>` statement at the top level contributes the key
/// `"a.b.c"`. Statements without an assignment are validated and dropped.
pub fn parse_script(src: &str) -> PResult<Mapping> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut root = Mapping::new();
    while !parser.at_eof() {
        parser.statement(Some(&mut root))?;
    }
    Ok(root)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .or_else(|| self.tokens.last())
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, o)| *o)
            .unwrap_or(0)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Token::Punct(q) if *q == p)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(w) if w == word)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.is_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) -> PResult<()> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", p)))
        }
    }

    /// Runs `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new("nesting too deep", self.offset()));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let found = format!("{:?}", self.peek());
        ParseError::new(format!("{}, found {}", message.into(), found), self.offset())
    }

    // ===== Statements =====

    fn statement(&mut self, root: Option<&mut Mapping>) -> PResult<()> {
        self.nested(|parser| parser.statement_body(root))
    }

    fn statement_body(&mut self, root: Option<&mut Mapping>) -> PResult<()> {
        if self.eat(";") {
            return Ok(());
        }
        if self.is_punct("{") {
            return self.block();
        }

        let keyword = match self.peek() {
            Token::Ident(word) => word.clone(),
            _ => return self.expression_statement(root),
        };

        match keyword.as_str() {
            "var" | "let" | "const" => {
                self.bump();
                loop {
                    match self.bump() {
                        Token::Ident(_) => {}
                        Token::Punct("{") => self.skip_to_close("{", "}")?,
                        Token::Punct("[") => self.skip_to_close("[", "]")?,
                        _ => return Err(self.error("expected binding name")),
                    }
                    if self.eat("=") {
                        self.assignment(&mut Vec::new())?;
                    }
                    if !self.eat(",") {
                        break;
                    }
                }
                self.eat(";");
                Ok(())
            }
            "function" | "async" if self.declares_function() => {
                self.function_expression()?;
                Ok(())
            }
            "if" => {
                self.bump();
                self.parenthesized()?;
                self.statement(None)?;
                if self.eat_word("else") {
                    self.statement(None)?;
                }
                Ok(())
            }
            "for" | "while" | "with" => {
                self.bump();
                self.parenthesized()?;
                self.statement(None)
            }
            "do" => {
                self.bump();
                self.statement(None)?;
                if !self.eat_word("while") {
                    return Err(self.error("expected 'while'"));
                }
                self.parenthesized()?;
                self.eat(";");
                Ok(())
            }
            "try" => {
                self.bump();
                self.block()?;
                if self.eat_word("catch") {
                    if self.is_punct("(") {
                        self.parenthesized()?;
                    }
                    self.block()?;
                }
                if self.eat_word("finally") {
                    self.block()?;
                }
                Ok(())
            }
            "switch" => {
                self.bump();
                self.parenthesized()?;
                self.expect("{")?;
                self.skip_to_close("{", "}")
            }
            "return" | "throw" => {
                self.bump();
                if !self.is_punct(";") && !self.is_punct("}") && !self.at_eof() {
                    self.expression()?;
                }
                self.eat(";");
                Ok(())
            }
            "break" | "continue" => {
                self.bump();
                if matches!(self.peek(), Token::Ident(_)) {
                    self.bump();
                }
                self.eat(";");
                Ok(())
            }
            _ => self.expression_statement(root),
        }
    }

    fn declares_function(&self) -> bool {
        match self.peek() {
            Token::Ident(w) if w == "function" => true,
            Token::Ident(w) if w == "async" => {
                matches!(self.peek_at(1), Token::Ident(next) if next == "function")
            }
            _ => false,
        }
    }

    fn block(&mut self) -> PResult<()> {
        self.expect("{")?;
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.error("unterminated block"));
            }
            self.statement(None)?;
        }
        self.expect("}")
    }

    fn parenthesized(&mut self) -> PResult<()> {
        self.expect("(")?;
        self.skip_to_close("(", ")")
    }

    /// Skips tokens up to the bracket closing an already consumed `open`
    fn skip_to_close(&mut self, open: &str, close: &str) -> PResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Token::Eof => return Err(self.error(format!("unbalanced '{}'", open))),
                Token::Punct(p) if p == open => depth += 1,
                Token::Punct(p) if p == close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn expression_statement(&mut self, root: Option<&mut Mapping>) -> PResult<()> {
        let mut targets = Vec::new();
        let value = self.assignment(&mut targets)?;
        while self.eat(",") {
            self.assignment(&mut Vec::new())?;
        }
        if let Some(root) = root {
            for target in targets {
                root.insert(target, value.clone());
            }
        }
        if !self.eat(";") && !self.is_punct("}") && !self.at_eof() && !self.starts_new_statement() {
            return Err(self.error("expected ';'"));
        }
        Ok(())
    }

    /// Automatic semicolon insertion: accept a statement boundary before
    /// anything that cannot continue the previous expression.
    fn starts_new_statement(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_) | Token::Str(_) | Token::Num(_) | Token::Template | Token::Regex
        ) || self.is_punct("{")
            || self.is_punct("[")
            || self.is_punct("!")
            || self.is_punct("++")
            || self.is_punct("--")
    }

    // ===== Expressions =====

    fn expression(&mut self) -> PResult<BootstrapValue> {
        let value = self.assignment(&mut Vec::new())?;
        if self.is_punct(",") {
            while self.eat(",") {
                self.assignment(&mut Vec::new())?;
            }
            return Ok(BootstrapValue::Opaque(OpaqueKind::Unknown));
        }
        Ok(value)
    }

    /// Parses an assignment expression, recording chained plain-`=` targets
    fn assignment(&mut self, targets: &mut Vec<String>) -> PResult<BootstrapValue> {
        self.nested(|parser| parser.assignment_body(targets))
    }

    fn assignment_body(&mut self, targets: &mut Vec<String>) -> PResult<BootstrapValue> {
        if self.arrow_ahead() {
            self.arrow_function()?;
            return Ok(BootstrapValue::Opaque(OpaqueKind::Function));
        }

        let lhs = self.conditional()?;
        if self.eat("=") {
            if let Node::Name(name) = lhs {
                targets.push(name);
            }
            return self.assignment(targets);
        }
        if COMPOUND_ASSIGN.iter().any(|op| self.is_punct(op)) {
            self.bump();
            self.assignment(&mut Vec::new())?;
            return Ok(BootstrapValue::Opaque(OpaqueKind::Unknown));
        }
        Ok(lhs.into_value())
    }

    fn conditional(&mut self) -> PResult<Node> {
        let test = self.binary()?;
        if self.eat("?") {
            self.assignment(&mut Vec::new())?;
            self.expect(":")?;
            self.assignment(&mut Vec::new())?;
            return Ok(Node::opaque(OpaqueKind::Unknown));
        }
        Ok(test)
    }

    fn binary(&mut self) -> PResult<Node> {
        let mut node = self.unary()?;
        loop {
            let is_operator = BINARY_OPERATORS.iter().any(|op| self.is_punct(op))
                || self.is_word("instanceof")
                || self.is_word("in");
            if !is_operator {
                return Ok(node);
            }
            self.bump();
            self.unary()?;
            node = Node::opaque(OpaqueKind::Unknown);
        }
    }

    fn unary(&mut self) -> PResult<Node> {
        self.nested(Self::unary_body)
    }

    fn unary_body(&mut self) -> PResult<Node> {
        if self.is_punct("-") || self.is_punct("+") {
            let negative = self.is_punct("-");
            self.bump();
            let operand = self.unary()?;
            return Ok(match operand {
                Node::Value(BootstrapValue::Scalar(Scalar::Number(n))) if negative => {
                    let lexeme = match n.strip_prefix('-') {
                        Some(positive) => positive.to_string(),
                        None => format!("-{}", n),
                    };
                    Node::Value(BootstrapValue::Scalar(Scalar::Number(lexeme)))
                }
                number @ Node::Value(BootstrapValue::Scalar(Scalar::Number(_))) => number,
                _ => Node::opaque(OpaqueKind::Unknown),
            });
        }
        if ["!", "~", "++", "--"].iter().any(|op| self.is_punct(op))
            || UNARY_KEYWORDS.iter().any(|w| self.is_word(w))
        {
            self.bump();
            self.unary()?;
            return Ok(Node::opaque(OpaqueKind::Unknown));
        }

        let node = self.postfix_chain()?;
        if self.is_punct("++") || self.is_punct("--") {
            self.bump();
            return Ok(Node::opaque(OpaqueKind::Unknown));
        }
        Ok(node)
    }

    /// Primary expression followed by member accesses and calls
    fn postfix_chain(&mut self) -> PResult<Node> {
        let mut node = if self.eat_word("new") {
            self.postfix_member_only()?;
            if self.is_punct("(") {
                self.arguments()?;
            }
            Node::opaque(OpaqueKind::Unknown)
        } else {
            self.primary()?
        };

        loop {
            if self.eat(".") || self.eat("?.") {
                if self.is_punct("(") {
                    self.arguments()?;
                    node = Node::opaque(OpaqueKind::Call);
                    continue;
                }
                if self.eat("[") {
                    self.skip_to_close("[", "]")?;
                    node = Node::opaque(OpaqueKind::Unknown);
                    continue;
                }
                let property = match self.bump() {
                    Token::Ident(word) => word,
                    _ => return Err(self.error("expected property name")),
                };
                node = match node {
                    Node::Name(base) => Node::Name(format!("{}.{}", base, property)),
                    _ => Node::opaque(OpaqueKind::Unknown),
                };
            } else if self.eat("[") {
                self.expression()?;
                self.expect("]")?;
                node = Node::opaque(OpaqueKind::Unknown);
            } else if self.is_punct("(") {
                self.arguments()?;
                node = Node::opaque(OpaqueKind::Call);
            } else if matches!(self.peek(), Token::Template) {
                self.bump();
                node = Node::opaque(OpaqueKind::Call);
            } else {
                return Ok(node);
            }
        }
    }

    /// Callee of a `new` expression: a primary with member accesses only
    fn postfix_member_only(&mut self) -> PResult<()> {
        if self.eat_word("new") {
            self.postfix_member_only()?;
        } else {
            self.primary()?;
        }
        loop {
            if self.eat(".") {
                if !matches!(self.bump(), Token::Ident(_)) {
                    return Err(self.error("expected property name"));
                }
            } else if self.eat("[") {
                self.expression()?;
                self.expect("]")?;
            } else {
                return Ok(());
            }
        }
    }

    fn arguments(&mut self) -> PResult<()> {
        self.expect("(")?;
        while !self.eat(")") {
            self.eat("...");
            self.assignment(&mut Vec::new())?;
            if !self.eat(",") {
                self.expect(")")?;
                break;
            }
        }
        Ok(())
    }

    fn primary(&mut self) -> PResult<Node> {
        match self.peek().clone() {
            Token::Num(n) => {
                self.bump();
                Ok(Node::Value(BootstrapValue::Scalar(Scalar::Number(n))))
            }
            Token::Str(s) => {
                self.bump();
                Ok(Node::Value(BootstrapValue::str(s)))
            }
            Token::Template | Token::Regex => {
                self.bump();
                Ok(Node::opaque(OpaqueKind::Unknown))
            }
            Token::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(Node::Value(BootstrapValue::Scalar(Scalar::Bool(word == "true"))))
                }
                "null" => {
                    self.bump();
                    Ok(Node::Value(BootstrapValue::null()))
                }
                "function" | "async" if self.declares_function() => {
                    self.function_expression()?;
                    Ok(Node::opaque(OpaqueKind::Function))
                }
                "class" => Err(self.error("class expressions are not supported")),
                _ => {
                    self.bump();
                    Ok(Node::Name(word))
                }
            },
            Token::Punct("{") => self.object().map(Node::Value),
            Token::Punct("[") => self.array().map(Node::Value),
            Token::Punct("(") => {
                self.bump();
                let value = self.expression()?;
                self.expect(")")?;
                Ok(Node::Value(value))
            }
            _ => Err(self.error("unexpected token")),
        }
    }

    fn object(&mut self) -> PResult<BootstrapValue> {
        self.expect("{")?;
        let mut map = Mapping::new();
        while !self.eat("}") {
            if self.eat("...") {
                self.assignment(&mut Vec::new())?;
            } else {
                let key = match self.bump() {
                    Token::Ident(word) => word,
                    Token::Str(s) => s,
                    Token::Num(n) => n,
                    Token::Punct("[") => {
                        self.expression()?;
                        self.expect("]")?;
                        String::from("<computed>")
                    }
                    _ => return Err(self.error("expected property key")),
                };

                if self.eat(":") {
                    let value = self.assignment(&mut Vec::new())?;
                    map.insert(key, value);
                } else if self.is_punct("(") {
                    // method shorthand
                    self.parenthesized()?;
                    self.block()?;
                    map.insert(key, BootstrapValue::Opaque(OpaqueKind::Function));
                } else if let (true, Token::Ident(name) | Token::Str(name)) =
                    (matches!(key.as_str(), "get" | "set"), self.peek().clone())
                {
                    self.bump();
                    self.parenthesized()?;
                    self.block()?;
                    map.insert(name, BootstrapValue::Opaque(OpaqueKind::Function));
                } else {
                    // shorthand `{ a }`
                    map.insert(key.clone(), BootstrapValue::str(key));
                }
            }

            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(BootstrapValue::Mapping(map))
    }

    fn array(&mut self) -> PResult<BootstrapValue> {
        self.expect("[")?;
        let mut items = Vec::new();
        loop {
            if self.eat("]") {
                break;
            }
            if self.eat(",") {
                // hole
                items.push(BootstrapValue::null());
                continue;
            }
            let spread = self.eat("...");
            let value = self.assignment(&mut Vec::new())?;
            items.push(if spread {
                BootstrapValue::Opaque(OpaqueKind::Unknown)
            } else {
                value
            });
            if !self.eat(",") {
                self.expect("]")?;
                break;
            }
        }
        Ok(BootstrapValue::Sequence(items))
    }

    fn function_expression(&mut self) -> PResult<()> {
        self.eat_word("async");
        if !self.eat_word("function") {
            return Err(self.error("expected 'function'"));
        }
        self.eat("*");
        if matches!(self.peek(), Token::Ident(_)) {
            self.bump();
        }
        self.parenthesized()?;
        self.expect("{")?;
        self.skip_to_close("{", "}")
    }

    /// Detects `x =>`, `async x =>` and `(...) =>` at the current position
    fn arrow_ahead(&self) -> bool {
        let mut i = 0;
        if matches!(self.peek_at(0), Token::Ident(w) if w == "async")
            && !matches!(self.peek_at(1), Token::Punct("=>"))
        {
            i = 1;
        }
        match self.peek_at(i) {
            Token::Ident(_) => matches!(self.peek_at(i + 1), Token::Punct("=>")),
            Token::Punct("(") => {
                let mut depth = 0usize;
                let mut j = i;
                loop {
                    match self.peek_at(j) {
                        Token::Eof => return false,
                        Token::Punct("(") => depth += 1,
                        Token::Punct(")") => {
                            depth -= 1;
                            if depth == 0 {
                                return matches!(self.peek_at(j + 1), Token::Punct("=>"));
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow_function(&mut self) -> PResult<()> {
        self.eat_word("async");
        if self.eat("(") {
            self.skip_to_close("(", ")")?;
        } else {
            self.bump();
        }
        self.expect("=>")?;
        if self.eat("{") {
            self.skip_to_close("{", "}")
        } else {
            self.assignment(&mut Vec::new()).map(|_| ())
        }
    }
}
