//! Reader for the subset of the DOT language that network producers emit.

use anyhow::{Result, bail};

use super::graph::GraphKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DotGraph {
    pub kind: GraphKind,
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Id { text: String, quoted: bool },
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Equals,
    Colon,
    Arrow,
    Line,
}

impl Token {
    fn keyword(&self, word: &str) -> bool {
        matches!(self, Token::Id { text, quoted: false } if text.eq_ignore_ascii_case(word))
    }
}

pub(super) fn parse(text: &str, source: &str) -> Result<DotGraph> {
    let tokens = tokenize(text, source)?;
    Parser {
        tokens,
        pos: 0,
        source,
    }
    .graph()
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || !c.is_ascii()
}

fn tokenize(text: &str, source: &str) -> Result<Vec<(Token, usize)>> {
    let chars = text.chars().collect::<Vec<char>>();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut at_line_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            at_line_start = true;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // Preprocessor-style lines are ignored by graphviz.
        if c == '#' && at_line_start {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        at_line_start = false;

        let next = chars.get(i + 1).copied();
        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let start_line = line;
                i += 2;
                loop {
                    match (chars.get(i), chars.get(i + 1)) {
                        (Some('*'), Some('/')) => {
                            i += 2;
                            break;
                        }
                        (Some(ch), _) => {
                            if *ch == '\n' {
                                line += 1;
                            }
                            i += 1;
                        }
                        (None, _) => bail!("{source}:{start_line}: unterminated comment"),
                    }
                }
            }
            '"' => {
                let start_line = line;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') if chars.get(i + 1) == Some(&'"') => {
                            value.push('"');
                            i += 2;
                        }
                        Some('\\') if chars.get(i + 1) == Some(&'\n') => {
                            line += 1;
                            i += 2;
                        }
                        Some(ch) => {
                            if *ch == '\n' {
                                line += 1;
                            }
                            value.push(*ch);
                            i += 1;
                        }
                        None => bail!("{source}:{start_line}: unterminated quoted string"),
                    }
                }
                tokens.push((
                    Token::Id {
                        text: value,
                        quoted: true,
                    },
                    start_line,
                ));
            }
            '<' => bail!("{source}:{line}: html identifiers are not supported"),
            '{' | '}' | '[' | ']' | ';' | ',' | '=' | ':' => {
                let token = match c {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ';' => Token::Semicolon,
                    ',' => Token::Comma,
                    '=' => Token::Equals,
                    _ => Token::Colon,
                };
                tokens.push((token, line));
                i += 1;
            }
            '-' if next == Some('>') => {
                tokens.push((Token::Arrow, line));
                i += 2;
            }
            '-' if next == Some('-') => {
                tokens.push((Token::Line, line));
                i += 2;
            }
            '-' if next.is_some_and(|ch| ch.is_ascii_digit() || ch == '.') => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push((
                    Token::Id {
                        text: chars[start..i].iter().collect(),
                        quoted: false,
                    },
                    line,
                ));
            }
            _ if is_id_char(c) => {
                let start = i;
                while i < chars.len() && is_id_char(chars[i]) {
                    i += 1;
                }
                tokens.push((
                    Token::Id {
                        text: chars[start..i].iter().collect(),
                        quoted: false,
                    },
                    line,
                ));
            }
            _ => bail!("{source}:{line}: unexpected character {c:?}"),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            bail!("{}:{}: expected {what}", self.source, self.line())
        }
    }

    fn id(&mut self, what: &str) -> Result<String> {
        if let Some((Token::Id { text, .. }, _)) = self.tokens.get(self.pos) {
            let text = text.clone();
            self.pos += 1;
            return Ok(text);
        }
        bail!("{}:{}: expected {what}", self.source, self.line())
    }

    fn graph(mut self) -> Result<DotGraph> {
        if self.peek().is_some_and(|token| token.keyword("strict")) {
            self.pos += 1;
        }

        let kind = match self.peek() {
            Some(token) if token.keyword("digraph") => GraphKind::Directed,
            Some(token) if token.keyword("graph") => GraphKind::Undirected,
            _ => bail!(
                "{}:{}: expected `graph` or `digraph`",
                self.source,
                self.line()
            ),
        };
        self.pos += 1;

        if matches!(self.peek(), Some(Token::Id { .. })) {
            self.pos += 1;
        }
        self.expect(Token::LBrace, "`{`")?;

        let mut graph = DotGraph {
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
        };

        loop {
            match self.peek() {
                None => bail!("{}:{}: missing closing `}}`", self.source, self.line()),
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Semicolon) => self.pos += 1,
                Some(_) => self.statement(&mut graph)?,
            }
        }

        if self.peek().is_some() {
            bail!(
                "{}:{}: unexpected content after graph body",
                self.source,
                self.line()
            );
        }
        Ok(graph)
    }

    fn statement(&mut self, graph: &mut DotGraph) -> Result<()> {
        let Some(token) = self.peek() else {
            bail!("{}:{}: unexpected end of input", self.source, self.line());
        };

        if token.keyword("subgraph") || *token == Token::LBrace {
            bail!(
                "{}:{}: subgraphs are not supported",
                self.source,
                self.line()
            );
        }
        if token.keyword("node") || token.keyword("edge") || token.keyword("graph") {
            self.pos += 1;
            return self.attr_lists();
        }

        let first = self.node_id()?;
        if self.eat(&Token::Equals) {
            self.id("attribute value")?;
            return Ok(());
        }

        let mut chain = vec![first];
        loop {
            let op = match self.peek() {
                Some(Token::Arrow) => GraphKind::Directed,
                Some(Token::Line) => GraphKind::Undirected,
                _ => break,
            };
            if op != graph.kind {
                bail!(
                    "{}:{}: edge operator does not match the graph type",
                    self.source,
                    self.line()
                );
            }
            self.pos += 1;
            chain.push(self.node_id()?);
        }
        self.attr_lists()?;

        if chain.len() == 1 {
            graph.nodes.extend(chain);
        } else {
            for pair in chain.windows(2) {
                graph.edges.push((pair[0].clone(), pair[1].clone()));
            }
        }
        Ok(())
    }

    fn node_id(&mut self) -> Result<String> {
        let name = self.id("node identifier")?;
        // Ports (`node:port:compass`) do not change the node identity.
        while self.eat(&Token::Colon) {
            self.id("port")?;
        }
        Ok(name)
    }

    fn attr_lists(&mut self) -> Result<()> {
        while self.eat(&Token::LBracket) {
            loop {
                if self.eat(&Token::RBracket) {
                    break;
                }
                self.id("attribute name")?;
                if self.eat(&Token::Equals) {
                    self.id("attribute value")?;
                }
                if !self.eat(&Token::Comma) {
                    self.eat(&Token::Semicolon);
                }
            }
        }
        Ok(())
    }
}
