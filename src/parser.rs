//! Recursive-descent parser: tokens → [`Query`].
//!
//! Expression parsing uses precedence climbing over the table spec.md
//! §4.D specifies: `AND`/`OR`/`XOR`/`IS [NOT] NULL`/`IN` bind loosest
//! (tier -1), then comparisons (tier 0), then `+`/`-` (tier 1), then
//! `*`/`/`/`%` (tier 2), then `^` tightest and right-associative (tier 3).
//! Aggregate-nesting is rejected via an explicit context stack (pushed
//! whenever descent enters an aggregate call's arguments) rather than a
//! post-hoc AST walk, mirroring the teacher's well-formedness checks in
//! `cypher::parser`.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{tokenize, FStringPart, Token, TokenKind};
use crate::registry::Registry;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a Registry,
    aggregate_depth: usize,
}

pub fn parse(input: &str, registry: &Registry) -> Result<Query> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0, registry, aggregate_depth: 0 };
    parser.parse_query()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn pos_at_current(&self) -> usize {
        self.tokens[self.pos].span.start
    }

    fn advance(&mut self) -> TokenKind {
        let k = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        k
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == kw)
    }

    fn is_operator(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Operator(o) if *o == op)
    }

    fn eat_keyword(&mut self, kw: &'static str) -> Result<()> {
        if self.is_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error(format!("expected '{kw}'")))
        }
    }

    fn eat_operator(&mut self, op: &'static str) -> Result<()> {
        if self.is_operator(op) {
            self.advance();
            Ok(())
        } else {
            Err(self.syntax_error(format!("expected '{op}'")))
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError { position: self.pos_at_current(), message: message.into() }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(self.syntax_error(format!("expected identifier, found {other:?}"))),
        }
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_query(&mut self) -> Result<Query> {
        let mut operations = Vec::new();
        loop {
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            operations.push(self.parse_operation()?);
            if self.is_operator(";") {
                self.advance();
            }
        }
        if operations.is_empty() {
            return Err(self.syntax_error("empty query"));
        }
        Ok(Query { operations })
    }

    fn parse_operation(&mut self) -> Result<Operation> {
        match self.peek() {
            TokenKind::Keyword("WITH") => self.parse_with().map(Operation::With),
            TokenKind::Keyword("UNWIND") => self.parse_unwind().map(Operation::Unwind),
            TokenKind::Keyword("LOAD") => self.parse_load().map(Operation::Load),
            TokenKind::Keyword("MATCH") | TokenKind::Keyword("OPTIONAL") => {
                self.parse_match().map(Operation::Match)
            }
            TokenKind::Keyword("WHERE") => {
                self.advance();
                self.parse_expr().map(Operation::Where)
            }
            TokenKind::Keyword("CALL") => self.parse_call().map(Operation::Call),
            TokenKind::Keyword("CREATE") => self.parse_create_virtual().map(Operation::CreateVirtual),
            TokenKind::Keyword("DELETE") => self.parse_delete_virtual().map(Operation::DeleteVirtual),
            TokenKind::Keyword("RETURN") => self.parse_return().map(Operation::Return),
            TokenKind::Keyword("UNION") => self.parse_union().map(Operation::Union),
            other => Err(self.syntax_error(format!("unexpected token {other:?} at start of clause"))),
        }
    }

    // ------------------------------------------------------------------
    // WITH / RETURN shared projection grammar
    // ------------------------------------------------------------------

    fn parse_projection_items(&mut self) -> Result<(bool, Vec<ProjectionItem>)> {
        let distinct = if self.is_keyword("DISTINCT") {
            self.advance();
            true
        } else {
            false
        };
        let mut items = Vec::new();
        loop {
            if self.is_operator("*") {
                self.advance();
                items.push(ProjectionItem { expr: Expr::Star, alias: None });
            } else {
                let expr = self.parse_expr()?;
                let alias = if self.is_keyword("AS") {
                    self.advance();
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                items.push(ProjectionItem { expr, alias });
            }
            if self.is_operator(",") {
                self.advance();
            } else {
                break;
            }
        }
        Ok((distinct, items))
    }

    fn parse_order_skip_limit(&mut self) -> Result<(Vec<OrderExpr>, Option<Expr>, Option<Expr>)> {
        let mut order_by = Vec::new();
        if self.is_keyword("ORDER") {
            self.advance();
            self.eat_keyword("BY")?;
            loop {
                let expr = self.parse_expr()?;
                let ascending = if self.is_keyword("DESC") {
                    self.advance();
                    false
                } else {
                    if self.is_keyword("ASC") {
                        self.advance();
                    }
                    true
                };
                order_by.push(OrderExpr { expr, ascending });
                if self.is_operator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let skip = if self.is_keyword("SKIP") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        let limit = if self.is_keyword("LIMIT") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok((order_by, skip, limit))
    }

    fn parse_with(&mut self) -> Result<WithClause> {
        self.eat_keyword("WITH")?;
        let (distinct, items) = self.parse_projection_items()?;
        let (order_by, skip, limit) = self.parse_order_skip_limit()?;
        Ok(WithClause { distinct, items, order_by, skip, limit })
    }

    fn parse_return(&mut self) -> Result<ReturnClause> {
        self.eat_keyword("RETURN")?;
        let (distinct, items) = self.parse_projection_items()?;
        let (order_by, skip, limit) = self.parse_order_skip_limit()?;
        Ok(ReturnClause { distinct, items, order_by, skip, limit })
    }

    fn parse_union(&mut self) -> Result<UnionClause> {
        self.eat_keyword("UNION")?;
        let all = if self.is_keyword("ALL") {
            self.advance();
            true
        } else {
            false
        };
        let query = self.parse_query_until_union_boundary()?;
        Ok(UnionClause { all, query: Box::new(query) })
    }

    /// Parses the remainder of the query chain following `UNION [ALL]`.
    /// Consumes operations until another `UNION` (left for the caller to
    /// fold) or end of input.
    fn parse_query_until_union_boundary(&mut self) -> Result<Query> {
        let mut operations = Vec::new();
        loop {
            if matches!(self.peek(), TokenKind::Eof) || self.is_keyword("UNION") {
                break;
            }
            operations.push(self.parse_operation()?);
        }
        Ok(Query { operations })
    }

    // ------------------------------------------------------------------
    // UNWIND / LOAD
    // ------------------------------------------------------------------

    fn parse_unwind(&mut self) -> Result<UnwindClause> {
        self.eat_keyword("UNWIND")?;
        let expr = self.parse_expr()?;
        self.eat_keyword("AS")?;
        let alias = self.expect_identifier()?;
        Ok(UnwindClause { expr, alias })
    }

    fn parse_load(&mut self) -> Result<LoadClause> {
        self.eat_keyword("LOAD")?;
        self.eat_keyword("JSON")?;
        self.eat_keyword("FROM")?;
        let url = self.parse_expr()?;
        let body = if self.is_keyword("POST") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        let headers = if self.is_keyword("HEADERS") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.eat_keyword("AS")?;
        let alias = self.expect_identifier()?;
        Ok(LoadClause { url, body, headers, alias })
    }

    // ------------------------------------------------------------------
    // MATCH / patterns
    // ------------------------------------------------------------------

    fn parse_match(&mut self) -> Result<MatchClause> {
        let optional = if self.is_keyword("OPTIONAL") {
            self.advance();
            true
        } else {
            false
        };
        self.eat_keyword("MATCH")?;
        let mut patterns = vec![self.parse_pattern()?];
        while self.is_operator(",") {
            self.advance();
            patterns.push(self.parse_pattern()?);
        }
        let where_clause = if self.is_keyword("WHERE") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(MatchClause { optional, patterns, where_clause })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let path_alias = if matches!(self.peek(), TokenKind::Identifier(_)) && matches!(self.peek_at(1), TokenKind::Operator("=")) {
            let name = self.expect_identifier()?;
            self.eat_operator("=")?;
            Some(name)
        } else {
            None
        };

        let mut elements = vec![PatternElement::Node(self.parse_node_pattern()?)];
        while self.is_operator("-") || self.is_operator("<-") {
            let (rel, right_arrow) = self.parse_rel_pattern()?;
            elements.push(PatternElement::Relationship(rel));
            elements.push(PatternElement::Node(self.parse_node_pattern()?));
            let _ = right_arrow;
        }
        Ok(Pattern { path_alias, elements })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.eat_operator("(")?;
        let alias = if matches!(self.peek(), TokenKind::Identifier(_)) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let label = if self.is_operator(":") {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let properties = if self.is_operator("{") {
            self.parse_map_body()?
        } else {
            HashMap::new()
        };
        self.eat_operator(")")?;
        Ok(NodePattern { alias, label, properties })
    }

    /// Parses `-[...]-`, `-[...]->`, or `<-[...]-`, returning the relation
    /// pattern and whether the arrow pointed right (informational only —
    /// direction already lives on the returned `RelPattern`).
    fn parse_rel_pattern(&mut self) -> Result<(RelPattern, bool)> {
        let left_arrow = self.is_operator("<-");
        if left_arrow {
            self.advance();
        } else {
            self.eat_operator("-")?;
        }

        let (alias, rel_types, var_length, properties) = if self.is_operator("[") {
            self.advance();
            let alias = if matches!(self.peek(), TokenKind::Identifier(_)) {
                Some(self.expect_identifier()?)
            } else {
                None
            };
            let mut rel_types = Vec::new();
            if self.is_operator(":") {
                self.advance();
                rel_types.push(self.expect_identifier()?);
                while self.is_operator("|") {
                    self.advance();
                    rel_types.push(self.expect_identifier()?);
                }
            }
            let var_length = if self.is_operator("*") {
                self.advance();
                Some(self.parse_var_length()?)
            } else {
                None
            };
            let properties = if self.is_operator("{") { self.parse_map_body()? } else { HashMap::new() };
            self.eat_operator("]")?;
            (alias, rel_types, var_length, properties)
        } else {
            (None, Vec::new(), None, HashMap::new())
        };

        let right_arrow = self.is_operator("->");
        if right_arrow {
            self.advance();
        } else {
            self.eat_operator("-")?;
        }

        let direction = match (left_arrow, right_arrow) {
            (true, false) => PatternDirection::Left,
            (false, true) => PatternDirection::Right,
            _ => PatternDirection::Both,
        };

        Ok((RelPattern { alias, rel_types, direction, properties, var_length }, right_arrow))
    }

    /// Parses the bounds after `*`: bare (`*`), `*n`, `*n..`, `*..m`, `*n..m`.
    fn parse_var_length(&mut self) -> Result<VarLength> {
        let min = if let TokenKind::Integer(n) = self.peek() {
            let n = *n as usize;
            self.advance();
            Some(n)
        } else {
            None
        };
        if self.is_operator("..") {
            self.advance();
            let max = if let TokenKind::Integer(n) = self.peek() {
                let n = *n as usize;
                self.advance();
                Some(n)
            } else {
                None
            };
            Ok(VarLength { min, max })
        } else {
            // Bare `*n` means exactly n hops; bare `*` means unbounded.
            Ok(VarLength { min, max: min })
        }
    }

    // ------------------------------------------------------------------
    // CALL / CREATE VIRTUAL / DELETE VIRTUAL
    // ------------------------------------------------------------------

    fn parse_call(&mut self) -> Result<CallClause> {
        self.eat_keyword("CALL")?;
        let mut name = self.expect_identifier()?;
        while self.is_operator(".") {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        self.eat_operator("(")?;
        let mut args = Vec::new();
        if !self.is_operator(")") {
            loop {
                args.push(self.parse_expr()?);
                if self.is_operator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_operator(")")?;
        let yield_items = if self.is_keyword("YIELD") {
            self.advance();
            let mut names = vec![self.expect_identifier()?];
            while self.is_operator(",") {
                self.advance();
                names.push(self.expect_identifier()?);
            }
            names
        } else {
            Vec::new()
        };
        Ok(CallClause { name, args, yield_items })
    }

    fn parse_create_virtual(&mut self) -> Result<CreateVirtualClause> {
        self.eat_keyword("CREATE")?;
        self.eat_keyword("VIRTUAL")?;
        let kind = self.parse_virtual_kind()?;
        let name = self.expect_identifier()?;
        self.eat_keyword("FROM")?;
        self.eat_operator("{")?;
        let subquery = self.parse_query_until_closing_brace()?;
        self.eat_operator("}")?;
        Ok(CreateVirtualClause { kind, name, subquery: Box::new(subquery) })
    }

    fn parse_delete_virtual(&mut self) -> Result<DeleteVirtualClause> {
        self.eat_keyword("DELETE")?;
        self.eat_keyword("VIRTUAL")?;
        let kind = self.parse_virtual_kind()?;
        let name = self.expect_identifier()?;
        Ok(DeleteVirtualClause { kind, name })
    }

    fn parse_virtual_kind(&mut self) -> Result<VirtualKind> {
        match self.advance() {
            TokenKind::Identifier(ref s) if s.eq_ignore_ascii_case("LABEL") => Ok(VirtualKind::Label),
            TokenKind::Identifier(ref s) if s.eq_ignore_ascii_case("TYPE") => Ok(VirtualKind::Type),
            other => Err(self.syntax_error(format!("expected LABEL or TYPE, found {other:?}"))),
        }
    }

    fn parse_query_until_closing_brace(&mut self) -> Result<Query> {
        let mut operations = Vec::new();
        loop {
            if self.is_operator("}") || matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            operations.push(self.parse_operation()?);
        }
        if operations.is_empty() {
            return Err(self.syntax_error("empty virtual sub-query"));
        }
        Ok(Query { operations })
    }

    // ------------------------------------------------------------------
    // Expressions — precedence climbing
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_xor()?;
        while self.is_keyword("OR") {
            self.advance();
            let right = self.parse_xor()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.is_keyword("XOR") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Xor, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.is_keyword("AND") {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.is_keyword("NOT") {
            self.advance();
            let expr = self.parse_not()?;
            return Ok(Expr::UnaryOp { op: UnaryOp::Not, expr: Box::new(expr) });
        }
        self.parse_is_in()
    }

    fn parse_is_in(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            if self.is_keyword("IS") {
                self.advance();
                let negated = if self.is_keyword("NOT") {
                    self.advance();
                    true
                } else {
                    false
                };
                self.eat_keyword("NULL")?;
                left = Expr::IsNull { expr: Box::new(left), negated };
            } else if self.is_keyword("IN") {
                self.advance();
                let list = self.parse_comparison()?;
                left = Expr::In { expr: Box::new(left), list: Box::new(list) };
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_string_op()?;
        loop {
            let op = match self.peek() {
                TokenKind::Operator("=") => BinaryOp::Eq,
                TokenKind::Operator("<>") => BinaryOp::Neq,
                TokenKind::Operator("<") => BinaryOp::Lt,
                TokenKind::Operator("<=") => BinaryOp::Lte,
                TokenKind::Operator(">") => BinaryOp::Gt,
                TokenKind::Operator(">=") => BinaryOp::Gte,
                TokenKind::Operator("=~") => BinaryOp::RegexMatch,
                _ => break,
            };
            self.advance();
            let right = self.parse_string_op()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_string_op(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.is_keyword("STARTS") {
                self.advance();
                self.eat_keyword("WITH")?;
                StringOp::StartsWith
            } else if self.is_keyword("ENDS") {
                self.advance();
                self.eat_keyword("WITH")?;
                StringOp::EndsWith
            } else if self.is_keyword("CONTAINS") {
                self.advance();
                StringOp::Contains
            } else {
                break;
            };
            let right = self.parse_additive()?;
            left = Expr::StringOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Operator("+") => BinaryOp::Add,
                TokenKind::Operator("-") => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Operator("*") => BinaryOp::Mul,
                TokenKind::Operator("/") => BinaryOp::Div,
                TokenKind::Operator("%") => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.is_operator("-") {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::UnaryOp { op: UnaryOp::Negate, expr: Box::new(expr) });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.is_operator("^") {
            self.advance();
            let exponent = self.parse_unary()?; // right-associative
            return Ok(Expr::BinaryOp { left: Box::new(base), op: BinaryOp::Pow, right: Box::new(exponent) });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_operator(".") {
                self.advance();
                let key = self.expect_identifier()?;
                expr = Expr::Property { expr: Box::new(expr), key };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            TokenKind::Integer(i) => Ok(Expr::Literal(Literal::Int(i))),
            TokenKind::Float(f) => Ok(Expr::Literal(Literal::Float(f))),
            TokenKind::String(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::FString(parts) => self.build_fstring(parts),
            TokenKind::Parameter(name) => Ok(Expr::Parameter(name)),
            TokenKind::Keyword("NULL") => Ok(Expr::Literal(Literal::Null)),
            TokenKind::Keyword("TRUE") => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::Keyword("FALSE") => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::Keyword("CASE") => self.finish_case(),
            TokenKind::Operator("(") => {
                let inner = self.parse_expr()?;
                self.eat_operator(")")?;
                Ok(inner)
            }
            TokenKind::Operator("[") => self.finish_list(),
            TokenKind::Operator("{") => self.finish_map(),
            TokenKind::Identifier(name) => self.finish_identifier(name),
            other => Err(self.syntax_error(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn build_fstring(&mut self, parts: Vec<FStringPart>) -> Result<Expr> {
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                FStringPart::Str(s) => segments.push(FStringSegment::Str(s)),
                FStringPart::Expr(src) => {
                    let sub_tokens = tokenize(&src)?;
                    let mut sub_parser = Parser { tokens: sub_tokens, pos: 0, registry: self.registry, aggregate_depth: 0 };
                    let expr = sub_parser.parse_expr()?;
                    segments.push(FStringSegment::Expr(Box::new(expr)));
                }
            }
        }
        Ok(Expr::FString(segments))
    }

    fn finish_list(&mut self) -> Result<Expr> {
        let mut items = Vec::new();
        if !self.is_operator("]") {
            loop {
                items.push(self.parse_expr()?);
                if self.is_operator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_operator("]")?;
        Ok(Expr::List(items))
    }

    fn parse_map_body(&mut self) -> Result<HashMap<String, Expr>> {
        self.eat_operator("{")?;
        let mut map = HashMap::new();
        if !self.is_operator("}") {
            loop {
                let key = self.expect_identifier()?;
                self.eat_operator(":")?;
                let value = self.parse_expr()?;
                map.insert(key, value);
                if self.is_operator(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.eat_operator("}")?;
        Ok(map)
    }

    fn finish_map(&mut self) -> Result<Expr> {
        self.pos -= 1; // un-consume '{' so parse_map_body can eat it uniformly
        Ok(Expr::MapLiteral(self.parse_map_body()?))
    }

    fn finish_case(&mut self) -> Result<Expr> {
        let operand = if !self.is_keyword("WHEN") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        let mut whens = Vec::new();
        while self.is_keyword("WHEN") {
            self.advance();
            let when = self.parse_expr()?;
            self.eat_keyword("THEN")?;
            let then = self.parse_expr()?;
            whens.push((when, then));
        }
        let else_expr = if self.is_keyword("ELSE") {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.eat_keyword("END")?;
        Ok(Expr::Case { operand, whens, else_expr })
    }

    fn finish_identifier(&mut self, name: String) -> Result<Expr> {
        if self.is_operator("(") {
            if let Some(kind) = ComprehensionKind::from_name(&name) {
                return self.finish_comprehension(kind);
            }
            self.advance();
            let is_aggregate = self.registry.is_aggregate(&name);
            if is_aggregate {
                if self.aggregate_depth > 0 {
                    return Err(Error::AggregateNestingError { function: name });
                }
                self.aggregate_depth += 1;
            }
            let distinct = if self.is_keyword("DISTINCT") {
                self.advance();
                true
            } else {
                false
            };
            let mut args = Vec::new();
            if self.is_operator("*") && matches!(self.peek_at(1), TokenKind::Operator(")")) {
                self.advance();
            } else if !self.is_operator(")") {
                loop {
                    args.push(self.parse_expr()?);
                    if self.is_operator(",") {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.eat_operator(")")?;
            if is_aggregate {
                self.aggregate_depth -= 1;
            }
            return Ok(Expr::FunctionCall { name, args, distinct });
        }
        Ok(Expr::Variable(name))
    }

    /// `kind(var IN source [WHERE filter])` — spec.md §4.E predicate
    /// functions. Called with `peek() == "("`.
    fn finish_comprehension(&mut self, kind: ComprehensionKind) -> Result<Expr> {
        self.eat_operator("(")?;
        let variable = self.expect_identifier()?;
        self.eat_keyword("IN")?;
        let source = self.parse_expr()?;
        let filter = if self.is_keyword("WHERE") {
            self.advance();
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.eat_operator(")")?;
        Ok(Expr::Comprehension(Comprehension { kind, variable, source: Box::new(source), filter }))
    }
}
