//! Recursive-descent parser from plan text to a validated `QueryPlan`.

use distq_core::prelude::{DataType, Field, Scalar, Schema, SchemaProvider, Tuple};
use distq_operators::{
    AggregateFunc, AggregateMode, AggregateSpec, CmpOp, FieldPredicate, JoinPredicate,
};

use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{PlanError, Result};
use crate::plan::QueryPlan;

/// Parse one plan, resolving `SCAN(table)` through `provider`.
///
/// Syntax errors carry the byte offset of the offending token; column,
/// table and type errors are reported as plan-construction errors.
pub fn parse(provider: &dyn SchemaProvider, text: &str) -> Result<QueryPlan> {
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        provider,
    };
    let plan = parser.parse_plan()?;
    parser.expect(TokenKind::Eof)?;
    Ok(plan)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    provider: &'a dyn SchemaProvider,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and advance never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected<T>(&self, wanted: &str) -> Result<T> {
        let token = self.peek();
        Err(PlanError::syntax(
            token.offset,
            format!("expected {wanted}, found {}", token.kind.describe()),
        ))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            self.unexpected(&kind.describe())
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, wanted: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(s) => {
                let upper = s.to_ascii_uppercase();
                self.advance();
                Ok(upper)
            }
            _ => self.unexpected(wanted),
        }
    }

    fn expect_name(&mut self, wanted: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(s) | TokenKind::QuotedIdent(s) => {
                let name = s.clone();
                self.advance();
                Ok(name)
            }
            _ => self.unexpected(wanted),
        }
    }

    fn expect_op(&mut self) -> Result<CmpOp> {
        match self.peek().kind {
            TokenKind::Op(op) => {
                self.advance();
                Ok(op)
            }
            _ => self.unexpected("comparison operator"),
        }
    }

    fn parse_plan(&mut self) -> Result<QueryPlan> {
        let offset = self.peek().offset;
        let keyword = self.expect_keyword("plan operator")?;
        self.expect(TokenKind::LParen)?;
        let plan = match keyword.as_str() {
            "SCAN" => {
                let table = self.expect_name("table name")?;
                let schema = self
                    .provider
                    .table_schema(&table)
                    .ok_or(PlanError::UnknownTable(table.clone()))?;
                QueryPlan::scan(table, schema)
            }
            "FILTER" => {
                let input = self.parse_plan()?;
                self.expect(TokenKind::Comma)?;
                let field = self.parse_column(input.schema())?;
                let op = self.expect_op()?;
                let operand = self.parse_literal()?;
                QueryPlan::filter(input, FieldPredicate::new(field, op, operand))?
            }
            "PROJECT" => {
                let input = self.parse_plan()?;
                let mut columns = Vec::new();
                while self.consume(TokenKind::Comma) {
                    columns.push(self.parse_column(input.schema())?);
                }
                QueryPlan::project(input, columns)?
            }
            "JOIN" => {
                let left = self.parse_plan()?;
                self.expect(TokenKind::Comma)?;
                let right = self.parse_plan()?;
                self.expect(TokenKind::Comma)?;
                let lf = self.parse_column(left.schema())?;
                let op = self.expect_op()?;
                let rf = self.parse_column(right.schema())?;
                QueryPlan::join(left, right, JoinPredicate::new(lf, op, rf))?
            }
            "AGG" | "PARTIAL_AGG" => {
                let mode = if keyword == "AGG" {
                    AggregateMode::Complete
                } else {
                    AggregateMode::Partial
                };
                let input = self.parse_plan()?;
                self.expect(TokenKind::Comma)?;
                let func_at = self.peek().offset;
                let name = self.expect_keyword("aggregate function")?;
                let func = AggregateFunc::from_name(&name).ok_or_else(|| {
                    PlanError::syntax(func_at, format!("unknown aggregate function '{name}'"))
                })?;
                self.expect(TokenKind::LParen)?;
                let agg_field = self.parse_column(input.schema())?;
                self.expect(TokenKind::RParen)?;
                let group_field = if self.consume(TokenKind::Comma) {
                    let group_at = self.peek().offset;
                    if self.expect_keyword("GROUP")? != "GROUP" {
                        return Err(PlanError::syntax(group_at, "expected GROUP"));
                    }
                    Some(self.parse_column(input.schema())?)
                } else {
                    None
                };
                QueryPlan::aggregate(input, AggregateSpec::new(func, agg_field, group_field), mode)?
            }
            "VALUES" => self.parse_values()?,
            other => {
                return Err(PlanError::syntax(
                    offset,
                    format!("unknown plan operator '{other}'"),
                ))
            }
        };
        self.expect(TokenKind::RParen)?;
        Ok(plan)
    }

    fn parse_values(&mut self) -> Result<QueryPlan> {
        self.expect(TokenKind::LBracket)?;
        let mut fields = Vec::new();
        loop {
            let name = self.expect_name("column name")?;
            self.expect(TokenKind::Colon)?;
            let type_at = self.peek().offset;
            let type_name = self.expect_keyword("column type")?;
            let data_type = type_name
                .parse::<DataType>()
                .map_err(|e| PlanError::syntax(type_at, e.to_string()))?;
            fields.push(Field::new(name, data_type));
            if !self.consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;

        let mut rows = Vec::new();
        while self.consume(TokenKind::Comma) {
            self.expect(TokenKind::LParen)?;
            let mut values = vec![self.parse_literal()?];
            while self.consume(TokenKind::Comma) {
                values.push(self.parse_literal()?);
            }
            self.expect(TokenKind::RParen)?;
            rows.push(Tuple::new(values));
        }
        QueryPlan::values(Schema::new(fields), rows)
    }

    fn parse_column(&mut self, schema: &Schema) -> Result<usize> {
        match self.peek().kind.clone() {
            TokenKind::Int(i) => {
                self.advance();
                usize::try_from(i)
                    .ok()
                    .filter(|&idx| idx < schema.len())
                    .ok_or_else(|| {
                        PlanError::Schema(format!("column index {i} out of range for {schema}"))
                    })
            }
            TokenKind::Ident(name) | TokenKind::QuotedIdent(name) => {
                self.advance();
                schema.index_of(&name).ok_or_else(|| {
                    PlanError::Schema(format!("column '{name}' not found in {schema}"))
                })
            }
            _ => self.unexpected("column index or name"),
        }
    }

    fn parse_literal(&mut self) -> Result<Scalar> {
        let value = match &self.peek().kind {
            TokenKind::Int(i) => Scalar::Int(*i),
            TokenKind::Float(f) => Scalar::Float(*f),
            TokenKind::Str(s) => Scalar::Text(s.clone()),
            TokenKind::Ident(s) if s == "NaN" => Scalar::Float(f64::NAN),
            TokenKind::Ident(s) if s == "inf" => Scalar::Float(f64::INFINITY),
            _ => return self.unexpected("literal"),
        };
        self.advance();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn catalog() -> HashMap<String, Schema> {
        let mut m = HashMap::new();
        m.insert(
            "a".to_string(),
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("name", DataType::Utf8),
            ]),
        );
        m.insert(
            "b".to_string(),
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("v", DataType::Float64),
            ]),
        );
        m
    }

    #[test]
    fn names_resolve_to_indices() {
        let plan = parse(&catalog(), "agg(join(scan(a), scan(b), id == id), sum(v), group name)")
            .unwrap();
        assert_eq!(plan.to_string(), "AGG(JOIN(SCAN(a), SCAN(b), 0 = 0), SUM(3), GROUP 1)");
        assert_eq!(plan.schema().to_string(), "[name:TEXT, SUM(v):FLOAT]");
    }

    #[test]
    fn display_then_parse_is_identity() {
        let texts = [
            "FILTER(SCAN(a), 1 >= 'x''y')",
            "PROJECT(SCAN(b), 1, 0)",
            "PARTIAL_AGG(FILTER(SCAN(b), 1 < -2.5), AVG(1))",
            "JOIN(VALUES([\"SUM(v)\":INT], (1), (2)), SCAN(a), 0 != 0)",
            "VALUES([s:TEXT, f:FLOAT], ('a\\nb', 1.0))",
            "VALUES([f:FLOAT], (-inf), (inf))",
            "FILTER(VALUES([f:FLOAT], (2.5)), 0 > -inf)",
        ];
        for text in texts {
            let plan = parse(&catalog(), text).unwrap();
            let again = parse(&catalog(), &plan.to_string()).unwrap();
            assert_eq!(again, plan, "{text}");
        }
    }

    #[test]
    fn non_finite_values_survive_display() {
        let schema = Schema::new(vec![Field::new("x", DataType::Float64)]);
        let rows = [f64::NEG_INFINITY, f64::INFINITY, f64::NAN]
            .into_iter()
            .map(|f| Tuple::new(vec![Scalar::Float(f)]))
            .collect();
        let plan = QueryPlan::values(schema, rows).unwrap();
        let text = plan.to_string();
        assert_eq!(text, "VALUES([x:FLOAT], (-inf), (inf), (NaN))");

        // NaN != NaN, so compare the rendered form
        let again = parse(&catalog(), &text).unwrap();
        assert_eq!(again.to_string(), text);
        let QueryPlan::Values { rows, .. } = again else {
            panic!("expected VALUES");
        };
        assert_eq!(rows[0].values[0], Scalar::Float(f64::NEG_INFINITY));
        assert!(matches!(rows[2].values[0], Scalar::Float(f) if f.is_nan()));
    }

    #[test]
    fn syntax_errors_carry_offsets() {
        match parse(&catalog(), "FILTER(SCAN(a) 0 = 1)") {
            Err(PlanError::Syntax { offset, .. }) => assert_eq!(offset, 15),
            other => panic!("unexpected {other:?}"),
        }
        match parse(&catalog(), "SORT(SCAN(a))") {
            Err(PlanError::Syntax { offset, .. }) => assert_eq!(offset, 0),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse(&catalog(), "SCAN(a) SCAN(b)"),
            Err(PlanError::Syntax { .. })
        ));
        assert!(matches!(parse(&catalog(), ""), Err(PlanError::Syntax { .. })));
    }

    #[test]
    fn construction_errors_are_not_syntax_errors() {
        assert!(matches!(
            parse(&catalog(), "SCAN(missing)"),
            Err(PlanError::UnknownTable(_))
        ));
        assert!(matches!(
            parse(&catalog(), "PROJECT(SCAN(a), nope)"),
            Err(PlanError::Schema(_))
        ));
        assert!(matches!(
            parse(&catalog(), "AGG(SCAN(a), SUM(name))"),
            Err(PlanError::Schema(_))
        ));
        assert!(matches!(
            parse(&catalog(), "FILTER(SCAN(a), 9 = 1)"),
            Err(PlanError::Schema(_))
        ));
    }
}
