//! Recursive-descent parser, one-token lookahead.

use crate::catalog::ColumnType;
use crate::common::{Error, Result};

use super::ast::*;
use super::token::{tokenize, Keyword, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

/// Parse a single SQL statement.
pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.parse_statement()?;
    parser.expect_eof()?;
    Ok(stmt)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected<T>(&self) -> Result<T> {
        Err(Error::parse(self.offset(), format!("unexpected token {:?}", self.peek())))
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => self.unexpected(),
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        match self.peek() {
            Token::Keyword(k) if *k == kw => {
                self.advance();
                Ok(())
            }
            _ => self.unexpected(),
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if matches!(self.peek(), Token::Keyword(k) if *k == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Token::Ident(name) => Ok(name),
            other => Err(Error::parse(self.offset(), format!("expected identifier, found {other:?}"))),
        }
    }

    fn expect_lparen(&mut self) -> Result<()> {
        match self.advance() {
            Token::LParen => Ok(()),
            other => Err(Error::parse(self.offset(), format!("expected '(', found {other:?}"))),
        }
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.advance() {
            Token::RParen => Ok(()),
            other => Err(Error::parse(self.offset(), format!("expected ')', found {other:?}"))),
        }
    }

    fn expect_comma(&mut self) -> Result<()> {
        match self.advance() {
            Token::Comma => Ok(()),
            other => Err(Error::parse(self.offset(), format!("expected ',', found {other:?}"))),
        }
    }

    fn parse_column_type(&mut self) -> Result<ColumnType> {
        match self.advance() {
            Token::Keyword(Keyword::Int) => Ok(ColumnType::Int),
            Token::Keyword(Keyword::Text) => Ok(ColumnType::Text),
            Token::Keyword(Keyword::Float) => Ok(ColumnType::Float),
            other => Err(Error::parse(self.offset(), format!("expected a column type, found {other:?}"))),
        }
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.expect_ident()?;
        let col_type = self.parse_column_type()?;
        Ok(ColumnDef { name, col_type })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek() {
            Token::Keyword(Keyword::Create) => self.parse_create(),
            Token::Keyword(Keyword::Drop) => self.parse_drop(),
            Token::Keyword(Keyword::Alter) => self.parse_alter_table(),
            Token::Keyword(Keyword::Insert) => self.parse_insert(),
            Token::Keyword(Keyword::Select) => Ok(Statement::Select(self.parse_select()?)),
            Token::Keyword(Keyword::Update) => self.parse_update(),
            Token::Keyword(Keyword::Delete) => self.parse_delete(),
            Token::Keyword(Keyword::Explain) => self.parse_explain(),
            _ => self.unexpected(),
        }
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Create)?;
        if self.eat_keyword(Keyword::Table) {
            let table = self.expect_ident()?;
            self.expect_lparen()?;
            let mut columns = vec![self.parse_column_def()?];
            while matches!(self.peek(), Token::Comma) {
                self.advance();
                columns.push(self.parse_column_def()?);
            }
            self.expect_rparen()?;
            Ok(Statement::CreateTable { table, columns })
        } else {
            self.expect_keyword(Keyword::Index)?;
            let index = self.expect_ident()?;
            self.expect_keyword(Keyword::On)?;
            let table = self.expect_ident()?;
            self.expect_lparen()?;
            let column = self.expect_ident()?;
            self.expect_rparen()?;
            Ok(Statement::CreateIndex { index, table, column })
        }
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Drop)?;
        if self.eat_keyword(Keyword::Table) {
            Ok(Statement::DropTable { table: self.expect_ident()? })
        } else {
            self.expect_keyword(Keyword::Index)?;
            Ok(Statement::DropIndex { index: self.expect_ident()? })
        }
    }

    fn parse_alter_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_ident()?;
        self.expect_keyword(Keyword::Add)?;
        self.expect_keyword(Keyword::Column)?;
        let column = self.parse_column_def()?;
        Ok(Statement::AlterTableAdd { table, column })
    }

    fn parse_literal(&mut self) -> Result<Value> {
        match self.advance() {
            Token::IntLit(v) => Ok(Value::Int(v)),
            Token::FloatLit(v) => Ok(Value::Float(v)),
            Token::StringLit(v) => Ok(Value::Text(v)),
            other => Err(Error::parse(self.offset(), format!("expected a literal, found {other:?}"))),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_ident()?;
        self.expect_keyword(Keyword::Values)?;
        self.expect_lparen()?;
        let mut values = vec![self.parse_literal()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            values.push(self.parse_literal()?);
        }
        self.expect_rparen()?;
        Ok(Statement::Insert { table, values })
    }

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let name = self.expect_ident()?;
        self.eat_keyword(Keyword::As);
        let alias = match self.peek() {
            Token::Ident(_) => Some(self.expect_ident()?),
            _ => None,
        };
        Ok(TableRef { name, alias })
    }

    fn parse_agg_arg(&mut self) -> Result<AggArg> {
        if matches!(self.peek(), Token::Star) {
            self.advance();
            Ok(AggArg::Star)
        } else {
            Ok(AggArg::Column(self.expect_ident()?))
        }
    }

    fn parse_sel_item(&mut self) -> Result<SelectItem> {
        let func = match self.peek() {
            Token::Keyword(Keyword::Count) => Some(AggFunc::Count),
            Token::Keyword(Keyword::Sum) => Some(AggFunc::Sum),
            Token::Keyword(Keyword::Avg) => Some(AggFunc::Avg),
            Token::Keyword(Keyword::Min) => Some(AggFunc::Min),
            Token::Keyword(Keyword::Max) => Some(AggFunc::Max),
            _ => None,
        };
        if let Some(func) = func {
            self.advance();
            self.expect_lparen()?;
            let arg = self.parse_agg_arg()?;
            self.expect_rparen()?;
            Ok(SelectItem::Aggregate { func, arg })
        } else {
            Ok(SelectItem::Column(self.expect_ident()?))
        }
    }

    fn parse_sel_list(&mut self) -> Result<Vec<SelectItem>> {
        if matches!(self.peek(), Token::Star) {
            self.advance();
            return Ok(vec![SelectItem::Star]);
        }
        let mut items = vec![self.parse_sel_item()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            items.push(self.parse_sel_item()?);
        }
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Token::IntLit(_) | Token::FloatLit(_) | Token::StringLit(_) => {
                Ok(Expr::Literal(self.parse_literal()?))
            }
            Token::Ident(_) => Ok(Expr::Column(self.expect_ident()?)),
            _ => self.unexpected(),
        }
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let left = self.parse_atom()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::Neq => BinOp::Neq,
            Token::Gt => BinOp::Gt,
            Token::Gte => BinOp::Gte,
            Token::Lt => BinOp::Lt,
            Token::Lte => BinOp::Lte,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_atom()?;
        Ok(Expr::Comparison { left: Box::new(left), op, right: Box::new(right) })
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_cmp()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_cmp()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::Logical { left: Box::new(left), op: LogicalOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_join_clause(&mut self) -> Result<JoinClause> {
        self.expect_keyword(Keyword::Inner)?;
        self.expect_keyword(Keyword::Join)?;
        let table = self.parse_table_ref()?;
        self.expect_keyword(Keyword::On)?;
        let on = self.parse_expr()?;
        Ok(JoinClause { table, on })
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect_keyword(Keyword::Select)?;
        let items = self.parse_sel_list()?;
        self.expect_keyword(Keyword::From)?;
        let from = self.parse_table_ref()?;

        let mut joins = Vec::new();
        while matches!(self.peek(), Token::Keyword(Keyword::Inner)) {
            joins.push(self.parse_join_clause()?);
        }

        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by.push(self.expect_ident()?);
            while matches!(self.peek(), Token::Comma) {
                self.advance();
                group_by.push(self.expect_ident()?);
            }
        }

        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            Some(self.expect_ident()?)
        } else {
            None
        };

        let limit = if self.eat_keyword(Keyword::Limit) {
            match self.advance() {
                Token::IntLit(n) if n >= 0 => Some(n as u64),
                other => return Err(Error::parse(self.offset(), format!("expected a non-negative integer, found {other:?}"))),
            }
        } else {
            None
        };

        Ok(SelectStatement { items, from, joins, filter, group_by, order_by, limit })
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_ident()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }

        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Statement::Update { table, assignments, filter })
    }

    fn parse_assignment(&mut self) -> Result<(String, Expr)> {
        let column = self.expect_ident()?;
        match self.advance() {
            Token::Eq => {}
            other => return Err(Error::parse(self.offset(), format!("expected '=', found {other:?}"))),
        }
        let expr = self.parse_atom()?;
        Ok((column, expr))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;
        let filter = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Statement::Delete { table, filter })
    }

    fn parse_explain(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Explain)?;
        Ok(Statement::Explain(Box::new(self.parse_select()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_table() {
        let stmt = parse("CREATE TABLE users (id INT, name TEXT)").unwrap();
        assert_eq!(
            stmt,
            Statement::CreateTable {
                table: "users".to_string(),
                columns: vec![
                    ColumnDef { name: "id".to_string(), col_type: ColumnType::Int },
                    ColumnDef { name: "name".to_string(), col_type: ColumnType::Text },
                ],
            }
        );
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse("INSERT INTO users VALUES (1, 'Alice')").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "users".to_string(),
                values: vec![Value::Int(1), Value::Text("Alice".to_string())],
            }
        );
    }

    #[test]
    fn test_parse_select_star_with_order_by() {
        let stmt = parse("SELECT * FROM users ORDER BY id").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.items, vec![SelectItem::Star]);
                assert_eq!(select.from.name, "users");
                assert_eq!(select.order_by, Some("id".to_string()));
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_select_with_where_and_and() {
        let stmt = parse("SELECT id FROM t WHERE a = 1 AND b > 2").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert!(select.filter.is_some());
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_join_with_alias() {
        let stmt = parse("SELECT name, product FROM u AS a INNER JOIN o ON a.id = o.user_id").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.from.alias, Some("a".to_string()));
                assert_eq!(select.joins.len(), 1);
                assert_eq!(select.joins[0].table.name, "o");
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_group_by_aggregate() {
        let stmt = parse("SELECT region, SUM(amt) FROM s GROUP BY region").unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.group_by, vec!["region".to_string()]);
                assert_eq!(
                    select.items[1],
                    SelectItem::Aggregate { func: AggFunc::Sum, arg: AggArg::Column("amt".to_string()) }
                );
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_explain() {
        let stmt = parse("EXPLAIN SELECT * FROM t WHERE c = 42").unwrap();
        assert!(matches!(stmt, Statement::Explain(_)));
    }

    #[test]
    fn test_parse_delete_with_where() {
        let stmt = parse("DELETE FROM t WHERE id = 1").unwrap();
        assert!(matches!(stmt, Statement::Delete { .. }));
    }

    #[test]
    fn test_parse_error_reports_offset() {
        let err = parse("SELECT * FORM t").unwrap_err();
        match err {
            Error::ParseError { offset, .. } => assert_eq!(offset, 9),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let stmt = parse("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        match stmt {
            Statement::Select(select) => match select.filter.unwrap() {
                Expr::Logical { op: LogicalOp::Or, right, .. } => {
                    assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. }));
                }
                other => panic!("expected top-level OR, got {other:?}"),
            },
            other => panic!("expected Select, got {other:?}"),
        }
    }
}
