//! トークン列をASTに変換する構文解析器。
//! 式は演算子表の優先順位に基づく優先順位上昇法(precedence climbing)で解析する。

extern crate alloc;
use crate::ast::*;
use crate::error::{LangError, ParseError, ParseErrorKind};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Operator, Token};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// 式・文の入れ子の上限。これを超えるとスタックを使い切る前にエラーにする。
pub const MAX_NESTING_DEPTH: usize = 256;

/// 構文解析器。Lexerから1トークンずつ先読みしながら進む。
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: (Token, Span),
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            // 最初の advance で実際のトークンに置き換わる
            current: (Token::Eof, Span::default()),
            depth: 0,
        }
    }

    /// プログラム全体を解析する
    pub fn parse(mut self) -> Result<Program, LangError> {
        self.advance()?;
        let span = self.peek_span();

        let name = if self.check_and_consume(Token::Program)? {
            let (name, _) = self.consume_identifier()?;
            self.consume(Token::Semicolon)?;
            Some(name)
        } else {
            None
        };

        let mut constants = Vec::new();
        let mut variables = Vec::new();
        let mut functions = Vec::new();
        loop {
            match self.peek() {
                Token::Const => constants.extend(self.parse_const_block()?),
                Token::Var => variables.extend(self.parse_var_block()?),
                Token::Function | Token::Procedure => functions.push(self.parse_function()?),
                Token::Begin => break,
                other => return Err(ParseError::unexpected(&other.describe(), self.peek_span()).into()),
            }
        }

        let body = self.parse_block()?;
        self.consume(Token::Dot)?;
        self.expect_end_of_input()?;

        Ok(Program {
            name,
            constants,
            variables,
            functions,
            body,
            span,
        })
    }

    /// 単独の式を解析する。式の後に入力が残っていればエラー。
    pub fn parse_standalone_expression(mut self) -> Result<Expression, LangError> {
        self.advance()?;
        let expression = self.parse_expression()?;
        self.expect_end_of_input()?;
        Ok(expression)
    }

    // --- 宣言 ---

    fn parse_const_block(&mut self) -> Result<Vec<ConstDecl>, LangError> {
        self.consume(Token::Const)?;
        let mut constants = Vec::new();
        loop {
            let (name, span) = self.consume_identifier()?;
            self.consume(Token::Operator(Operator::Equal))?;
            let value = self.parse_expression()?;
            self.require_operand(&value, "constant value")?;
            self.consume(Token::Semicolon)?;
            constants.push(ConstDecl { name, value, span });

            if !matches!(self.peek(), Token::Identifier(_)) {
                return Ok(constants);
            }
        }
    }

    fn parse_var_block(&mut self) -> Result<Vec<VarDecl>, LangError> {
        self.consume(Token::Var)?;
        let mut variables = Vec::new();
        loop {
            variables.extend(self.parse_name_group()?);
            self.consume(Token::Semicolon)?;

            if !matches!(self.peek(), Token::Identifier(_)) {
                return Ok(variables);
            }
        }
    }

    /// `a, b, c: type`
    fn parse_name_group(&mut self) -> Result<Vec<VarDecl>, LangError> {
        let mut names = Vec::new();
        loop {
            names.push(self.consume_identifier()?);
            if !self.check_and_consume(Token::Comma)? {
                break;
            }
        }
        self.consume(Token::Colon)?;
        let data_type = self.parse_type(false)?;
        Ok(names
            .into_iter()
            .map(|(name, span)| VarDecl {
                name,
                data_type,
                span,
            })
            .collect())
    }

    fn parse_type(&mut self, allow_void: bool) -> Result<DataType, LangError> {
        let (name, span) = self.consume_identifier()?;
        match DataType::from_name(&name) {
            Some(DataType::Void) if !allow_void => Err(ParseError::new(
                ParseErrorKind::UnknownType,
                "Type 'void' is only allowed as a return type",
                span,
            )
            .into()),
            Some(data_type) => Ok(data_type),
            None => Err(ParseError::new(
                ParseErrorKind::UnknownType,
                format!("Unknown type: '{}'", name),
                span,
            )
            .into()),
        }
    }

    /// `function name(params): type;` または `procedure name(params);` に続く本体
    fn parse_function(&mut self) -> Result<FunctionDecl, LangError> {
        let (keyword, span) = self.advance()?;
        let (name, _) = self.consume_identifier()?;

        let mut params = Vec::new();
        if self.check_and_consume(Token::LParen)? {
            if self.peek() != &Token::RParen {
                loop {
                    params.extend(self.parse_name_group()?);
                    if !self.check_and_consume(Token::Semicolon)? {
                        break;
                    }
                }
            }
            self.consume(Token::RParen)?;
        }

        // procedure は戻り値 void の関数の糖衣構文
        let return_type = if keyword == Token::Procedure {
            DataType::Void
        } else {
            self.consume(Token::Colon)?;
            self.parse_type(true)?
        };
        self.consume(Token::Semicolon)?;

        let mut function = FunctionDecl {
            name,
            return_type,
            params,
            constants: Vec::new(),
            variables: Vec::new(),
            body: None,
            span,
        };

        if self.check_and_consume(Token::Forward)? {
            self.consume(Token::Semicolon)?;
            return Ok(function);
        }

        loop {
            match self.peek() {
                Token::Const => function.constants.extend(self.parse_const_block()?),
                Token::Var => function.variables.extend(self.parse_var_block()?),
                _ => break,
            }
        }
        function.body = Some(self.parse_block()?);
        self.consume(Token::Semicolon)?;
        Ok(function)
    }

    // --- 文 ---

    /// `begin stmt; stmt; ... end`。空の文と末尾の `;` は許容する。
    fn parse_block(&mut self) -> Result<Expression, LangError> {
        let span = self.consume(Token::Begin)?;
        let mut statements = Vec::new();
        loop {
            while self.check_and_consume(Token::Semicolon)? {}
            if self.peek() == &Token::End {
                break;
            }
            statements.push(self.parse_expression()?);
            if self.check_and_consume(Token::Semicolon)? {
                continue;
            }
            if self.peek() != &Token::End {
                let found = self.peek().describe();
                return Err(ParseError::expected(";", &found, self.peek_span()).into());
            }
        }
        self.consume(Token::End)?;
        Ok(Expression::new(ExprKind::Block { statements }, span))
    }

    fn parse_if(&mut self) -> Result<Expression, LangError> {
        let span = self.consume(Token::If)?;
        let condition = self.parse_condition()?;
        self.consume(Token::Then)?;
        let then_branch = self.parse_expression()?;
        let else_branch = if self.check_and_consume(Token::Else)? {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expression::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ))
    }

    fn parse_while(&mut self) -> Result<Expression, LangError> {
        let span = self.consume(Token::While)?;
        let condition = self.parse_condition()?;
        self.consume(Token::Do)?;
        let body = self.parse_expression()?;
        Ok(Expression::new(
            ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            span,
        ))
    }

    fn parse_for(&mut self) -> Result<Expression, LangError> {
        let span = self.consume(Token::For)?;
        let (counter, counter_span) = self.consume_identifier()?;
        self.consume(Token::Operator(Operator::Assign))?;
        let start = self.parse_expression()?;
        self.require_operand(&start, "loop start")?;

        let downto = match self.peek() {
            Token::To => false,
            Token::Downto => true,
            other => {
                let found = other.describe();
                return Err(ParseError::expected("to", &found, self.peek_span()).into());
            }
        };
        self.advance()?;

        let finish = self.parse_expression()?;
        self.require_operand(&finish, "loop bound")?;
        self.consume(Token::Do)?;
        let body = self.parse_expression()?;
        Ok(Expression::new(
            ExprKind::For {
                counter,
                counter_span,
                start: Box::new(start),
                finish: Box::new(finish),
                downto,
                body: Box::new(body),
            },
            span,
        ))
    }

    /// `if` と `while` の条件。静的に真偽値でなければならない。
    fn parse_condition(&mut self) -> Result<Expression, LangError> {
        let condition = self.parse_expression()?;
        if !condition.is_boolean() {
            return Err(ParseError::new(
                ParseErrorKind::NonBooleanCondition,
                "Condition must be a boolean expression",
                condition.span(),
            )
            .into());
        }
        Ok(condition)
    }

    // --- 式 ---

    fn parse_expression(&mut self) -> Result<Expression, LangError> {
        let lhs = self.parse_unary()?;
        self.parse_binary(0, lhs)
    }

    /// `lhs` に続く、優先順位 `min_precedence` 以上の二項演算子を左結合で畳み込む
    /// 畳み込んだ木の高さも入れ子の上限で抑える(`1 + 1 + ... + 1` は再帰せずに深い木になる)
    fn parse_binary(&mut self, min_precedence: u8, mut lhs: Expression) -> Result<Expression, LangError> {
        let mut height = lhs.height();
        loop {
            let op = match self.peek() {
                Token::Operator(op) if op.precedence() >= min_precedence => *op,
                _ => return Ok(lhs),
            };
            let (_, op_span) = self.advance()?;

            let mut rhs = self.parse_unary()?;
            // 次の演算子がより強く結合するなら、右辺として先にまとめる
            if let Some(next) = self.peek().precedence() {
                if next > op.precedence() {
                    rhs = self.parse_binary(op.precedence() + 1, rhs)?;
                }
            }
            height = 1 + height.max(rhs.height());
            if self.depth + height > MAX_NESTING_DEPTH {
                return Err(too_deep(op_span));
            }
            lhs = self.make_binary(op, op_span, lhs, rhs)?;
        }
    }

    fn make_binary(
        &self,
        op: Operator,
        op_span: Span,
        left: Expression,
        right: Expression,
    ) -> Result<Expression, LangError> {
        if op == Operator::Assign {
            let ExprKind::Identifier(target) = left.kind else {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidAssignmentTarget,
                    "Left side of ':=' must be a variable",
                    left.span,
                )
                .into());
            };
            self.require_operand(&right, "assigned value")?;
            return Ok(Expression::new(
                ExprKind::Assign {
                    target,
                    value: Box::new(right),
                },
                left.span,
            ));
        }

        self.require_operand(&left, "operand")?;
        self.require_operand(&right, "operand")?;
        Ok(Expression::new(
            ExprKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                is_boolean: op.is_boolean(),
            },
            op_span,
        ))
    }

    /// 単項マイナスは `(-1) * operand` に書き換える
    fn parse_unary(&mut self) -> Result<Expression, LangError> {
        self.enter()?;
        let result = if self.peek() == &Token::Operator(Operator::Minus) {
            let (_, span) = self.advance()?;
            self.parse_unary().and_then(|operand| {
                self.require_operand(&operand, "operand")?;
                Ok(Expression::new(
                    ExprKind::BinaryOp {
                        op: Operator::Star,
                        left: Box::new(Expression::new(ExprKind::IntLiteral(-1), span)),
                        right: Box::new(operand),
                        is_boolean: false,
                    },
                    span,
                ))
            })
        } else {
            self.parse_primary()
        };
        self.depth -= 1;
        result
    }

    fn parse_primary(&mut self) -> Result<Expression, LangError> {
        let span = self.peek_span();
        let kind = match self.peek() {
            Token::IntLiteral(value) => {
                let value = *value;
                self.advance()?;
                ExprKind::IntLiteral(value)
            }
            Token::FloatLiteral(value) => {
                let value = *value;
                self.advance()?;
                ExprKind::FloatLiteral(value)
            }
            Token::StringLiteral(_) | Token::Identifier(_) => match self.advance()?.0 {
                Token::StringLiteral(s) => ExprKind::StringLiteral(s),
                Token::Identifier(name) if self.peek() == &Token::LParen => {
                    let args = self.parse_call_arguments()?;
                    ExprKind::Call { name, args }
                }
                Token::Identifier(name) => ExprKind::Identifier(name),
                other => return Err(ParseError::unexpected(&other.describe(), span).into()),
            },
            Token::LParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.require_operand(&inner, "operand")?;
                self.consume(Token::RParen)?;
                ExprKind::Parenthesized(Box::new(inner))
            }
            Token::Begin => return self.parse_block(),
            Token::If => return self.parse_if(),
            Token::While => return self.parse_while(),
            Token::For => return self.parse_for(),
            Token::Break => {
                self.advance()?;
                ExprKind::Break
            }
            Token::Exit => {
                self.advance()?;
                ExprKind::Exit
            }
            other => return Err(ParseError::unexpected(&other.describe(), span).into()),
        };
        Ok(Expression::new(kind, span))
    }

    /// `(arg, arg, ...)`
    fn parse_call_arguments(&mut self) -> Result<Vec<Expression>, LangError> {
        self.consume(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != &Token::RParen {
            loop {
                let arg = self.parse_expression()?;
                self.require_operand(&arg, "argument")?;
                args.push(arg);
                if !self.check_and_consume(Token::Comma)? {
                    break;
                }
            }
        }
        self.consume(Token::RParen)?;
        Ok(args)
    }

    // --- ヘルパー関数 ---

    fn require_operand(&self, expression: &Expression, role: &str) -> Result<(), LangError> {
        if expression.can_be_operand() {
            return Ok(());
        }
        Err(ParseError::new(
            ParseErrorKind::InvalidOperand,
            format!("A statement cannot be used as {} here", with_article(role)),
            expression.span(),
        )
        .into())
    }

    fn enter(&mut self) -> Result<(), LangError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep(self.peek_span()));
        }
        self.depth += 1;
        Ok(())
    }

    fn expect_end_of_input(&self) -> Result<(), LangError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(ParseError::unexpected(&other.describe(), self.peek_span()).into()),
        }
    }

    fn peek(&self) -> &Token {
        &self.current.0
    }
    fn peek_span(&self) -> Span {
        self.current.1
    }

    /// 現在のトークンを返し、次のトークンを読み込む
    fn advance(&mut self) -> Result<(Token, Span), LangError> {
        let next = self.lexer.next_token()?;
        Ok(core::mem::replace(&mut self.current, next))
    }

    fn check_and_consume(&mut self, token: Token) -> Result<bool, LangError> {
        if self.peek() == &token {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn consume(&mut self, expected: Token) -> Result<Span, LangError> {
        if self.peek() == &expected {
            return Ok(self.advance()?.1);
        }
        Err(ParseError::expected(&expected.describe(), &self.peek().describe(), self.peek_span()).into())
    }

    fn consume_identifier(&mut self) -> Result<(String, Span), LangError> {
        if let Token::Identifier(_) = self.peek() {
            if let (Token::Identifier(name), span) = self.advance()? {
                return Ok((name, span));
            }
        }
        Err(ParseError::expected("identifier", &self.peek().describe(), self.peek_span()).into())
    }
}

fn too_deep(span: Span) -> LangError {
    ParseError::new(
        ParseErrorKind::NestingTooDeep,
        format!("Expressions nested deeper than {} levels", MAX_NESTING_DEPTH),
        span,
    )
    .into()
}

fn with_article(role: &str) -> String {
    let article = match role.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    };
    format!("{} {}", article, role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn expr(source: &str) -> Expression {
        Parser::new(source).parse_standalone_expression().unwrap()
    }

    fn parse_error(source: &str) -> ParseError {
        match Parser::new(source).parse() {
            Err(LangError::Parse(e)) => e,
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    fn binary_parts(expression: &Expression) -> (Operator, &Expression, &Expression) {
        match &expression.kind {
            ExprKind::BinaryOp { op, left, right, .. } => (*op, left, right),
            other => panic!("not a binary operation: {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let tree = expr("2 + 3 * 4");
        let (op, left, right) = binary_parts(&tree);
        assert_eq!(op, Operator::Plus);
        assert_eq!(left.kind, ExprKind::IntLiteral(2));
        let (inner, l, r) = binary_parts(right);
        assert_eq!(inner, Operator::Star);
        assert_eq!(l.kind, ExprKind::IntLiteral(3));
        assert_eq!(r.kind, ExprKind::IntLiteral(4));
    }

    #[test]
    fn same_precedence_chains_are_left_associative() {
        let tree = expr("10 - 3 - 2");
        let (op, left, right) = binary_parts(&tree);
        assert_eq!(op, Operator::Minus);
        assert_eq!(right.kind, ExprKind::IntLiteral(2));
        let (inner, l, r) = binary_parts(left);
        assert_eq!(inner, Operator::Minus);
        assert_eq!(l.kind, ExprKind::IntLiteral(10));
        assert_eq!(r.kind, ExprKind::IntLiteral(3));
    }

    #[test]
    fn comparison_sits_below_arithmetic() {
        let tree = expr("a + 1 < b * 2");
        let (op, left, right) = binary_parts(&tree);
        assert_eq!(op, Operator::Less);
        assert!(tree.is_boolean());
        assert_eq!(binary_parts(left).0, Operator::Plus);
        assert_eq!(binary_parts(right).0, Operator::Star);
    }

    #[test]
    fn assignment_is_rewritten() {
        let tree = expr("x := 5");
        assert_eq!(tree.span, Span::new(1, 1));
        match tree.kind {
            ExprKind::Assign { target, value } => {
                assert_eq!(target, "x");
                assert_eq!(value.kind, ExprKind::IntLiteral(5));
            }
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn assignment_takes_the_whole_right_side() {
        match expr("x := y + 1 * 2").kind {
            ExprKind::Assign { value, .. } => assert_eq!(binary_parts(&value).0, Operator::Plus),
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn literal_cannot_be_assigned() {
        let err = match Parser::new("5 := x").parse_standalone_expression() {
            Err(LangError::Parse(e)) => e,
            other => panic!("expected a parse error, got {:?}", other),
        };
        assert_eq!(err.kind, ParseErrorKind::InvalidAssignmentTarget);
        assert_eq!(err.span, Span::new(1, 1));
    }

    #[test]
    fn unary_minus_becomes_multiplication_by_minus_one() {
        let tree = expr("-x");
        let (op, left, right) = binary_parts(&tree);
        assert_eq!(op, Operator::Star);
        assert_eq!(left.kind, ExprKind::IntLiteral(-1));
        assert_eq!(left.span, Span::new(1, 1));
        assert_eq!(right.kind, ExprKind::Identifier("x".to_string()));
    }

    #[test]
    fn calls_collect_their_arguments() {
        match expr("f(1, g(), x + 2)").kind {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "f");
                assert_eq!(args.len(), 3);
                assert!(matches!(args[1].kind, ExprKind::Call { .. }));
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn if_requires_a_boolean_condition() {
        let err = parse_error("begin if 1 + 2 then x := 1 end.");
        assert_eq!(err.kind, ParseErrorKind::NonBooleanCondition);
        assert_eq!(err.span, Span::new(1, 12));
    }

    #[test]
    fn parenthesized_comparison_is_a_valid_condition() {
        let program = Parser::new("begin while (i < 3) do i := i + 1 end.").parse().unwrap();
        let ExprKind::Block { statements } = program.body.kind else {
            panic!("body must be a block");
        };
        assert!(matches!(statements[0].kind, ExprKind::While { .. }));
    }

    #[test]
    fn block_is_not_an_operand() {
        let err = parse_error("begin x := begin end end.");
        assert_eq!(err.kind, ParseErrorKind::InvalidOperand);
    }

    #[test]
    fn missing_semicolon_between_statements() {
        let err = parse_error("begin x := 1 y := 2 end.");
        assert_eq!(err.kind, ParseErrorKind::ExpectedDifferent);
        assert_eq!(err.message, "Expected ';' but found 'y'");
        assert_eq!(err.span, Span::new(1, 14));
    }

    #[test]
    fn declarations_accumulate_in_order() {
        let program = Parser::new(
            "program p; const a = 1; b = 2; var x, y: integer; const c = 3; var z: double; begin end.",
        )
        .parse()
        .unwrap();
        assert_eq!(program.name.as_deref(), Some("p"));
        let names: Vec<&str> = program.constants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let types: Vec<DataType> = program.variables.iter().map(|v| v.data_type).collect();
        assert_eq!(types, [DataType::Integer, DataType::Integer, DataType::Double]);
    }

    #[test]
    fn functions_procedures_and_forward_declarations() {
        let program = Parser::new(
            "function f(a, b: integer; c: double): integer; forward;\n\
             procedure p; begin writeln(1) end;\n\
             function f(a, b: integer; c: double): integer; var t: integer; begin f := a end;\n\
             begin end.",
        )
        .parse()
        .unwrap();
        assert_eq!(program.functions.len(), 3);
        assert!(program.functions[0].is_forward());
        assert_eq!(program.functions[0].params.len(), 3);
        assert!(program.functions[1].is_procedure());
        assert!(program.functions[1].params.is_empty());
        assert_eq!(program.functions[2].variables.len(), 1);
    }

    #[test]
    fn void_is_not_a_variable_type() {
        let err = parse_error("var x: void; begin end.");
        assert_eq!(err.kind, ParseErrorKind::UnknownType);
    }

    #[test]
    fn trailing_input_after_the_final_dot() {
        let err = parse_error("begin end. begin");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn deep_nesting_is_reported_instead_of_overflowing() {
        let source = "(".repeat(MAX_NESTING_DEPTH + 10) + "1" + &")".repeat(MAX_NESTING_DEPTH + 10);
        match Parser::new(&source).parse_standalone_expression() {
            Err(LangError::Parse(e)) => assert_eq!(e.kind, ParseErrorKind::NestingTooDeep),
            other => panic!("expected a nesting error, got {:?}", other),
        }
    }

    #[test]
    fn long_operator_chains_are_bounded_like_nesting() {
        let source = "1".to_string() + &" + 1".repeat(200_000);
        match Parser::new(&source).parse_standalone_expression() {
            Err(LangError::Parse(e)) => assert_eq!(e.kind, ParseErrorKind::NestingTooDeep),
            other => panic!("expected a nesting error, got {:?}", other.map(|e| e.height())),
        }

        let within = "1".to_string() + &" * 2 + 1".repeat(100);
        let tree = Parser::new(&within).parse_standalone_expression().unwrap();
        assert!(tree.height() <= MAX_NESTING_DEPTH);
    }
}
